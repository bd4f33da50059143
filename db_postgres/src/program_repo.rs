//! `ProgramRepository` implementation: plain read-only CRUD (program
//! upload and versioning live in the upload surface, not here).

use crate::{PgDb, map_db_err, schema::*};
use app_core::domain::Program;
use app_core::ports::{DbResult, ProgramRepository};
use async_trait::async_trait;
use diesel::prelude::{BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::RunQueryDsl;
use tracing::instrument;
use uuid::Uuid;

type ProgramRow = (Uuid, Uuid, Uuid, Option<Uuid>, i32, String);

fn from_row((id, team_id, game_id, tournament_id, version, file_path): ProgramRow) -> Program {
    Program { id, team_id, game_id, tournament_id, version: version as u32, file_path }
}

#[async_trait]
impl ProgramRepository for PgDb {
    #[instrument(name = "db.program.get", skip(self))]
    async fn get_program(&self, id: Uuid) -> DbResult<Option<Program>> {
        let mut conn = self.new_connection().await?;
        let row: Option<ProgramRow> = programs::table
            .filter(programs::id.eq(id))
            .select((
                programs::id,
                programs::team_id,
                programs::game_id,
                programs::tournament_id,
                programs::version,
                programs::file_path,
            ))
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        Ok(row.map(from_row))
    }

    #[instrument(name = "db.program.for_tournament_and_game", skip(self))]
    async fn get_programs_for_tournament_and_game(&self, tournament_id: Uuid, game_id: Uuid) -> DbResult<Vec<Program>> {
        let mut conn = self.new_connection().await?;
        let rows: Vec<ProgramRow> = programs::table
            .filter(programs::tournament_id.eq(tournament_id).and(programs::game_id.eq(game_id)))
            .select((
                programs::id,
                programs::team_id,
                programs::game_id,
                programs::tournament_id,
                programs::version,
                programs::file_path,
            ))
            .load(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(from_row).collect())
    }
}
