//! `GameRepository` implementation: the game catalog is plain read-mostly
//! CRUD (spec §9 design note: no inheritance, a tagged config per game).

use crate::{PgDb, map_db_err, schema::*};
use app_core::domain::Game;
use app_core::ports::{DbResult, GameRepository};
use async_trait::async_trait;
use diesel::prelude::{ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::RunQueryDsl;
use tracing::instrument;
use uuid::Uuid;

type GameRow = (Uuid, String, String, String);

fn from_row((id, short_name, display_name, rules_text): GameRow) -> Game {
    Game { id, short_name, display_name, rules_text }
}

#[async_trait]
impl GameRepository for PgDb {
    #[instrument(name = "db.game.get", skip(self))]
    async fn get_game(&self, id: Uuid) -> DbResult<Option<Game>> {
        let mut conn = self.new_connection().await?;
        let row: Option<GameRow> = games::table
            .filter(games::id.eq(id))
            .select((games::id, games::short_name, games::display_name, games::rules_text))
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        Ok(row.map(from_row))
    }

    #[instrument(name = "db.game.get_by_short_name", skip(self))]
    async fn get_game_by_short_name(&self, short_name: &str) -> DbResult<Option<Game>> {
        let mut conn = self.new_connection().await?;
        let row: Option<GameRow> = games::table
            .filter(games::short_name.eq(short_name))
            .select((games::id, games::short_name, games::display_name, games::rules_text))
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        Ok(row.map(from_row))
    }

    #[instrument(name = "db.game.list", skip(self))]
    async fn list_games(&self) -> DbResult<Vec<Game>> {
        let mut conn = self.new_connection().await?;
        let rows: Vec<GameRow> = games::table
            .select((games::id, games::short_name, games::display_name, games::rules_text))
            .order(games::short_name.asc())
            .load(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(from_row).collect())
    }
}
