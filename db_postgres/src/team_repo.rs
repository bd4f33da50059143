//! `TeamRepository` implementation: plain read-only CRUD (team membership
//! and join-code assignment live in the upload/admin surface, not here).

use crate::{PgDb, map_db_err, schema::*};
use app_core::domain::{Team, TeamMember};
use app_core::ports::{DbResult, TeamRepository};
use async_trait::async_trait;
use diesel::prelude::{BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::RunQueryDsl;
use tracing::instrument;
use uuid::Uuid;

#[async_trait]
impl TeamRepository for PgDb {
    #[instrument(name = "db.team.get", skip(self))]
    async fn get_team(&self, id: Uuid) -> DbResult<Option<Team>> {
        let mut conn = self.new_connection().await?;
        let row: Option<(Uuid, Uuid, String, Uuid)> = teams::table
            .filter(teams::id.eq(id))
            .select((teams::id, teams::tournament_id, teams::join_code, teams::leader_user_id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        Ok(row.map(|(id, tournament_id, join_code, leader_user_id)| Team {
            id,
            tournament_id,
            join_code,
            leader_user_id,
        }))
    }

    #[instrument(name = "db.team.members", skip(self))]
    async fn get_team_members(&self, team_id: Uuid) -> DbResult<Vec<TeamMember>> {
        let mut conn = self.new_connection().await?;
        let rows: Vec<(Uuid, Uuid)> = team_members::table
            .filter(team_members::team_id.eq(team_id))
            .select((team_members::team_id, team_members::user_id))
            .load(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(|(team_id, user_id)| TeamMember { team_id, user_id }).collect())
    }

    #[instrument(name = "db.team.for_user", skip(self))]
    async fn get_team_for_user(&self, tournament_id: Uuid, user_id: Uuid) -> DbResult<Option<Team>> {
        let mut conn = self.new_connection().await?;
        let row: Option<(Uuid, Uuid, String, Uuid)> = teams::table
            .inner_join(team_members::table.on(team_members::team_id.eq(teams::id)))
            .filter(teams::tournament_id.eq(tournament_id).and(team_members::user_id.eq(user_id)))
            .select((teams::id, teams::tournament_id, teams::join_code, teams::leader_user_id))
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        Ok(row.map(|(id, tournament_id, join_code, leader_user_id)| Team {
            id,
            tournament_id,
            join_code,
            leader_user_id,
        }))
    }
}
