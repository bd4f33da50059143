//! `MatchRepository` implementation.

use crate::{PgDb, map_db_err, schema::*};
use app_core::domain::{Match, MatchPriority, MatchStatus, Winner};
use app_core::ports::{DbResult, MatchRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::{BoolExpressionMethods, ExpressionMethods, Insertable, OptionalExtension, QueryDsl, Queryable};
use diesel_async::RunQueryDsl;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Queryable)]
struct DbMatch {
    id: Uuid,
    tournament_id: Uuid,
    game_id: Uuid,
    program1_id: Uuid,
    program2_id: Uuid,
    status: String,
    priority: String,
    round_number: i32,
    score1: Option<i32>,
    score2: Option<i32>,
    winner: Option<i16>,
    error_code: Option<i32>,
    error_message: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn status_to_str(s: MatchStatus) -> &'static str {
    match s {
        MatchStatus::Pending => "pending",
        MatchStatus::Running => "running",
        MatchStatus::Completed => "completed",
        MatchStatus::Failed => "failed",
    }
}

fn status_from_str(s: &str) -> MatchStatus {
    match s {
        "running" => MatchStatus::Running,
        "completed" => MatchStatus::Completed,
        "failed" => MatchStatus::Failed,
        _ => MatchStatus::Pending,
    }
}

pub(crate) fn priority_to_str(p: MatchPriority) -> &'static str {
    match p {
        MatchPriority::High => "high",
        MatchPriority::Medium => "medium",
        MatchPriority::Low => "low",
    }
}

pub(crate) fn priority_from_str(s: &str) -> MatchPriority {
    match s {
        "high" => MatchPriority::High,
        "medium" => MatchPriority::Medium,
        _ => MatchPriority::Low,
    }
}

impl From<DbMatch> for Match {
    fn from(r: DbMatch) -> Self {
        Match {
            id: r.id,
            tournament_id: r.tournament_id,
            game_id: r.game_id,
            program1_id: r.program1_id,
            program2_id: r.program2_id,
            status: status_from_str(&r.status),
            priority: priority_from_str(&r.priority),
            round_number: r.round_number as u32,
            score1: r.score1,
            score2: r.score2,
            winner: r.winner.and_then(|w| Winner::from_code(w as u8)),
            error_code: r.error_code,
            error_message: r.error_message,
            started_at: r.started_at,
            completed_at: r.completed_at,
            created_at: r.created_at,
        }
    }
}

const MATCH_COLUMNS: (
    matches::id,
    matches::tournament_id,
    matches::game_id,
    matches::program1_id,
    matches::program2_id,
    matches::status,
    matches::priority,
    matches::round_number,
    matches::score1,
    matches::score2,
    matches::winner,
    matches::error_code,
    matches::error_message,
    matches::started_at,
    matches::completed_at,
    matches::created_at,
) = (
    matches::id,
    matches::tournament_id,
    matches::game_id,
    matches::program1_id,
    matches::program2_id,
    matches::status,
    matches::priority,
    matches::round_number,
    matches::score1,
    matches::score2,
    matches::winner,
    matches::error_code,
    matches::error_message,
    matches::started_at,
    matches::completed_at,
    matches::created_at,
);

#[async_trait]
impl MatchRepository for PgDb {
    #[instrument(name = "db.match.create", skip(self, m))]
    async fn create_match(&self, m: &Match) -> DbResult<Match> {
        let mut conn = self.new_connection().await?;
        let row = diesel::insert_into(matches::table)
            .values((
                matches::tournament_id.eq(m.tournament_id),
                matches::game_id.eq(m.game_id),
                matches::program1_id.eq(m.program1_id),
                matches::program2_id.eq(m.program2_id),
                matches::status.eq(status_to_str(m.status)),
                matches::priority.eq(priority_to_str(m.priority)),
                matches::round_number.eq(m.round_number as i32),
            ))
            .returning(MATCH_COLUMNS)
            .get_result::<DbMatch>(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(row.into())
    }

    #[instrument(name = "db.match.create_batch", skip(self, matches_in))]
    async fn create_matches_batch(&self, matches_in: &[Match]) -> DbResult<Vec<Match>> {
        let mut conn = self.new_connection().await?;
        let values: Vec<_> = matches_in
            .iter()
            .map(|m| {
                (
                    matches::tournament_id.eq(m.tournament_id),
                    matches::game_id.eq(m.game_id),
                    matches::program1_id.eq(m.program1_id),
                    matches::program2_id.eq(m.program2_id),
                    matches::status.eq(status_to_str(m.status)),
                    matches::priority.eq(priority_to_str(m.priority)),
                    matches::round_number.eq(m.round_number as i32),
                )
            })
            .collect();
        let rows = diesel::insert_into(matches::table)
            .values(values)
            .returning(MATCH_COLUMNS)
            .get_results::<DbMatch>(&mut conn)
            .await
            .map_err(map_db_err)?;
        info!(count = rows.len(), "matches_created");
        Ok(rows.into_iter().map(Match::from).collect())
    }

    #[instrument(name = "db.match.get", skip(self))]
    async fn get_match(&self, id: Uuid) -> DbResult<Option<Match>> {
        let mut conn = self.new_connection().await?;
        let row = matches::table
            .filter(matches::id.eq(id))
            .select(MATCH_COLUMNS)
            .first::<DbMatch>(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        Ok(row.map(Match::from))
    }

    #[instrument(name = "db.match.by_tournament", skip(self))]
    async fn get_matches_by_tournament(&self, tournament_id: Uuid) -> DbResult<Vec<Match>> {
        let mut conn = self.new_connection().await?;
        let rows = matches::table
            .filter(matches::tournament_id.eq(tournament_id))
            .select(MATCH_COLUMNS)
            .load::<DbMatch>(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Match::from).collect())
    }

    #[instrument(name = "db.match.pending_by_tournament", skip(self))]
    async fn get_pending_by_tournament(&self, tournament_id: Uuid) -> DbResult<Vec<Match>> {
        let mut conn = self.new_connection().await?;
        let rows = matches::table
            .filter(matches::tournament_id.eq(tournament_id).and(matches::status.eq("pending")))
            .select(MATCH_COLUMNS)
            .load::<DbMatch>(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Match::from).collect())
    }

    #[instrument(name = "db.match.pending_by_tournament_and_game", skip(self))]
    async fn get_pending_by_tournament_and_game(&self, tournament_id: Uuid, game_id: Uuid) -> DbResult<Vec<Match>> {
        let mut conn = self.new_connection().await?;
        let rows = matches::table
            .filter(
                matches::tournament_id
                    .eq(tournament_id)
                    .and(matches::game_id.eq(game_id))
                    .and(matches::status.eq("pending")),
            )
            .select(MATCH_COLUMNS)
            .load::<DbMatch>(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Match::from).collect())
    }

    #[instrument(name = "db.match.reset_failed", skip(self))]
    async fn reset_failed_matches(&self, tournament_id: Uuid) -> DbResult<u32> {
        let mut conn = self.new_connection().await?;
        let count = diesel::update(
            matches::table.filter(matches::tournament_id.eq(tournament_id).and(matches::status.eq("failed"))),
        )
        .set((
            matches::status.eq("pending"),
            matches::error_code.eq(None::<i32>),
            matches::error_message.eq(None::<String>),
            matches::started_at.eq(None::<DateTime<Utc>>),
            matches::completed_at.eq(None::<DateTime<Utc>>),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_db_err)?;
        Ok(count as u32)
    }

    #[instrument(name = "db.match.next_round_number", skip(self))]
    async fn get_next_round_number(&self, tournament_id: Uuid) -> DbResult<u32> {
        let mut conn = self.new_connection().await?;
        let max: Option<i32> = matches::table
            .filter(matches::tournament_id.eq(tournament_id))
            .select(diesel::dsl::max(matches::round_number))
            .first(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(max.unwrap_or(0) as u32 + 1)
    }

    #[instrument(name = "db.match.next_round_number_by_game", skip(self))]
    async fn get_next_round_number_by_game(&self, tournament_id: Uuid, game_id: Uuid) -> DbResult<u32> {
        let mut conn = self.new_connection().await?;
        let max: Option<i32> = matches::table
            .filter(matches::tournament_id.eq(tournament_id).and(matches::game_id.eq(game_id)))
            .select(diesel::dsl::max(matches::round_number))
            .first(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(max.unwrap_or(0) as u32 + 1)
    }

    #[instrument(name = "db.match.by_rounds", skip(self, rounds))]
    async fn get_matches_by_rounds(&self, tournament_id: Uuid, game_id: Uuid, rounds: &[u32]) -> DbResult<Vec<Match>> {
        let mut conn = self.new_connection().await?;
        let rounds_i32: Vec<i32> = rounds.iter().map(|&r| r as i32).collect();
        let rows = matches::table
            .filter(
                matches::tournament_id
                    .eq(tournament_id)
                    .and(matches::game_id.eq(game_id))
                    .and(matches::round_number.eq_any(rounds_i32)),
            )
            .select(MATCH_COLUMNS)
            .load::<DbMatch>(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Match::from).collect())
    }

    /// `pending -> running`, atomically: the `WHERE status = 'pending'`
    /// clause makes two workers racing on the same match a clean no-op for
    /// the loser (spec §4.3 step 3).
    #[instrument(name = "db.match.transition_to_running", skip(self))]
    async fn transition_to_running(&self, id: Uuid) -> DbResult<Match> {
        let mut conn = self.new_connection().await?;
        let res = diesel::update(matches::table.filter(matches::id.eq(id).and(matches::status.eq("pending"))))
            .set((matches::status.eq("running"), matches::started_at.eq(diesel::dsl::now)))
            .returning(MATCH_COLUMNS)
            .get_result::<DbMatch>(&mut conn)
            .await;

        match res {
            Ok(row) => Ok(row.into()),
            Err(diesel::result::Error::NotFound) => {
                warn!("match_not_pending_or_missing");
                Err(app_core::ports::DbError::OptimisticLockConflict)
            }
            Err(e) => Err(map_db_err(e)),
        }
    }

    #[instrument(name = "db.match.finish", skip(self, m))]
    async fn finish_match(&self, m: &Match) -> DbResult<Match> {
        let mut conn = self.new_connection().await?;
        let row = diesel::update(matches::table.filter(matches::id.eq(m.id)))
            .set((
                matches::status.eq(status_to_str(m.status)),
                matches::score1.eq(m.score1),
                matches::score2.eq(m.score2),
                matches::winner.eq(m.winner.map(|w| w.to_code() as i16)),
                matches::error_code.eq(m.error_code),
                matches::error_message.eq(&m.error_message),
                matches::completed_at.eq(m.completed_at),
            ))
            .returning(MATCH_COLUMNS)
            .get_result::<DbMatch>(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(row.into())
    }

    /// Recovery sweep (spec §4.3): any `running` match whose `started_at` is
    /// older than `older_than_secs` is assumed orphaned by a crashed worker.
    #[instrument(name = "db.match.reset_stale_running", skip(self))]
    async fn reset_stale_running(&self, older_than_secs: i64) -> DbResult<Vec<Match>> {
        let mut conn = self.new_connection().await?;
        let cutoff = Utc::now() - chrono::Duration::seconds(older_than_secs);
        let rows = diesel::update(
            matches::table.filter(matches::status.eq("running").and(matches::started_at.lt(cutoff))),
        )
        .set((matches::status.eq("pending"), matches::started_at.eq(None::<DateTime<Utc>>)))
        .returning(MATCH_COLUMNS)
        .get_results::<DbMatch>(&mut conn)
        .await
        .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Match::from).collect())
    }

    #[instrument(name = "db.match.status", skip(self))]
    async fn get_match_status(&self, id: Uuid) -> DbResult<Option<MatchStatus>> {
        let mut conn = self.new_connection().await?;
        let status: Option<String> = matches::table
            .filter(matches::id.eq(id))
            .select(matches::status)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_db_err)?;
        Ok(status.map(|s| status_from_str(&s)))
    }
}
