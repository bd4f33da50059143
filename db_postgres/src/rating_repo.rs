//! `RatingRepository` implementation: the rating history insert and the
//! participant rating/stat update happen in one transaction (spec §4.4
//! step 3), and the insert is the idempotency gate (spec §8 property 8).

use crate::{PgDb, map_db_err, schema::*};
use app_core::domain::RatingHistory;
use app_core::ports::{DbResult, RatingRepository};
use async_trait::async_trait;
use diesel::prelude::{BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::{AsyncConnection, RunQueryDsl, scoped_futures::ScopedFutureExt};
use tracing::instrument;
use uuid::Uuid;

/// diesel-async's `transaction` requires its error type to implement
/// `From<diesel::result::Error>`, which `app_core::ports::DbError` cannot
/// (orphan rules: neither type is local to this crate). This thin wrapper
/// carries a raw diesel error through the transaction and is unwrapped
/// back into `DbError` once it returns.
enum TxError {
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(e: diesel::result::Error) -> Self {
        TxError::Diesel(e)
    }
}

#[async_trait]
impl RatingRepository for PgDb {
    #[instrument(name = "db.rating.record", skip(self, history))]
    async fn record_rating_change(&self, history: &RatingHistory, won: bool, draw: bool) -> DbResult<bool> {
        let mut conn = self.new_connection().await?;
        let history = *history;

        conn.transaction::<bool, TxError, _>(|conn| {
            async move {
                let exists: bool = diesel::select(diesel::dsl::exists(
                    rating_history::table.filter(
                        rating_history::program_id
                            .eq(history.program_id)
                            .and(rating_history::match_id.eq(history.match_id)),
                    ),
                ))
                .get_result(conn)
                .await?;

                if exists {
                    return Ok(false);
                }

                let tournament_id: Uuid = matches::table
                    .filter(matches::id.eq(history.match_id))
                    .select(matches::tournament_id)
                    .first(conn)
                    .await?;

                diesel::insert_into(rating_history::table)
                    .values((
                        rating_history::program_id.eq(history.program_id),
                        rating_history::match_id.eq(history.match_id),
                        rating_history::old_rating.eq(history.old_rating),
                        rating_history::new_rating.eq(history.new_rating),
                        rating_history::delta.eq(history.delta),
                    ))
                    .execute(conn)
                    .await?;

                let (win_inc, loss_inc, draw_inc) = if draw { (0, 0, 1) } else if won { (1, 0, 0) } else { (0, 1, 0) };

                diesel::update(
                    tournament_participants::table.filter(
                        tournament_participants::tournament_id
                            .eq(tournament_id)
                            .and(tournament_participants::program_id.eq(history.program_id)),
                    ),
                )
                .set((
                    tournament_participants::rating.eq(history.new_rating),
                    tournament_participants::wins.eq(tournament_participants::wins + win_inc),
                    tournament_participants::losses.eq(tournament_participants::losses + loss_inc),
                    tournament_participants::draws.eq(tournament_participants::draws + draw_inc),
                ))
                .execute(conn)
                .await?;

                Ok(true)
            }
            .scope_boxed()
        })
        .await
        .map_err(|TxError::Diesel(e)| map_db_err(e))
    }

    #[instrument(name = "db.rating.history_by_program", skip(self))]
    async fn get_history_by_program(&self, program_id: Uuid) -> DbResult<Vec<RatingHistory>> {
        let mut conn = self.new_connection().await?;
        let rows: Vec<(Uuid, Uuid, i32, i32, i32, chrono::DateTime<chrono::Utc>)> = rating_history::table
            .filter(rating_history::program_id.eq(program_id))
            .order(rating_history::recorded_at.asc())
            .select((
                rating_history::program_id,
                rating_history::match_id,
                rating_history::old_rating,
                rating_history::new_rating,
                rating_history::delta,
                rating_history::recorded_at,
            ))
            .load(&mut conn)
            .await
            .map_err(map_db_err)?;
        Ok(rows
            .into_iter()
            .map(|(program_id, match_id, old_rating, new_rating, delta, recorded_at)| RatingHistory {
                program_id,
                match_id,
                old_rating,
                new_rating,
                delta,
                recorded_at,
            })
            .collect())
    }

    #[instrument(name = "db.rating.history_exists", skip(self))]
    async fn history_exists_for_match(&self, program_id: Uuid, match_id: Uuid) -> DbResult<bool> {
        let mut conn = self.new_connection().await?;
        diesel::select(diesel::dsl::exists(
            rating_history::table
                .filter(rating_history::program_id.eq(program_id).and(rating_history::match_id.eq(match_id))),
        ))
        .get_result(&mut conn)
        .await
        .map_err(map_db_err)
    }
}
