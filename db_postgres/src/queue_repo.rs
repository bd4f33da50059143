//! `PriorityQueue` backed by the `priority_queue` table (spec §4.2): the
//! queue must survive restarts, so it lives in Postgres rather than memory.
//! Dequeue claims a row with `FOR UPDATE SKIP LOCKED` so concurrent workers
//! never hand out the same match twice, then deletes it in the same
//! statement -- the row only exists while it is actually queued.

use crate::match_repo::{priority_from_str, priority_to_str};
use crate::{PgDb, map_db_err, schema::*};
use app_core::domain::MatchPriority;
use app_core::ports::{PriorityQueue, QueueError, QueueResult, QueueSize};
use async_trait::async_trait;
use diesel::prelude::{ExpressionMethods, OptionalExtension, QueryDsl, QueryableByName};
use diesel::sql_types::Uuid as SqlUuid;
use diesel_async::RunQueryDsl;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

/// How long to sleep between empty polls. The table has no LISTEN/NOTIFY
/// wiring, so dequeue is a plain poll loop.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(QueryableByName)]
struct ClaimedId {
    #[diesel(sql_type = SqlUuid)]
    match_id: Uuid,
}

const CLAIM_SQL: &str = "
    DELETE FROM priority_queue
    WHERE match_id = (
        SELECT match_id FROM priority_queue
        ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, enqueued_at
        FOR UPDATE SKIP LOCKED
        LIMIT 1
    )
    RETURNING match_id
";

pub struct PgPriorityQueue {
    db: PgDb,
}

impl PgPriorityQueue {
    pub fn new(db: PgDb) -> Self {
        Self { db }
    }

    async fn try_claim(&self) -> QueueResult<Option<Uuid>> {
        let mut conn = self
            .db
            .new_connection()
            .await
            .map_err(|e| QueueError::Backend(e.into()))?;
        let claimed: Option<ClaimedId> = diesel::sql_query(CLAIM_SQL)
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(|e| QueueError::Backend(map_db_err(e).into()))?;
        Ok(claimed.map(|c| c.match_id))
    }
}

#[async_trait]
impl PriorityQueue for PgPriorityQueue {
    #[instrument(name = "queue.enqueue", skip(self))]
    async fn enqueue(&self, match_id: Uuid, priority: MatchPriority) -> QueueResult<()> {
        let mut conn = self
            .db
            .new_connection()
            .await
            .map_err(|e| QueueError::Backend(e.into()))?;
        diesel::insert_into(priority_queue::table)
            .values((
                priority_queue::match_id.eq(match_id),
                priority_queue::priority.eq(priority_to_str(priority)),
            ))
            .on_conflict(priority_queue::match_id)
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(|e| QueueError::Backend(map_db_err(e).into()))?;
        Ok(())
    }

    #[instrument(name = "queue.dequeue", skip(self, cancel))]
    async fn dequeue(&self, cancel: &CancellationToken) -> QueueResult<Option<Uuid>> {
        loop {
            if let Some(id) = self.try_claim().await? {
                return Ok(Some(id));
            }
            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }
    }

    #[instrument(name = "queue.size", skip(self))]
    async fn size(&self) -> QueueResult<QueueSize> {
        let mut conn = self
            .db
            .new_connection()
            .await
            .map_err(|e| QueueError::Backend(e.into()))?;
        let rows: Vec<String> = priority_queue::table
            .select(priority_queue::priority)
            .load(&mut conn)
            .await
            .map_err(|e| QueueError::Backend(map_db_err(e).into()))?;
        let mut size = QueueSize::default();
        for p in rows {
            match priority_from_str(&p) {
                MatchPriority::High => size.high += 1,
                MatchPriority::Medium => size.medium += 1,
                MatchPriority::Low => size.low += 1,
            }
        }
        Ok(size)
    }

    #[instrument(name = "queue.clear", skip(self))]
    async fn clear(&self) -> QueueResult<()> {
        let mut conn = self
            .db
            .new_connection()
            .await
            .map_err(|e| QueueError::Backend(e.into()))?;
        diesel::delete(priority_queue::table)
            .execute(&mut conn)
            .await
            .map_err(|e| QueueError::Backend(map_db_err(e).into()))?;
        Ok(())
    }

    #[instrument(name = "queue.purge_invalid", skip(self, still_valid))]
    async fn purge_invalid(&self, still_valid: &HashSet<Uuid>) -> QueueResult<u32> {
        let mut conn = self
            .db
            .new_connection()
            .await
            .map_err(|e| QueueError::Backend(e.into()))?;
        let queued: Vec<Uuid> = priority_queue::table
            .select(priority_queue::match_id)
            .load(&mut conn)
            .await
            .map_err(|e| QueueError::Backend(map_db_err(e).into()))?;
        let stale: Vec<Uuid> = queued.into_iter().filter(|id| !still_valid.contains(id)).collect();
        if stale.is_empty() {
            return Ok(0);
        }
        let removed = diesel::delete(priority_queue::table.filter(priority_queue::match_id.eq_any(&stale)))
            .execute(&mut conn)
            .await
            .map_err(|e| QueueError::Backend(map_db_err(e).into()))?;
        Ok(removed as u32)
    }
}
