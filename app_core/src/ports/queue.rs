//! Priority queue port (spec §4.2): holds `pending` match work items
//! across three priority levels and survives restarts.

use crate::domain::MatchPriority;
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(#[from] anyhow::Error),
    /// `Dequeue` was cancelled before an item became available
    #[error("dequeue cancelled")]
    Cancelled,
}

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueSize {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl QueueSize {
    pub fn total(&self) -> u64 {
        self.high + self.medium + self.low
    }
}

#[async_trait]
pub trait PriorityQueue: Send + Sync {
    /// Publish `match_id` at `priority`. Idempotent: enqueuing the same id
    /// twice leaves a single queued entry.
    async fn enqueue(&self, match_id: Uuid, priority: MatchPriority) -> QueueResult<()>;

    /// Block until an item is available or `cancel` fires. Strict-priority
    /// ordering (high before medium before low); FIFO by enqueue time
    /// within a level (spec §4.2 starvation policy).
    async fn dequeue(&self, cancel: &CancellationToken) -> QueueResult<Option<Uuid>>;

    async fn size(&self) -> QueueResult<QueueSize>;

    async fn clear(&self) -> QueueResult<()>;

    /// Remove queued ids that are not present in `still_valid` (spec §4.2
    /// `PurgeInvalid` — the caller resolves existence against the
    /// repository first, since that check is itself async). Returns the
    /// number removed.
    async fn purge_invalid(&self, still_valid: &std::collections::HashSet<Uuid>) -> QueueResult<u32>;
}
