//! Cache / lock port (spec §4.5). Three logically distinct caches share a
//! key-value store with TTL support and atomic primitives. Cache-write
//! failures are always logged and swallowed by callers (spec §7) — the
//! repository has already committed the authoritative state.

use crate::domain::{LeaderboardEntry, Tournament};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CacheError {
    /// the key-value store is unreachable or returned an unexpected error
    #[error("cache backend error: {0}")]
    Backend(#[from] anyhow::Error),

    /// (de)serialization of a cached value failed
    #[error("cache serialization error: {0}")]
    Serde(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

#[async_trait]
pub trait TournamentCache: Send + Sync {
    async fn get_tournament(&self, id: Uuid) -> CacheResult<Option<Tournament>>;
    async fn put_tournament(&self, tournament: &Tournament, ttl: Duration) -> CacheResult<()>;
    async fn invalidate_tournament(&self, id: Uuid) -> CacheResult<()>;
}

#[async_trait]
pub trait LeaderboardCache: Send + Sync {
    /// Top-N rows ordered by rating descending; empty when the cache has
    /// not been populated yet (spec §4.1 `GetLeaderboard`: cache-first,
    /// backfill on miss).
    async fn top_n(&self, tournament_id: Uuid, limit: u32) -> CacheResult<Vec<LeaderboardEntry>>;
    /// Upsert a single program's rating (spec §4.4 step 4).
    async fn upsert_rating(&self, tournament_id: Uuid, program_id: Uuid, rating: i32) -> CacheResult<()>;
    /// Replace the whole sorted set for a tournament, used to backfill
    /// after a cache miss.
    async fn replace_all(&self, tournament_id: Uuid, entries: &[LeaderboardEntry]) -> CacheResult<()>;
    async fn invalidate(&self, tournament_id: Uuid) -> CacheResult<()>;
}

/// Distributed lock (spec §4.5, glossary "Distributed lock"): acquired by
/// set-if-absent with a TTL, released by compare-and-delete on a fencing
/// token so a holder that outlives its TTL can never delete someone
/// else's lock.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Acquire `key` for `ttl`, run `body`, then release — but only if the
    /// fencing token this call wrote is still the one stored (i.e. the TTL
    /// did not already expire and hand the key to another acquirer).
    /// Returns `Conflict`-mapped `LockError::Busy` if the key is already
    /// held.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> CacheResult<Option<LockGuard>>;
    async fn release(&self, guard: LockGuard) -> CacheResult<()>;
}

/// Fencing token proving ownership of a held lock.
#[derive(Debug, Clone)]
pub struct LockGuard {
    pub key: String,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum LockError {
    /// another holder currently owns this key
    #[error("lock busy: {0}")]
    Busy(String),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Acquire `key`, run `body`, release. Maps lock-busy onto `CoreError::Conflict`
/// at the call site (spec §4.1, §4.5).
pub async fn with_lock<L, F, Fut, T>(
    lock: &L,
    key: &str,
    ttl: Duration,
    body: F,
) -> Result<T, LockError>
where
    L: DistributedLock + ?Sized,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, LockError>>,
{
    let guard = lock
        .try_acquire(key, ttl)
        .await?
        .ok_or_else(|| LockError::Busy(key.to_string()))?;
    let result = body().await;
    // Release regardless of body's outcome; fencing token guarantees we
    // only ever delete our own lock.
    let _ = lock.release(guard).await;
    result
}
