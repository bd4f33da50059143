//! Redis-backed implementation of the cache/lock port (spec §4.5): tournament
//! blobs and leaderboard sorted sets behind a bb8 connection pool, plus a
//! set-NX/Lua-compare-and-delete distributed lock.

mod lock;

use app_core::domain::{LeaderboardEntry, Tournament};
use app_core::ports::{CacheError, CacheResult, DistributedLock, LeaderboardCache, LockGuard, TournamentCache};
use async_trait::async_trait;
use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{instrument, warn};
use uuid::Uuid;

pub use lock::RedisLock;

fn backend_err(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.into())
}

fn tournament_key(id: Uuid) -> String {
    format!("tournament:{id}")
}

fn leaderboard_ratings_key(tournament_id: Uuid) -> String {
    format!("leaderboard:{tournament_id}:ratings")
}

fn leaderboard_entries_key(tournament_id: Uuid) -> String {
    format!("leaderboard:{tournament_id}:entries")
}

/// Shared pool handle. Cheap to clone; every adapter (`RedisTournamentCache`,
/// `RedisLeaderboardCache`, `RedisLock`) wraps the same pool.
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool<RedisConnectionManager>,
}

impl RedisPool {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let manager = RedisConnectionManager::new(url)?;
        let pool = Pool::builder().build(manager).await?;
        Ok(Self { pool })
    }

    pub fn tournament_cache(&self) -> RedisTournamentCache {
        RedisTournamentCache { pool: self.pool.clone() }
    }

    pub fn leaderboard_cache(&self) -> RedisLeaderboardCache {
        RedisLeaderboardCache { pool: self.pool.clone() }
    }

    pub fn lock(&self) -> RedisLock {
        RedisLock::new(self.pool.clone())
    }
}

#[derive(Clone)]
pub struct RedisTournamentCache {
    pool: Pool<RedisConnectionManager>,
}

#[async_trait]
impl TournamentCache for RedisTournamentCache {
    #[instrument(name = "cache.tournament.get", skip(self))]
    async fn get_tournament(&self, id: Uuid) -> CacheResult<Option<Tournament>> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Backend(e.into()))?;
        let raw: Option<String> = conn.get(tournament_key(id)).await.map_err(backend_err)?;
        match raw {
            Some(json) => serde_json::from_str(&json).map(Some).map_err(|e| CacheError::Serde(e.to_string())),
            None => Ok(None),
        }
    }

    #[instrument(name = "cache.tournament.put", skip(self, tournament))]
    async fn put_tournament(&self, tournament: &Tournament, ttl: Duration) -> CacheResult<()> {
        let Some(id) = tournament.id() else {
            warn!("refusing to cache a tournament with no id");
            return Ok(());
        };
        let json = serde_json::to_string(tournament).map_err(|e| CacheError::Serde(e.to_string()))?;
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Backend(e.into()))?;
        conn.set_ex::<_, _, ()>(tournament_key(id), json, ttl.as_secs().max(1))
            .await
            .map_err(backend_err)
    }

    #[instrument(name = "cache.tournament.invalidate", skip(self))]
    async fn invalidate_tournament(&self, id: Uuid) -> CacheResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Backend(e.into()))?;
        conn.del::<_, ()>(tournament_key(id)).await.map_err(backend_err)
    }
}

#[derive(Clone)]
pub struct RedisLeaderboardCache {
    pool: Pool<RedisConnectionManager>,
}

/// Stored alongside the sorted-set score: everything `LeaderboardEntry`
/// carries besides the rank (computed from position) and the rating (kept
/// authoritative in the sorted set itself).
#[derive(serde::Serialize, serde::Deserialize)]
struct EntryStats {
    wins: u32,
    losses: u32,
    draws: u32,
}

#[async_trait]
impl LeaderboardCache for RedisLeaderboardCache {
    #[instrument(name = "cache.leaderboard.top_n", skip(self))]
    async fn top_n(&self, tournament_id: Uuid, limit: u32) -> CacheResult<Vec<LeaderboardEntry>> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Backend(e.into()))?;
        let ranked: Vec<(String, i64)> = conn
            .zrevrange_withscores(leaderboard_ratings_key(tournament_id), 0, limit.saturating_sub(1) as isize)
            .await
            .map_err(backend_err)?;
        if ranked.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<&str> = ranked.iter().map(|(id, _)| id.as_str()).collect();
        let blobs: Vec<Option<String>> =
            conn.hget(leaderboard_entries_key(tournament_id), &ids).await.map_err(backend_err)?;

        let mut out = Vec::with_capacity(ranked.len());
        for (idx, ((program_id, rating), blob)) in ranked.into_iter().zip(blobs).enumerate() {
            let Ok(program_id) = program_id.parse::<Uuid>() else { continue };
            let stats: EntryStats = match blob {
                Some(json) => serde_json::from_str(&json).map_err(|e| CacheError::Serde(e.to_string()))?,
                None => EntryStats { wins: 0, losses: 0, draws: 0 },
            };
            out.push(LeaderboardEntry {
                rank: idx as u32 + 1,
                tournament_id,
                program_id,
                rating: rating as i32,
                wins: stats.wins,
                losses: stats.losses,
                draws: stats.draws,
            });
        }
        Ok(out)
    }

    #[instrument(name = "cache.leaderboard.upsert_rating", skip(self))]
    async fn upsert_rating(&self, tournament_id: Uuid, program_id: Uuid, rating: i32) -> CacheResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Backend(e.into()))?;
        conn.zadd::<_, _, _, ()>(leaderboard_ratings_key(tournament_id), program_id.to_string(), rating as i64)
            .await
            .map_err(backend_err)
    }

    #[instrument(name = "cache.leaderboard.replace_all", skip(self, entries))]
    async fn replace_all(&self, tournament_id: Uuid, entries: &[LeaderboardEntry]) -> CacheResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Backend(e.into()))?;
        let ratings_key = leaderboard_ratings_key(tournament_id);
        let entries_key = leaderboard_entries_key(tournament_id);

        let mut pipe = redis::pipe();
        pipe.atomic().del(&ratings_key).del(&entries_key);
        for e in entries {
            let stats = EntryStats { wins: e.wins, losses: e.losses, draws: e.draws };
            let blob = serde_json::to_string(&stats).map_err(|err| CacheError::Serde(err.to_string()))?;
            pipe.zadd(&ratings_key, e.program_id.to_string(), e.rating as i64);
            pipe.hset(&entries_key, e.program_id.to_string(), blob);
        }
        pipe.query_async::<()>(&mut *conn).await.map_err(backend_err)
    }

    #[instrument(name = "cache.leaderboard.invalidate", skip(self))]
    async fn invalidate(&self, tournament_id: Uuid) -> CacheResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Backend(e.into()))?;
        conn.del::<_, ()>([leaderboard_ratings_key(tournament_id), leaderboard_entries_key(tournament_id)])
            .await
            .map_err(backend_err)
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> CacheResult<Option<LockGuard>> {
        RedisLock::try_acquire(self, key, ttl).await
    }

    async fn release(&self, guard: LockGuard) -> CacheResult<()> {
        RedisLock::release(self, guard).await
    }
}
