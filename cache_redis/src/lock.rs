//! Set-NX / Lua-compare-and-delete distributed lock, the standard pattern
//! documented for the `redis` crate: acquire writes a random fencing token
//! only if the key is absent, release deletes it only if the stored token
//! still matches ours.

use app_core::ports::{CacheError, CacheResult, LockGuard};
use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

fn backend_err(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.into())
}

/// Deletes `KEYS[1]` only if its value still equals `ARGV[1]`, so a lock
/// whose TTL already expired and was re-acquired by someone else is never
/// deleted out from under them.
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

#[derive(Clone)]
pub struct RedisLock {
    pool: Pool<RedisConnectionManager>,
}

impl RedisLock {
    pub fn new(pool: Pool<RedisConnectionManager>) -> Self {
        Self { pool }
    }

    #[instrument(name = "lock.try_acquire", skip(self))]
    pub async fn try_acquire(&self, key: &str, ttl: Duration) -> CacheResult<Option<LockGuard>> {
        let token = Uuid::new_v4().to_string();
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Backend(e.into()))?;
        let acquired: bool = redis::cmd("SET")
            .arg(key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async::<Option<String>>(&mut *conn)
            .await
            .map(|r| r.is_some())
            .map_err(backend_err)?;

        if !acquired {
            return Ok(None);
        }
        Ok(Some(LockGuard { key: key.to_string(), token }))
    }

    #[instrument(name = "lock.release", skip(self, guard))]
    pub async fn release(&self, guard: LockGuard) -> CacheResult<()> {
        let mut conn = self.pool.get().await.map_err(|e| CacheError::Backend(e.into()))?;
        let script = redis::Script::new(RELEASE_SCRIPT);
        script
            .key(&guard.key)
            .arg(&guard.token)
            .invoke_async::<i64>(&mut *conn)
            .await
            .map(|_| ())
            .map_err(backend_err)
    }
}
