//! In-memory `DistributedLock` fake. TTLs are not swept by a background
//! timer; a held key simply refuses a second `try_acquire` until
//! `release` runs, which is sufficient to exercise the "busy" path the
//! concurrency tests care about.

use app_core::ports::{CacheResult, DistributedLock, LockGuard};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct FakeLock {
    held: Mutex<HashMap<String, String>>,
}

impl FakeLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedLock for FakeLock {
    async fn try_acquire(&self, key: &str, _ttl: Duration) -> CacheResult<Option<LockGuard>> {
        let mut held = self.held.lock().unwrap();
        if held.contains_key(key) {
            return Ok(None);
        }
        let token = Uuid::new_v4().to_string();
        held.insert(key.to_string(), token.clone());
        Ok(Some(LockGuard { key: key.to_string(), token }))
    }

    async fn release(&self, guard: LockGuard) -> CacheResult<()> {
        let mut held = self.held.lock().unwrap();
        if held.get(&guard.key) == Some(&guard.token) {
            held.remove(&guard.key);
        }
        Ok(())
    }
}
