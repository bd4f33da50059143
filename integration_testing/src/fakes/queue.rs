//! In-memory `PriorityQueue` fake: three `VecDeque`s guarded by a
//! `Mutex`, with a `Notify` to wake blocked `dequeue` callers.

use app_core::domain::MatchPriority;
use app_core::ports::{PriorityQueue, QueueResult, QueueSize};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Default)]
struct Levels {
    high: VecDeque<Uuid>,
    medium: VecDeque<Uuid>,
    low: VecDeque<Uuid>,
}

pub struct FakeQueue {
    levels: Mutex<Levels>,
    notify: Notify,
}

impl Default for FakeQueue {
    fn default() -> Self {
        Self { levels: Mutex::new(Levels::default()), notify: Notify::new() }
    }
}

impl FakeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn level_mut<'a>(levels: &'a mut Levels, priority: MatchPriority) -> &'a mut VecDeque<Uuid> {
        match priority {
            MatchPriority::High => &mut levels.high,
            MatchPriority::Medium => &mut levels.medium,
            MatchPriority::Low => &mut levels.low,
        }
    }

    fn pop(levels: &mut Levels) -> Option<Uuid> {
        levels.high.pop_front().or_else(|| levels.medium.pop_front()).or_else(|| levels.low.pop_front())
    }
}

#[async_trait]
impl PriorityQueue for FakeQueue {
    async fn enqueue(&self, match_id: Uuid, priority: MatchPriority) -> QueueResult<()> {
        let mut levels = self.levels.lock().unwrap();
        let already_queued = levels.high.contains(&match_id)
            || levels.medium.contains(&match_id)
            || levels.low.contains(&match_id);
        if !already_queued {
            Self::level_mut(&mut levels, priority).push_back(match_id);
        }
        drop(levels);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn dequeue(&self, cancel: &CancellationToken) -> QueueResult<Option<Uuid>> {
        loop {
            if let Some(id) = Self::pop(&mut self.levels.lock().unwrap()) {
                return Ok(Some(id));
            }
            if cancel.is_cancelled() {
                return Ok(None);
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = cancel.cancelled() => return Ok(None),
            }
        }
    }

    async fn size(&self) -> QueueResult<QueueSize> {
        let levels = self.levels.lock().unwrap();
        Ok(QueueSize { high: levels.high.len() as u64, medium: levels.medium.len() as u64, low: levels.low.len() as u64 })
    }

    async fn clear(&self) -> QueueResult<()> {
        let mut levels = self.levels.lock().unwrap();
        levels.high.clear();
        levels.medium.clear();
        levels.low.clear();
        Ok(())
    }

    async fn purge_invalid(&self, still_valid: &HashSet<Uuid>) -> QueueResult<u32> {
        let mut levels = self.levels.lock().unwrap();
        let mut removed = 0u32;
        for level in [&mut levels.high, &mut levels.medium, &mut levels.low] {
            let before = level.len();
            level.retain(|id| still_valid.contains(id));
            removed += (before - level.len()) as u32;
        }
        Ok(removed)
    }
}
