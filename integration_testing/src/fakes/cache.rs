//! In-memory `TournamentCache` / `LeaderboardCache` fakes. TTLs are
//! accepted but not enforced -- tests run far faster than any real TTL
//! and never assert on expiry, only on invalidation.

use app_core::domain::{LeaderboardEntry, Tournament};
use app_core::ports::{CacheResult, LeaderboardCache, TournamentCache};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
pub struct FakeTournamentCache {
    entries: Mutex<HashMap<Uuid, Tournament>>,
}

impl FakeTournamentCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TournamentCache for FakeTournamentCache {
    async fn get_tournament(&self, id: Uuid) -> CacheResult<Option<Tournament>> {
        Ok(self.entries.lock().unwrap().get(&id).cloned())
    }

    async fn put_tournament(&self, tournament: &Tournament, _ttl: Duration) -> CacheResult<()> {
        if let Some(id) = tournament.id() {
            self.entries.lock().unwrap().insert(id, tournament.clone());
        }
        Ok(())
    }

    async fn invalidate_tournament(&self, id: Uuid) -> CacheResult<()> {
        self.entries.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLeaderboardCache {
    rows: Mutex<HashMap<Uuid, HashMap<Uuid, LeaderboardEntry>>>,
}

impl FakeLeaderboardCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaderboardCache for FakeLeaderboardCache {
    async fn top_n(&self, tournament_id: Uuid, limit: u32) -> CacheResult<Vec<LeaderboardEntry>> {
        let rows = self.rows.lock().unwrap();
        let Some(by_program) = rows.get(&tournament_id) else { return Ok(Vec::new()) };
        let mut entries: Vec<LeaderboardEntry> = by_program.values().cloned().collect();
        entries.sort_by(|a, b| b.rating.cmp(&a.rating).then_with(|| a.program_id.cmp(&b.program_id)));
        entries.truncate(limit as usize);
        for (idx, entry) in entries.iter_mut().enumerate() {
            entry.rank = idx as u32 + 1;
        }
        Ok(entries)
    }

    async fn upsert_rating(&self, tournament_id: Uuid, program_id: Uuid, rating: i32) -> CacheResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let by_program = rows.entry(tournament_id).or_default();
        let entry = by_program.entry(program_id).or_insert(LeaderboardEntry {
            rank: 0,
            tournament_id,
            program_id,
            rating,
            wins: 0,
            losses: 0,
            draws: 0,
        });
        entry.rating = rating;
        Ok(())
    }

    async fn replace_all(&self, tournament_id: Uuid, entries: &[LeaderboardEntry]) -> CacheResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let by_program: HashMap<Uuid, LeaderboardEntry> =
            entries.iter().cloned().map(|e| (e.program_id, e)).collect();
        rows.insert(tournament_id, by_program);
        Ok(())
    }

    async fn invalidate(&self, tournament_id: Uuid) -> CacheResult<()> {
        self.rows.lock().unwrap().remove(&tournament_id);
        Ok(())
    }
}
