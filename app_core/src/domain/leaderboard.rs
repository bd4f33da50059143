//! Derived leaderboard views (spec §3). These are read models: never
//! mutated directly, always produced either from the repository's ranked
//! view or backfilled into the leaderboard cache.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub tournament_id: Uuid,
    pub program_id: Uuid,
    pub rating: i32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl LeaderboardEntry {
    pub fn total_games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }
}

/// Per-game contribution to a `CrossGameLeaderboardEntry`.
#[derive(Debug, Clone)]
pub struct GameSubEntry {
    pub game_id: Uuid,
    pub rating: i32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

/// One team/program aggregated across all games of a tournament (spec §3).
/// Always computed from the repository; not incrementally maintainable in
/// a cache (§4.1 `GetCrossGameLeaderboard`).
#[derive(Debug, Clone)]
pub struct CrossGameLeaderboardEntry {
    pub rank: u32,
    pub tournament_id: Uuid,
    pub team_id: Uuid,
    pub total_rating: i64,
    pub per_game: Vec<GameSubEntry>,
}

/// Sort leaderboard rows by rating descending, ties broken by program id
/// lexicographically (spec §3), and assign 1-based ranks.
pub fn rank_by_rating(mut rows: Vec<(Uuid, i32, u32, u32, u32)>, tournament_id: Uuid) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.into_iter()
        .enumerate()
        .map(|(idx, (program_id, rating, wins, losses, draws))| LeaderboardEntry {
            rank: idx as u32 + 1,
            tournament_id,
            program_id,
            rating,
            wins,
            losses,
            draws,
        })
        .collect()
}
