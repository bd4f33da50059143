//! Uploaded bot programs (spec §3). Versioned monotonically per (team, game);
//! only the highest version is the "latest participant" for match generation.

use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Program {
    pub id: Uuid,
    pub team_id: Uuid,
    pub game_id: Uuid,
    pub tournament_id: Option<Uuid>,
    pub version: u32,
    /// opaque path to the uploaded executable; the core never interprets it
    pub file_path: String,
}

/// A (team, game) pairing resolved to its highest-version program, as
/// returned by `Repository::get_latest_participants*`.
#[derive(Debug, Clone)]
pub struct LatestParticipant {
    pub team_id: Uuid,
    pub game_id: Uuid,
    pub program: Program,
}
