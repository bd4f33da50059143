//! TournamentParticipant: the (tournament, program) participation record
//! carrying rating and W/L/D counters (spec §3).

use uuid::Uuid;

pub const INITIAL_RATING: i32 = 1500;

#[derive(Debug, Clone, Copy)]
pub struct TournamentParticipant {
    pub tournament_id: Uuid,
    pub program_id: Uuid,
    pub rating: i32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl TournamentParticipant {
    pub fn new(tournament_id: Uuid, program_id: Uuid) -> Self {
        TournamentParticipant {
            tournament_id,
            program_id,
            rating: INITIAL_RATING,
            wins: 0,
            losses: 0,
            draws: 0,
        }
    }

    pub fn total_games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }
}
