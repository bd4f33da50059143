//! Domain entities of the tournament engine (spec §3).
//!
//! Entities reference each other only by id; the repository owns all
//! foreign-key relations, so there is no cyclic ownership between
//! `Tournament`, `Match` and `TournamentParticipant` in memory.

mod game;
mod leaderboard;
mod match_;
mod participant;
mod program;
mod rating;
mod team;
mod tournament;

pub use game::*;
pub use leaderboard::*;
pub use match_::*;
pub use participant::*;
pub use program::*;
pub use rating::*;
pub use team::*;
pub use tournament::*;
