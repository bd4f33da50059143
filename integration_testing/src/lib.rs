//! In-memory fakes for every outbound port, used to exercise
//! `TournamentService` end to end without a database, cache, or broadcaster.

pub mod fakes;
pub mod harness;
