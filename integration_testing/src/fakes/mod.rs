//! In-memory adapters for every outbound port, used to exercise
//! `TournamentService` end to end without a database, cache, or queue.

mod cache;
mod lock;
mod queue;
mod repository;

pub use cache::{FakeLeaderboardCache, FakeTournamentCache};
pub use lock::FakeLock;
pub use queue::FakeQueue;
pub use repository::FakeRepository;
