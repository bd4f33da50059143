// tournament orchestration, rating engine, and supporting helpers

mod code_gen;
mod rating;
mod scheduling;
mod tournament_service;

pub use code_gen::generate_code;
pub use rating::{RatingUpdate, rate_match};
pub use scheduling::{newcomer_pairs, round_robin_pairs};
pub use tournament_service::TournamentService;
