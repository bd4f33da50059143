//! RatingHistory: append-only record per (participant, match) (spec §3).
//! Invariant: sum of deltas across a participant's history + 1500 equals
//! its current rating.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct RatingHistory {
    pub program_id: Uuid,
    pub match_id: Uuid,
    pub old_rating: i32,
    pub new_rating: i32,
    pub delta: i32,
    pub recorded_at: DateTime<Utc>,
}
