//! ELO rating engine (spec §6, §3 `RatingHistory`).
//!
//! `E_A = 1 / (1 + 10^((R_B - R_A) / 400))`
//! `R'_A = round(R_A + K * (S_A - E_A))`
//!
//! K is adaptive by rating bracket (spec §6 design note): new/low-rated
//! participants move faster than established ones, same rationale as
//! USCF/FIDE K-factor schedules.

use crate::domain::{RatingHistory, Winner};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// K-factor brackets, highest rating first: 16 at/above 2400, 24 at/above
/// 1800, 32 at/above 1200, 40 below that.
const K_SCHEDULE: &[(i32, i32)] = &[(2400, 16), (1800, 24), (1200, 32), (i32::MIN, 40)];

fn k_factor(rating: i32) -> f64 {
    for &(floor, k) in K_SCHEDULE {
        if rating >= floor {
            return k as f64;
        }
    }
    unreachable!("K_SCHEDULE always has a catch-all floor")
}

fn expected_score(rating_a: i32, rating_b: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) as f64 / 400.0))
}

/// Actual score for program1 given the match winner: 1.0 win, 0.5 draw, 0.0 loss.
fn actual_score(winner: Winner) -> f64 {
    match winner {
        Winner::Program1 => 1.0,
        Winner::Draw => 0.5,
        Winner::Program2 => 0.0,
    }
}

/// Outcome of rating one completed match: the two updated ratings plus the
/// history rows to persist. Both programs are always touched together.
#[derive(Debug, Clone)]
pub struct RatingUpdate {
    pub program1_rating: i32,
    pub program2_rating: i32,
    pub history1: RatingHistory,
    pub history2: RatingHistory,
}

/// Compute the post-match ratings for a single match result. Pure function:
/// callers own persistence and idempotency (spec §8 property: applying the
/// same match result twice must not double-count).
pub fn rate_match(
    match_id: Uuid,
    program1_id: Uuid,
    program1_rating: i32,
    program2_id: Uuid,
    program2_rating: i32,
    winner: Winner,
    recorded_at: DateTime<Utc>,
) -> RatingUpdate {
    let e1 = expected_score(program1_rating, program2_rating);
    let e2 = expected_score(program2_rating, program1_rating);
    let s1 = actual_score(winner);
    let s2 = 1.0 - s1;

    let k1 = k_factor(program1_rating);
    let k2 = k_factor(program2_rating);

    let new1 = (program1_rating as f64 + k1 * (s1 - e1)).round() as i32;
    let new2 = (program2_rating as f64 + k2 * (s2 - e2)).round() as i32;

    RatingUpdate {
        program1_rating: new1,
        program2_rating: new2,
        history1: RatingHistory {
            program_id: program1_id,
            match_id,
            old_rating: program1_rating,
            new_rating: new1,
            delta: new1 - program1_rating,
            recorded_at,
        },
        history2: RatingHistory {
            program_id: program2_id,
            match_id,
            old_rating: program2_rating,
            new_rating: new2,
            delta: new2 - program2_rating,
            recorded_at,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn equal_ratings_draw_leaves_both_unchanged() {
        let update = rate_match(Uuid::nil(), Uuid::nil(), 1500, Uuid::nil(), 1500, Winner::Draw, ts());
        assert_eq!(update.program1_rating, 1500);
        assert_eq!(update.program2_rating, 1500);
    }

    #[test]
    fn upset_win_gains_more_than_expected_win() {
        let upset = rate_match(Uuid::nil(), Uuid::nil(), 1400, Uuid::nil(), 1700, Winner::Program1, ts());
        let expected_win = rate_match(Uuid::nil(), Uuid::nil(), 1700, Uuid::nil(), 1400, Winner::Program1, ts());
        let upset_gain = upset.program1_rating - 1400;
        let expected_gain = expected_win.program1_rating - 1700;
        assert!(upset_gain > expected_gain);
    }

    #[test]
    fn rating_conservation_zero_sum_when_k_factors_match() {
        // Both programs in the same bracket (32): total rating is conserved.
        let update = rate_match(Uuid::nil(), Uuid::nil(), 1550, Uuid::nil(), 1600, Winner::Program2, ts());
        let delta1 = update.program1_rating - 1550;
        let delta2 = update.program2_rating - 1600;
        assert_eq!(delta1 + delta2, 0);
    }

    #[test]
    fn history_deltas_match_rating_changes() {
        let update = rate_match(Uuid::nil(), Uuid::nil(), 1500, Uuid::nil(), 1500, Winner::Program1, ts());
        assert_eq!(update.history1.delta, update.program1_rating - 1500);
        assert_eq!(update.history2.delta, update.program2_rating - 1500);
    }

    #[test]
    fn high_rated_players_move_with_a_smaller_k_factor() {
        assert_eq!(k_factor(2500), 16.0);
        assert_eq!(k_factor(2000), 24.0);
        assert_eq!(k_factor(1300), 32.0);
        assert_eq!(k_factor(1000), 40.0);
    }
}
