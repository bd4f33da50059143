//! Round-robin pairing (spec §3 Match, §4.1 Start): every latest participant
//! of a game plays every other latest participant of that game, in both
//! program-position orders.

use uuid::Uuid;

/// Every ordered pair (i, j) with i != j among `participants`: n*(n-1)
/// matches for n participants, both (a,b) and (b,a) (program position may
/// carry a first-mover advantage, so the two orderings are distinct
/// matches, not a redundant mirror). Order is deterministic (participants
/// sorted ascending first) so re-running the same input always produces
/// the same schedule.
pub fn round_robin_pairs(participants: &[Uuid]) -> Vec<(Uuid, Uuid)> {
    let mut sorted = participants.to_vec();
    sorted.sort();
    let mut pairs = Vec::with_capacity(sorted.len() * sorted.len().saturating_sub(1));
    for i in 0..sorted.len() {
        for j in 0..sorted.len() {
            if i != j {
                pairs.push((sorted[i], sorted[j]));
            }
        }
    }
    pairs
}

/// Pairs a single newcomer against every already-scheduled participant
/// (spec §4.1 `ScheduleNewProgramMatches`): used when a team submits a new
/// program version, or joins, after a tournament's round for that game has
/// already been generated.
pub fn newcomer_pairs(newcomer: Uuid, existing: &[Uuid]) -> Vec<(Uuid, Uuid)> {
    let mut others: Vec<Uuid> = existing.iter().copied().filter(|&id| id != newcomer).collect();
    others.sort();
    others.into_iter().map(|other| (newcomer, other)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_covers_every_ordered_pair_exactly_once() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);
        let pairs = round_robin_pairs(&[a, b, c]);
        // n*(n-1) = 6: both (a,b) and (b,a) for every distinct pair.
        assert_eq!(pairs.len(), 6);
        for &(x, y) in &pairs {
            assert_ne!(x, y);
        }
        let mut seen = std::collections::HashSet::new();
        for &pair in &pairs {
            assert!(seen.insert(pair), "ordered pair {pair:?} scheduled more than once");
        }
        assert!(pairs.contains(&(a, b)));
        assert!(pairs.contains(&(b, a)));
    }

    #[test]
    fn round_robin_is_deterministic_regardless_of_input_order() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);
        let forward = round_robin_pairs(&[a, b, c]);
        let shuffled = round_robin_pairs(&[c, a, b]);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn single_participant_has_no_pairs() {
        assert!(round_robin_pairs(&[Uuid::from_u128(1)]).is_empty());
    }

    #[test]
    fn newcomer_pairs_excludes_self_and_is_sorted() {
        let newcomer = Uuid::from_u128(9);
        let existing = vec![Uuid::from_u128(3), newcomer, Uuid::from_u128(1)];
        let pairs = newcomer_pairs(newcomer, &existing);
        assert_eq!(pairs, vec![(newcomer, Uuid::from_u128(1)), (newcomer, Uuid::from_u128(3))]);
    }
}
