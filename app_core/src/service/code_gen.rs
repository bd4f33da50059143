//! Confusables-free tournament code generator (spec §6, §8 property 7).

use crate::domain::TOURNAMENT_CODE_ALPHABET;
use rand::Rng;

/// Generate a random code of `len` characters (6-8 per spec §3) drawn from
/// the confusables-free alphabet `ABCDEFGHJKLMNPQRSTUVWXYZ23456789`.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..TOURNAMENT_CODE_ALPHABET.len());
            TOURNAMENT_CODE_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    #[test]
    fn generated_codes_use_only_the_confusables_free_alphabet() {
        let mut rng = thread_rng();
        for _ in 0..1_000 {
            let code = generate_code(&mut rng, 8);
            assert_eq!(code.len(), 8);
            assert!(code.bytes().all(|b| TOURNAMENT_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn collisions_are_rare_across_a_large_sample() {
        let mut rng = thread_rng();
        let mut seen = std::collections::HashSet::new();
        let mut collisions = 0;
        for _ in 0..100_000 {
            let code = generate_code(&mut rng, 8);
            if !seen.insert(code) {
                collisions += 1;
            }
        }
        // spec §8 property 7: collide at most once in 10^6 samples w.h.p.
        assert!(collisions <= 1, "unexpectedly many collisions: {collisions}");
    }
}
