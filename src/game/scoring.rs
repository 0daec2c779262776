//! Guess Scoring
//!
//! Computes Mastermind-style feedback for one guess against one secret.
//! Pure, deterministic, allocation-light.

use serde::{Deserialize, Serialize};

use crate::game::code::Code;

/// Feedback for a single guess.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Feedback {
    /// Right digit, right position.
    pub exact: u32,
    /// Right digit, wrong position (each secret digit counted once).
    pub misplaced: u32,
}

impl Feedback {
    /// True when every position matched.
    #[inline]
    pub fn is_solved(&self, digit_count: usize) -> bool {
        self.exact as usize == digit_count
    }
}

/// Score `guess` against `secret`.
///
/// Two passes. The exact pass consumes both positions of every positional
/// match. The misplaced pass then walks the remaining guess digits and
/// consumes the first unconsumed secret position holding the same digit, so
/// a secret digit never satisfies two guess digits.
///
/// Both codes must have the same length; a mismatch is a caller bug.
pub fn score(secret: &Code, guess: &Code) -> Feedback {
    debug_assert_eq!(secret.len(), guess.len(), "secret and guess lengths differ");

    // `None` marks a consumed position.
    let mut secret_left: Vec<Option<u8>> = secret.digits().iter().copied().map(Some).collect();
    let mut guess_left: Vec<Option<u8>> = guess.digits().iter().copied().map(Some).collect();
    let mut feedback = Feedback::default();

    for (s, g) in secret_left.iter_mut().zip(guess_left.iter_mut()) {
        if *s == *g {
            feedback.exact += 1;
            *s = None;
            *g = None;
        }
    }

    for g in guess_left.into_iter().flatten() {
        if let Some(slot) = secret_left.iter_mut().find(|s| **s == Some(g)) {
            feedback.misplaced += 1;
            *slot = None;
        }
    }

    feedback
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn code(s: &str) -> Code {
        s.parse().unwrap()
    }

    fn fb(exact: u32, misplaced: u32) -> Feedback {
        Feedback { exact, misplaced }
    }

    #[test]
    fn test_all_misplaced_pairs() {
        assert_eq!(score(&code("1122"), &code("2211")), fb(0, 4));
    }

    #[test]
    fn test_two_exact_two_swapped() {
        assert_eq!(score(&code("1234"), &code("1243")), fb(2, 2));
    }

    #[test]
    fn test_repeated_digits_not_double_counted() {
        // Only two 1's in the secret and no 2's.
        assert_eq!(score(&code("1111"), &code("1122")), fb(2, 0));
    }

    #[test]
    fn test_secret_digit_satisfies_one_guess_digit() {
        // One 5 in the secret, three in the guess.
        assert_eq!(score(&code("5123"), &code("0555")), fb(0, 1));
        assert_eq!(score(&code("1235"), &code("5550")), fb(0, 1));
    }

    #[test]
    fn test_exact_takes_priority_over_misplaced() {
        // Guess position 3 is exact; position 0 must not also claim it.
        assert_eq!(score(&code("1007"), &code("7007")), fb(3, 0));
    }

    #[test]
    fn test_solved() {
        let f = score(&code("0420"), &code("0420"));
        assert_eq!(f, fb(4, 0));
        assert!(f.is_solved(4));
        assert!(!fb(3, 1).is_solved(4));
    }

    #[test]
    fn test_no_overlap() {
        assert_eq!(score(&code("123"), &code("456")), fb(0, 0));
    }

    fn digits(len: usize) -> impl Strategy<Value = Code> {
        prop::collection::vec(0u8..10, len).prop_map(|d| Code::from_digits(d).unwrap())
    }

    fn pair() -> impl Strategy<Value = (Code, Code)> {
        (1usize..=8).prop_flat_map(|len| (digits(len), digits(len)))
    }

    proptest! {
        #[test]
        fn prop_pegs_bounded((secret, guess) in pair()) {
            let f = score(&secret, &guess);
            prop_assert!((f.exact + f.misplaced) as usize <= secret.len());
        }

        #[test]
        fn prop_solved_iff_equal((secret, guess) in pair()) {
            let f = score(&secret, &guess);
            prop_assert_eq!(f.is_solved(secret.len()), secret == guess);
        }

        #[test]
        fn prop_total_is_multiset_overlap((secret, guess) in pair()) {
            // exact + misplaced equals the multiset intersection size.
            let mut counts_s = [0u32; 10];
            let mut counts_g = [0u32; 10];
            for d in secret.digits() { counts_s[*d as usize] += 1; }
            for d in guess.digits() { counts_g[*d as usize] += 1; }
            let overlap: u32 = (0..10).map(|i| counts_s[i].min(counts_g[i])).sum();

            let f = score(&secret, &guess);
            prop_assert_eq!(f.exact + f.misplaced, overlap);
        }
    }
}
