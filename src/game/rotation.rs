//! Turn Rotation
//!
//! Round-robin-with-elimination: every active non-target player guesses the
//! current target once, in seating order; then the target moves to the next
//! active seat. Stateless: the answer depends only on the arguments.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::game::state::PlayerId;

/// The turn that follows a resolved guess (or pass).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextTurn {
    /// Next player to guess.
    pub guesser: PlayerId,
    /// Player they guess against.
    pub target: PlayerId,
    /// True when the target changed.
    pub new_round: bool,
}

/// Result of a rotation step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    /// Play continues.
    Next(NextTurn),
    /// No valid next turn exists.
    GameOver,
}

impl Rotation {
    /// The next turn, if any.
    pub fn next_turn(self) -> Option<NextTurn> {
        match self {
            Rotation::Next(next) => Some(next),
            Rotation::GameOver => None,
        }
    }
}

/// Active members of `turn_order` other than `target`, in seating order.
pub fn guessers_for(turn_order: &[PlayerId], eliminated: &BTreeSet<PlayerId>, target: &PlayerId) -> Vec<PlayerId> {
    turn_order
        .iter()
        .filter(|id| !eliminated.contains(id) && *id != target)
        .copied()
        .collect()
}

/// Compute the turn after `last_guesser` acted against `last_target`.
///
/// `eliminated` must already include `last_target` if the guess just found it.
pub fn next_turn(
    turn_order: &[PlayerId],
    eliminated: &BTreeSet<PlayerId>,
    last_guesser: &PlayerId,
    last_target: &PlayerId,
    target_just_eliminated: bool,
) -> Rotation {
    if turn_order.len() <= 1 {
        return Rotation::GameOver;
    }

    let active_count = turn_order.iter().filter(|id| !eliminated.contains(id)).count();
    if active_count <= 1 {
        return Rotation::GameOver;
    }

    let cycle = guessers_for(turn_order, eliminated, last_target);
    // A guesser outside the cycle counts as sitting before its first entry.
    let next_index = cycle
        .iter()
        .position(|id| id == last_guesser)
        .map_or(0, |i| i + 1);

    let round_over = target_just_eliminated
        || eliminated.contains(last_target)
        || next_index >= cycle.len();

    if !round_over {
        #[cfg(feature = "debug-tracing")]
        tracing::debug!(guesser = %cycle[next_index], target = %last_target, "round continues");

        return Rotation::Next(NextTurn {
            guesser: cycle[next_index],
            target: *last_target,
            new_round: false,
        });
    }

    let Some(new_target) = advance_target(turn_order, eliminated, last_target) else {
        return Rotation::GameOver;
    };

    match guessers_for(turn_order, eliminated, &new_target).first() {
        Some(&guesser) => {
            #[cfg(feature = "debug-tracing")]
            tracing::debug!(%guesser, target = %new_target, "new round");

            Rotation::Next(NextTurn {
                guesser,
                target: new_target,
                new_round: true,
            })
        }
        None => Rotation::GameOver,
    }
}

/// First active seat after `target`, scanning circularly.
///
/// Returns `None` when the only active seat found is `target` itself.
fn advance_target(turn_order: &[PlayerId], eliminated: &BTreeSet<PlayerId>, target: &PlayerId) -> Option<PlayerId> {
    let len = turn_order.len();
    // An unseated target scans from seat 0.
    let start = turn_order.iter().position(|id| id == target).unwrap_or(len - 1);

    (1..=len)
        .map(|step| turn_order[(start + step) % len])
        .find(|id| !eliminated.contains(id))
        .filter(|id| id != target)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const A: PlayerId = PlayerId::new([1; 16]);
    const B: PlayerId = PlayerId::new([2; 16]);
    const C: PlayerId = PlayerId::new([3; 16]);
    const D: PlayerId = PlayerId::new([4; 16]);

    fn none() -> BTreeSet<PlayerId> {
        BTreeSet::new()
    }

    fn set(ids: &[PlayerId]) -> BTreeSet<PlayerId> {
        ids.iter().copied().collect()
    }

    fn next(guesser: PlayerId, target: PlayerId, new_round: bool) -> Rotation {
        Rotation::Next(NextTurn { guesser, target, new_round })
    }

    #[test]
    fn test_round_continues_in_seat_order() {
        let order = [A, B, C, D];
        // Cycle for target B is [A, C, D].
        assert_eq!(next_turn(&order, &none(), &A, &B, false), next(C, B, false));
        assert_eq!(next_turn(&order, &none(), &C, &B, false), next(D, B, false));
    }

    #[test]
    fn test_last_guesser_rotates_target() {
        let order = [A, B, C, D];
        // D closes the [A, C, D] cycle; target moves to C, cycle [A, B, D].
        assert_eq!(next_turn(&order, &none(), &D, &B, false), next(A, C, true));
    }

    #[test]
    fn test_full_walk_four_players() {
        let order = [A, B, C, D];
        let mut guesser = A;
        let mut target = B;
        let mut seen = Vec::new();

        for _ in 0..12 {
            seen.push((guesser, target));
            let n = next_turn(&order, &none(), &guesser, &target, false).next_turn().unwrap();
            guesser = n.guesser;
            target = n.target;
        }

        assert_eq!(
            seen,
            vec![
                (A, B), (C, B), (D, B),
                (A, C), (B, C), (D, C),
                (A, D), (B, D), (C, D),
                (B, A), (C, A), (D, A),
            ]
        );
        // And the target wraps back to B.
        assert_eq!((guesser, target), (A, B));
    }

    #[test]
    fn test_elimination_ends_round_immediately() {
        let order = [A, B, C, D];
        // A finds B with C and D still to guess.
        assert_eq!(next_turn(&order, &set(&[B]), &A, &B, true), next(A, C, true));
    }

    #[test]
    fn test_eliminated_players_skipped() {
        let order = [A, B, C, D];
        let out = set(&[C]);
        // Cycle for B is [A, D].
        assert_eq!(next_turn(&order, &out, &A, &B, false), next(D, B, false));
        // After D, target skips C and lands on D; cycle [A, B].
        assert_eq!(next_turn(&order, &out, &D, &B, false), next(A, D, true));
    }

    #[test]
    fn test_target_wraps_around() {
        let order = [A, B, C];
        // Target C, cycle [A, B]; after B the scan wraps to A.
        assert_eq!(next_turn(&order, &none(), &B, &C, false), next(B, A, true));
    }

    #[test]
    fn test_two_players_alternate() {
        let order = [A, B];
        assert_eq!(next_turn(&order, &none(), &A, &B, false), next(B, A, true));
        assert_eq!(next_turn(&order, &none(), &B, &A, false), next(A, B, true));
    }

    #[test]
    fn test_game_over_when_one_left() {
        let order = [A, B, C];
        assert_eq!(next_turn(&order, &set(&[B, C]), &A, &C, true), Rotation::GameOver);
    }

    #[test]
    fn test_degenerate_orders() {
        assert_eq!(next_turn(&[], &none(), &A, &B, false), Rotation::GameOver);
        assert_eq!(next_turn(&[A], &none(), &A, &A, false), Rotation::GameOver);
    }

    #[test]
    fn test_unknown_guesser_starts_cycle() {
        let order = [A, B, C, D];
        let stranger = PlayerId::new([9; 16]);
        assert_eq!(next_turn(&order, &none(), &stranger, &B, false), next(A, B, false));
    }

    #[test]
    fn test_unseated_target_scans_from_first_seat() {
        let order = [A, B, C];
        let stranger = PlayerId::new([9; 16]);
        // Cycle for the stranger is [A, B, C]; C closes it.
        assert_eq!(next_turn(&order, &none(), &C, &stranger, false), next(B, A, true));
    }

    fn arb_state() -> impl Strategy<Value = (Vec<PlayerId>, BTreeSet<PlayerId>, usize, usize, bool)> {
        (2usize..=6).prop_flat_map(|n| {
            let order: Vec<PlayerId> = (0..n).map(|i| PlayerId::new([i as u8 + 1; 16])).collect();
            (
                Just(order),
                prop::collection::vec(any::<bool>(), n),
                0..n,
                0..n,
                any::<bool>(),
            )
                .prop_map(|(order, mask, g, t, just)| {
                    let eliminated = order
                        .iter()
                        .zip(mask)
                        .filter(|(_, out)| *out)
                        .map(|(id, _)| *id)
                        .collect();
                    (order, eliminated, g, t, just)
                })
        })
    }

    proptest! {
        #[test]
        fn prop_next_turn_is_valid((order, eliminated, g, t, just) in arb_state()) {
            let rotation = next_turn(&order, &eliminated, &order[g], &order[t], just);
            let active = order.iter().filter(|id| !eliminated.contains(id)).count();

            match rotation {
                Rotation::Next(n) => {
                    prop_assert!(n.guesser != n.target);
                    prop_assert!(!eliminated.contains(&n.guesser));
                    prop_assert!(!eliminated.contains(&n.target));
                    prop_assert!(active >= 2);
                }
                Rotation::GameOver => prop_assert!(active <= 1),
            }
        }

        #[test]
        fn prop_replay_is_idempotent((order, eliminated, g, t, just) in arb_state()) {
            let first = next_turn(&order, &eliminated, &order[g], &order[t], just);
            let second = next_turn(&order, &eliminated, &order[g], &order[t], just);
            prop_assert_eq!(first, second);
        }
    }
}
