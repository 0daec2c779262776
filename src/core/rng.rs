//! Injectable Randomness
//!
//! Game code never calls a global random function. Everything that needs
//! randomness (bot guesses, secret generation, seat shuffling, title draws)
//! takes a [`RandomSource`], so tests can replay a game exactly.

use std::time::Duration;

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Injectable source of randomness.
///
/// Implementors only provide [`RandomSource::next_u64`]; every derived
/// helper is built on top of it so two sources yielding the same raw
/// sequence make identical decisions.
pub trait RandomSource {
    /// Generate the next 64-bit random value.
    fn next_u64(&mut self) -> u64;

    /// Generate a random integer in range [0, max).
    #[inline]
    fn next_int(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        // Modulo bias is negligible for the small ranges used here
        (self.next_u64() % max as u64) as u32
    }

    /// Generate a random integer in range [min, max].
    #[inline]
    fn next_int_range(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        min + self.next_int(max - min + 1)
    }

    /// Generate a random duration in range [min, max] at millisecond resolution.
    fn next_duration(&mut self, min: Duration, max: Duration) -> Duration {
        let lo = min.as_millis().min(u32::MAX as u128) as u32;
        let hi = max.as_millis().min(u32::MAX as u128) as u32;
        Duration::from_millis(self.next_int_range(lo, hi) as u64)
    }

    /// Shuffle a slice in place using Fisher-Yates algorithm.
    fn shuffle<T>(&mut self, slice: &mut [T])
    where
        Self: Sized,
    {
        let len = slice.len();
        for i in (1..len).rev() {
            let j = self.next_int((i + 1) as u32) as usize;
            slice.swap(i, j);
        }
    }

    /// Select a random element from a slice.
    fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T>
    where
        Self: Sized,
    {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_int(slice.len() as u32) as usize;
            slice.get(idx)
        }
    }
}

/// Seeded Xorshift128+, the only [`RandomSource`] the server uses.
///
/// Each room derives its seed with [`derive_game_seed`]; a test that
/// reuses the seed replays the room's bot guesses and shuffles exactly.
///
/// # Example
///
/// ```
/// use digit_duel::core::rng::{DeterministicRng, RandomSource};
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl DeterministicRng {
    /// Seed via SplitMix64 so small or sequential seeds still spread.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // All-zero state is a fixed point
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }
}

impl RandomSource for DeterministicRng {
    #[inline]
    fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }
}

#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a game seed from the room identity.
///
/// - `game_id`: Unique room identifier
/// - `player_ids`: Seated player IDs (caller decides the order; the same
///   order always yields the same seed)
pub fn derive_game_seed(game_id: &[u8; 16], player_ids: &[[u8; 16]]) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"DIGIT_DUEL_SEED_V1");
    hasher.update(game_id);
    for pid in player_ids {
        hasher.update(pid);
    }

    let hash = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================
