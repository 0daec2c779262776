//! State Fingerprints
//!
//! SHA-256 over a fixed field order. Clients compare the hash in each
//! snapshot, and tests use it to check that two replays of the same seed
//! and actions end in the same place.

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Domain separator for game fingerprints.
const GAME_STATE_DOMAIN: &[u8] = b"DIGIT_DUEL_STATE_V1";

/// Field-by-field SHA-256 builder.
///
/// Integers are little-endian and strings carry a length prefix, so the
/// byte stream is unambiguous. Callers must feed fields in a fixed order.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Hasher seeded with a domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Hasher for [`Game`](crate::game::state::Game) fingerprints.
    pub fn for_game_state() -> Self {
        Self::new(GAME_STATE_DOMAIN)
    }

    /// Byte.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Little-endian u32.
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Little-endian u64.
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// One byte, 0 or 1.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// 16 raw id bytes.
    #[inline]
    pub fn update_uuid(&mut self, uuid: &[u8; 16]) {
        self.hasher.update(uuid);
    }

    /// Presence flag, then the id when present.
    pub fn update_opt_uuid(&mut self, uuid: Option<&[u8; 16]>) {
        self.update_bool(uuid.is_some());
        if let Some(uuid) = uuid {
            self.update_uuid(uuid);
        }
    }

    /// Length-prefixed UTF-8.
    #[inline]
    pub fn update_str(&mut self, value: &str) {
        self.update_u32(value.len() as u32);
        self.hasher.update(value.as_bytes());
    }

    /// Finish and return the digest.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Fingerprint a game: revision and seed first, then whatever `add_state`
/// feeds in.
pub fn compute_state_hash<F>(revision: u64, rng_seed: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_game_state();
    hasher.update_u64(revision);
    hasher.update_u64(rng_seed);
    add_state(&mut hasher);
    hasher.finalize()
}

// =============================================================================
// TESTS
// =============================================================================
