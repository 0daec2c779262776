//! Core deterministic primitives.
//!
//! Randomness and hashing shared by the game engine and the network layer.
//! Nothing in here touches the clock or global state.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::{DeterministicRng, RandomSource};
pub use hash::{compute_state_hash, StateHash, StateHasher};
