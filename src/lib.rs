//! # Digit Duel Game Server
//!
//! Turn-based code-breaking for 2 to 6 players. Everyone hides a digit code,
//! then players take turns guessing each other's codes in a fixed rotation.
//! A cracked code eliminates its owner; the last uncracked code wins.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   DIGIT DUEL SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Xorshift128+ behind RandomSource          │
//! │  └── hash.rs     - State fingerprints                        │
//! │                                                              │
//! │  game/           - Rules (deterministic)                     │
//! │  ├── code.rs     - Digit codes                               │
//! │  ├── scoring.rs  - Exact / misplaced feedback                │
//! │  ├── rotation.rs - Who guesses whom next                     │
//! │  ├── outcome.rs  - End-of-game titles                        │
//! │  ├── state.rs    - Game, players, settings                   │
//! │  ├── patch.rs    - Atomic changes and preconditions          │
//! │  ├── lifecycle.rs- Guesses, timeouts, bot turns              │
//! │  ├── lobby.rs    - Seating, settings, secrets, chat          │
//! │  └── events.rs   - Game events                               │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── store.rs    - Shared document with guarded commits      │
//! │  ├── session.rs  - Room driver and timers                    │
//! │  ├── protocol.rs - Message types                             │
//! │  └── server.rs   - WebSocket server                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! The `core/` and `game/` modules never read the clock or a global RNG:
//! - All randomness comes through [`RandomSource`]
//! - BTreeMap everywhere for sorted iteration
//! - Timestamps are passed in by the caller
//!
//! Given the same seed and the same actions, a game produces the same
//! state hash on any platform.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::rng::{DeterministicRng, RandomSource};
pub use crate::game::code::Code;
pub use crate::game::scoring::{score, Feedback};
pub use crate::game::state::{Game, GamePhase, GameSettings, PlayerId};
pub use crate::game::lifecycle::LocalGame;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
