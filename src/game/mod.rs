//! Game Logic Module
//!
//! Rules of Digit Duel. Deterministic given a [`RandomSource`](crate::core::RandomSource).
//!
//! ## Module Structure
//!
//! - `code`: Digit codes (secrets and guesses)
//! - `scoring`: Exact / misplaced feedback
//! - `state`: Game, players, settings, turn state
//! - `rotation`: Who guesses whom next
//! - `outcome`: End-of-game titles
//! - `patch`: Atomic changes and commit preconditions
//! - `lifecycle`: Guess, timeout and bot turns
//! - `lobby`: Seating, settings, secrets, chat
//! - `events`: Events for presentation and logs

pub mod code;
pub mod scoring;
pub mod state;
pub mod rotation;
pub mod outcome;
pub mod patch;
pub mod lifecycle;
pub mod lobby;
pub mod events;

// Re-export key types
pub use code::{Code, CodeError};
pub use scoring::{score, Feedback};
pub use state::{Game, GamePhase, GameSettings, Player, PlayerId, TurnKey};
pub use rotation::{next_turn, Rotation};
pub use outcome::{assign_outcomes, Outcome, TitlePool};
pub use patch::{GamePatch, Precondition};
pub use lifecycle::{LocalGame, Transition, TurnError};
pub use lobby::{LobbyError, SettingsUpdate};
pub use events::{GameEvent, GameEventData};
