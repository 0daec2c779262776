//! Game Events
//!
//! Events emitted by committed transitions, for presentation and logs.
//! Each carries the revision its transition produced.

use serde::{Serialize, Deserialize};

use crate::game::code::Code;
use crate::game::outcome::Outcome;
use crate::game::state::{GamePhase, GameSettings, PlayerId};

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameEventData {
    /// A player took a seat
    PlayerJoined {
        player_id: PlayerId,
        name: String,
        is_bot: bool,
    },

    /// A player left or was removed
    PlayerLeft {
        player_id: PlayerId,
    },

    /// Host changed the settings
    SettingsChanged {
        settings: GameSettings,
    },

    /// A player locked in a secret
    SecretLocked {
        player_id: PlayerId,
    },

    /// Phase changed
    PhaseChanged {
        old_phase: GamePhase,
        new_phase: GamePhase,
    },

    /// A guess was scored
    GuessScored {
        guesser_id: PlayerId,
        target_id: PlayerId,
        guess: Code,
        exact: u32,
        misplaced: u32,
    },

    /// A code was cracked
    PlayerEliminated {
        player_id: PlayerId,
        found_by: PlayerId,
    },

    /// The guesser ran out of time
    TurnPassed {
        player_id: PlayerId,
    },

    /// A new turn started
    TurnStarted {
        guesser_id: PlayerId,
        target_id: PlayerId,
        turn_number: u64,
        new_round: bool,
    },

    /// Game over with titles
    GameEnded {
        winner_id: Option<PlayerId>,
        outcomes: Vec<Outcome>,
    },

    /// The state could not produce a next turn
    Inconsistency {
        reason: String,
    },

    /// A chat line was posted
    ChatPosted {
        player_id: PlayerId,
        text: String,
    },
}

/// A game event stamped with the revision it produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Revision after the transition
    pub revision: u64,

    /// Player involved, if any
    pub player_id: Option<PlayerId>,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(revision: u64, data: GameEventData) -> Self {
        let player_id = match &data {
            GameEventData::PlayerJoined { player_id, .. } => Some(*player_id),
            GameEventData::PlayerLeft { player_id } => Some(*player_id),
            GameEventData::SecretLocked { player_id } => Some(*player_id),
            GameEventData::GuessScored { guesser_id, .. } => Some(*guesser_id),
            GameEventData::PlayerEliminated { player_id, .. } => Some(*player_id),
            GameEventData::TurnPassed { player_id } => Some(*player_id),
            GameEventData::TurnStarted { guesser_id, .. } => Some(*guesser_id),
            GameEventData::GameEnded { winner_id, .. } => *winner_id,
            GameEventData::ChatPosted { player_id, .. } => Some(*player_id),
            _ => None,
        };

        Self {
            revision,
            player_id,
            data,
        }
    }

    /// Create guess scored event.
    pub fn guess_scored(
        revision: u64,
        guesser_id: PlayerId,
        target_id: PlayerId,
        guess: Code,
        exact: u32,
        misplaced: u32,
    ) -> Self {
        Self::new(
            revision,
            GameEventData::GuessScored {
                guesser_id,
                target_id,
                guess,
                exact,
                misplaced,
            },
        )
    }

    /// Create player eliminated event.
    pub fn player_eliminated(revision: u64, player_id: PlayerId, found_by: PlayerId) -> Self {
        Self::new(revision, GameEventData::PlayerEliminated { player_id, found_by })
    }

    /// Create turn passed event.
    pub fn turn_passed(revision: u64, player_id: PlayerId) -> Self {
        Self::new(revision, GameEventData::TurnPassed { player_id })
    }

    /// Create turn started event.
    pub fn turn_started(
        revision: u64,
        guesser_id: PlayerId,
        target_id: PlayerId,
        turn_number: u64,
        new_round: bool,
    ) -> Self {
        Self::new(
            revision,
            GameEventData::TurnStarted {
                guesser_id,
                target_id,
                turn_number,
                new_round,
            },
        )
    }

    /// Create game ended event.
    pub fn game_ended(revision: u64, winner_id: Option<PlayerId>, outcomes: Vec<Outcome>) -> Self {
        Self::new(revision, GameEventData::GameEnded { winner_id, outcomes })
    }

    /// Create inconsistency event.
    pub fn inconsistency(revision: u64, reason: impl Into<String>) -> Self {
        Self::new(revision, GameEventData::Inconsistency { reason: reason.into() })
    }

    /// Create phase changed event.
    pub fn phase_changed(revision: u64, old_phase: GamePhase, new_phase: GamePhase) -> Self {
        Self::new(revision, GameEventData::PhaseChanged { old_phase, new_phase })
    }

    /// Create player joined event.
    pub fn player_joined(revision: u64, player_id: PlayerId, name: impl Into<String>, is_bot: bool) -> Self {
        Self::new(
            revision,
            GameEventData::PlayerJoined {
                player_id,
                name: name.into(),
                is_bot,
            },
        )
    }

    /// Create player left event.
    pub fn player_left(revision: u64, player_id: PlayerId) -> Self {
        Self::new(revision, GameEventData::PlayerLeft { player_id })
    }

    /// Create settings changed event.
    pub fn settings_changed(revision: u64, settings: GameSettings) -> Self {
        Self::new(revision, GameEventData::SettingsChanged { settings })
    }

    /// Create secret locked event.
    pub fn secret_locked(revision: u64, player_id: PlayerId) -> Self {
        Self::new(revision, GameEventData::SecretLocked { player_id })
    }

    /// Create chat posted event.
    pub fn chat_posted(revision: u64, player_id: PlayerId, text: impl Into<String>) -> Self {
        Self::new(revision, GameEventData::ChatPosted { player_id, text: text.into() })
    }

    /// Same event, restamped with the revision the store reported.
    pub fn at_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_extracted() {
        let a = PlayerId::new([1; 16]);
        let b = PlayerId::new([2; 16]);

        assert_eq!(GameEvent::player_eliminated(3, b, a).player_id, Some(b));
        assert_eq!(GameEvent::turn_started(3, a, b, 2, false).player_id, Some(a));
        assert_eq!(GameEvent::game_ended(3, None, vec![]).player_id, None);
        assert_eq!(GameEvent::inconsistency(3, "no target").player_id, None);
    }

    #[test]
    fn test_restamp() {
        let e = GameEvent::turn_passed(0, PlayerId::new([1; 16])).at_revision(9);
        assert_eq!(e.revision, 9);
    }

    #[test]
    fn test_json_is_tagged() {
        let e = GameEvent::phase_changed(1, GamePhase::Setup, GamePhase::Playing);
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"kind\":\"phase_changed\""));
        assert!(json.contains("\"new_phase\":\"playing\""));
    }
}
