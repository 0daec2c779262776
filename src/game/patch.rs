//! Game Patches
//!
//! A patch is one indivisible change to a [`Game`]. The controller computes
//! patches from a snapshot; whoever owns the game applies them, either
//! directly (local play) or through a store commit guarded by a
//! [`Precondition`] (shared play). Both paths end in [`Game::apply_patch`].

use serde::{Deserialize, Serialize};

use crate::game::outcome::Outcome;
use crate::game::state::{Game, GamePhase, GuessResult, PlayerId, TurnKey};

/// What must still hold when a patch is committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precondition {
    /// No other commit happened since the snapshot was read.
    Revision(u64),
    /// The game is still playing the same turn.
    Turn(TurnKey),
}

/// A guess to append to the target's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedGuess {
    /// Player guessed against.
    pub target_id: PlayerId,
    /// Scored guess.
    pub result: GuessResult,
    /// The guess cracked the target's code.
    pub eliminates: bool,
}

/// How the turn ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnResolution {
    /// Hand the turn to the next pair.
    Next {
        /// Next guesser.
        guesser: PlayerId,
        /// Next target.
        target: PlayerId,
    },
    /// Freeze the game.
    GameOver {
        /// Survivor, if one could be determined.
        winner_id: Option<PlayerId>,
        /// Titles for every player.
        outcomes: Vec<Outcome>,
    },
}

/// Everything a single turn changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnPatch {
    /// Absent for a pass (timeout).
    pub guess: Option<RecordedGuess>,
    /// Next turn or game over.
    pub resolution: TurnResolution,
}

/// A change to commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePatch {
    /// Turn transition during play.
    Turn(TurnPatch),
    /// Whole-document replacement (lobby, setup, chat).
    Replace(Box<Game>),
}

impl Game {
    /// Does the live state still satisfy `precondition`?
    pub fn satisfies(&self, precondition: &Precondition) -> bool {
        match precondition {
            Precondition::Revision(revision) => self.revision == *revision,
            Precondition::Turn(key) => self.turn_key() == Some(*key),
        }
    }

    /// Apply a patch and bump the revision.
    pub fn apply_patch(&mut self, patch: &GamePatch) {
        let revision = self.revision;

        match patch {
            GamePatch::Turn(turn_patch) => self.apply_turn(turn_patch),
            GamePatch::Replace(game) => *self = (**game).clone(),
        }

        self.revision = revision + 1;
    }

    fn apply_turn(&mut self, patch: &TurnPatch) {
        if let Some(recorded) = &patch.guess {
            if let Some(target) = self.players.get_mut(&recorded.target_id) {
                target.guess_history.push(recorded.result.clone());
                target.is_eliminated |= recorded.eliminates;
            }
        }

        match &patch.resolution {
            TurnResolution::Next { guesser, target } => {
                if let Some(turn) = self.turn.as_mut() {
                    turn.current_guesser = *guesser;
                    turn.current_target = *target;
                    turn.turn_number += 1;
                }
            }
            TurnResolution::GameOver { winner_id, outcomes } => {
                self.phase = GamePhase::GameOver;
                self.winner_id = *winner_id;
                for outcome in outcomes {
                    if let Some(player) = self.players.get_mut(&outcome.player_id) {
                        player.outcome_title = Some(outcome.title.clone());
                    }
                }
            }
        }
    }
}
