//! Round/Game Lifecycle
//!
//! Turns a guess, a timeout, or a bot's move into a [`Transition`]: the
//! patch to commit, the precondition it needs, and the events it produces.
//! Planning only reads the game, so a rejected action never mutates state.
//!
//! [`LocalGame`] applies transitions directly; the network session commits
//! them through a store.

use std::collections::BTreeSet;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::core::rng::{DeterministicRng, RandomSource};
use crate::game::code::{Code, CodeError};
use crate::game::events::GameEvent;
use crate::game::outcome::{assign_outcomes, TitlePool};
use crate::game::patch::{GamePatch, Precondition, RecordedGuess, TurnPatch, TurnResolution};
use crate::game::rotation::{next_turn, Rotation};
use crate::game::scoring::score;
use crate::game::state::{Game, GamePhase, GuessResult, PlayerId, TurnKey};

/// Shortest pause before a bot guesses.
pub const BOT_THINK_MIN: Duration = Duration::from_millis(1500);
/// Longest pause before a bot guesses.
pub const BOT_THINK_MAX: Duration = Duration::from_millis(2500);

/// Why a turn action was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    /// Nobody is guessing right now.
    #[error("game is not in progress")]
    GameNotInProgress,

    /// Somebody else holds the turn.
    #[error("it is not your turn")]
    NotYourTurn,

    /// Guess has the wrong shape.
    #[error("invalid guess: {0}")]
    InvalidGuess(#[from] CodeError),

    /// Target is already out.
    #[error("target has already been eliminated")]
    TargetEliminated,

    /// Player is not in this game.
    #[error("unknown player")]
    UnknownPlayer,

    /// Timeouts only apply to timed games.
    #[error("turns have no time limit")]
    NoTimeLimit,

    /// Timeouts only apply to human guessers.
    #[error("current guesser is a bot")]
    BotTurn,

    /// Only bots are auto-played.
    #[error("current guesser is not a bot")]
    NotBotTurn,

    /// The turn this action was planned for is over.
    #[error("turn has already moved on")]
    StaleTurn,
}

/// A planned change: commit `patch` if `precondition` still holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// Guard for the commit.
    pub precondition: Precondition,
    /// The change.
    pub patch: GamePatch,
    /// What happened, stamped with the revision the commit will produce.
    pub events: Vec<GameEvent>,
}

/// Random think time for a bot.
pub fn bot_think_delay<R: RandomSource>(rng: &mut R) -> Duration {
    rng.next_duration(BOT_THINK_MIN, BOT_THINK_MAX)
}

/// Plan `as_player` guessing `guess` against the current target.
pub fn plan_guess<R: RandomSource>(
    game: &Game,
    guess: &Code,
    as_player: PlayerId,
    titles: &TitlePool,
    rng: &mut R,
) -> Result<Transition, TurnError> {
    let key = game.turn_key().ok_or(TurnError::GameNotInProgress)?;
    if as_player != key.guesser {
        return Err(TurnError::NotYourTurn);
    }

    let guesser = game.get_player(&as_player).ok_or(TurnError::UnknownPlayer)?;
    let digit_count = game.settings.digit_count;
    guess.expect_len(digit_count)?;

    let target = game.get_player(&key.target).ok_or(TurnError::UnknownPlayer)?;
    if target.is_eliminated {
        return Err(TurnError::TargetEliminated);
    }

    let feedback = score(&target.secret_code, guess);
    let found = feedback.is_solved(digit_count);
    let revision = game.revision + 1;

    let mut events = vec![GameEvent::guess_scored(
        revision,
        as_player,
        key.target,
        guess.clone(),
        feedback.exact,
        feedback.misplaced,
    )];

    let mut eliminated = game.eliminated();
    if found {
        eliminated.insert(key.target);
        info!(guesser = %as_player, target = %key.target, "code cracked");
        events.push(GameEvent::player_eliminated(revision, key.target, as_player));
    }

    let resolution = resolve(game, &key, &eliminated, found, titles, rng, &mut events);

    Ok(Transition {
        precondition: Precondition::Turn(key),
        patch: GamePatch::Turn(TurnPatch {
            guess: Some(RecordedGuess {
                target_id: key.target,
                result: GuessResult {
                    raw_value: guess.clone(),
                    exact_matches: feedback.exact,
                    misplaced_matches: feedback.misplaced,
                    guesser_id: as_player,
                    guesser_display_name: guesser.name.clone(),
                },
                eliminates: found,
            }),
            resolution,
        }),
        events,
    })
}

/// Plan a pass for a human who ran out of time on turn `expected`.
pub fn plan_timeout<R: RandomSource>(
    game: &Game,
    expected: &TurnKey,
    titles: &TitlePool,
    rng: &mut R,
) -> Result<Transition, TurnError> {
    let key = game.turn_key().ok_or(TurnError::GameNotInProgress)?;
    if key != *expected {
        return Err(TurnError::StaleTurn);
    }
    if !game.settings.has_time_limit() {
        return Err(TurnError::NoTimeLimit);
    }
    if game.is_bot(&key.guesser) {
        return Err(TurnError::BotTurn);
    }

    let revision = game.revision + 1;
    let mut events = vec![GameEvent::turn_passed(revision, key.guesser)];
    let resolution = resolve(game, &key, &game.eliminated(), false, titles, rng, &mut events);

    Ok(Transition {
        precondition: Precondition::Turn(key),
        patch: GamePatch::Turn(TurnPatch { guess: None, resolution }),
        events,
    })
}

/// Plan the bot's random guess for turn `expected`.
pub fn plan_bot_guess<R: RandomSource>(
    game: &Game,
    expected: &TurnKey,
    titles: &TitlePool,
    rng: &mut R,
) -> Result<Transition, TurnError> {
    let key = game.turn_key().ok_or(TurnError::GameNotInProgress)?;
    if key != *expected {
        return Err(TurnError::StaleTurn);
    }
    if !game.is_bot(&key.guesser) {
        return Err(TurnError::NotBotTurn);
    }

    let guess = Code::random(rng, game.settings.digit_count);
    plan_guess(game, &guess, key.guesser, titles, rng)
}

/// Decide what follows the turn `key`, given the eliminations after it.
fn resolve<R: RandomSource>(
    game: &Game,
    key: &TurnKey,
    eliminated: &BTreeSet<PlayerId>,
    target_found: bool,
    titles: &TitlePool,
    rng: &mut R,
    events: &mut Vec<GameEvent>,
) -> TurnResolution {
    let revision = game.revision + 1;
    let seating = game.seating();
    let survivors: Vec<PlayerId> = seating.iter().copied().filter(|id| !eliminated.contains(id)).collect();

    if survivors.len() > 1 {
        match next_turn(seating, eliminated, &key.guesser, &key.target, target_found) {
            Rotation::Next(next) => {
                events.push(GameEvent::turn_started(
                    revision,
                    next.guesser,
                    next.target,
                    key.turn_number + 1,
                    next.new_round,
                ));
                return TurnResolution::Next {
                    guesser: next.guesser,
                    target: next.target,
                };
            }
            Rotation::GameOver => {
                warn!(
                    game = %hex::encode(&game.id[..4]),
                    active = survivors.len(),
                    "no valid next turn with players still active; ending game"
                );
                events.push(GameEvent::inconsistency(revision, "no valid next turn"));
                return game_over(game, None, titles, rng, events);
            }
        }
    }

    let winner = match survivors.as_slice() {
        [winner] => Some(*winner),
        _ => {
            warn!(game = %hex::encode(&game.id[..4]), "no survivor to declare winner");
            events.push(GameEvent::inconsistency(revision, "no survivor"));
            None
        }
    };
    game_over(game, winner, titles, rng, events)
}

fn game_over<R: RandomSource>(
    game: &Game,
    winner: Option<PlayerId>,
    titles: &TitlePool,
    rng: &mut R,
    events: &mut Vec<GameEvent>,
) -> TurnResolution {
    let revision = game.revision + 1;
    let outcomes = assign_outcomes(game.seating(), winner, titles, rng);

    info!(game = %hex::encode(&game.id[..4]), winner = ?winner.map(|w| w.short()), "game over");
    events.push(GameEvent::phase_changed(revision, GamePhase::Playing, GamePhase::GameOver));
    events.push(GameEvent::game_ended(revision, winner, outcomes.clone()));

    TurnResolution::GameOver { winner_id: winner, outcomes }
}

// =============================================================================
// LOCAL PLAY
// =============================================================================

/// A game owned in-process: transitions are applied directly.
#[derive(Clone, Debug)]
pub struct LocalGame {
    game: Game,
    rng: DeterministicRng,
    titles: TitlePool,
}

impl LocalGame {
    /// Take ownership of a game; randomness is seeded from `game.rng_seed`.
    pub fn new(game: Game, titles: TitlePool) -> Self {
        let rng = DeterministicRng::new(game.rng_seed);
        Self { game, rng, titles }
    }

    /// Current state.
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Hand back the game.
    pub fn into_game(self) -> Game {
        self.game
    }

    /// Submit a guess as `as_player`.
    pub fn submit_guess(&mut self, guess: &Code, as_player: PlayerId) -> Result<Vec<GameEvent>, TurnError> {
        let transition = plan_guess(&self.game, guess, as_player, &self.titles, &mut self.rng)?;
        Ok(self.apply(transition))
    }

    /// Expire the current human turn.
    pub fn handle_turn_timeout(&mut self) -> Result<Vec<GameEvent>, TurnError> {
        let key = self.game.turn_key().ok_or(TurnError::GameNotInProgress)?;
        let transition = plan_timeout(&self.game, &key, &self.titles, &mut self.rng)?;
        Ok(self.apply(transition))
    }

    /// Let the current bot guesser play.
    pub fn play_bot_turn(&mut self) -> Result<Vec<GameEvent>, TurnError> {
        let key = self.game.turn_key().ok_or(TurnError::GameNotInProgress)?;
        let transition = plan_bot_guess(&self.game, &key, &self.titles, &mut self.rng)?;
        Ok(self.apply(transition))
    }

    fn apply(&mut self, transition: Transition) -> Vec<GameEvent> {
        // Plans are computed against this very state, so the guard holds.
        debug_assert!(self.game.satisfies(&transition.precondition));
        self.game.apply_patch(&transition.patch);
        transition.events
    }
}

// =============================================================================
// TESTS
// =============================================================================
