//! Game State Definitions
//!
//! The explicitly owned game aggregate: settings, roster, turn state, phase.
//! Uses BTreeMap for deterministic iteration order.
//!
//! Nothing outside this crate writes fields directly during play; every
//! change after the lobby goes through [`GamePatch`](crate::game::patch::GamePatch)
//! so local and shared-store games evolve identically.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::core::rng::RandomSource;
use crate::game::code::Code;

// =============================================================================
// IDS
// =============================================================================

/// Unique room identifier (UUID bytes).
pub type GameId = [u8; 16];

/// Unique player identifier (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
/// Serialized as a UUID string so it can key JSON maps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random v4 UUID (used for human players joining over the network).
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    /// Draw an id from an injected random source (used for bots so a seeded
    /// game stays reproducible).
    pub fn random<R: RandomSource>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&rng.next_u64().to_le_bytes());
        bytes[8..].copy_from_slice(&rng.next_u64().to_le_bytes());
        Self(bytes)
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// First four bytes as hex, for logs.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.to_uuid_string()
    }
}

impl TryFrom<String> for PlayerId {
    type Error = uuid::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        uuid::Uuid::parse_str(&s).map(|u| Self(u.into_bytes()))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// One scored guess, appended to the target's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessResult {
    /// The digits that were guessed.
    pub raw_value: Code,
    /// Right digit, right position.
    pub exact_matches: u32,
    /// Right digit, wrong position.
    pub misplaced_matches: u32,
    /// Who guessed.
    pub guesser_id: PlayerId,
    /// Guesser's name at the time of the guess.
    pub guesser_display_name: String,
}

/// Latest chat line shown above a player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message text.
    pub text: String,
    /// When it was posted (UTC).
    pub timestamp: DateTime<Utc>,
}

/// State of a single player in the game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Unique player ID
    pub id: PlayerId,

    /// Display name
    pub name: String,

    /// Secret code (empty until set during setup)
    pub secret_code: Code,

    /// Has someone cracked this player's code?
    pub is_eliminated: bool,

    /// Controlled by the server
    pub is_bot: bool,

    /// Guesses made against this player, oldest first
    pub guess_history: Vec<GuessResult>,

    /// Title assigned at game over
    pub outcome_title: Option<String>,

    /// Most recent chat line
    pub last_message: Option<ChatMessage>,
}

impl Player {
    /// Create a human player with no secret yet.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            secret_code: Code::default(),
            is_eliminated: false,
            is_bot: false,
            guess_history: Vec::new(),
            outcome_title: None,
            last_message: None,
        }
    }

    /// Create a bot player with no secret yet.
    pub fn bot(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            is_bot: true,
            ..Self::new(id, name)
        }
    }

    /// Builder: set the secret code.
    pub fn with_secret(mut self, code: Code) -> Self {
        self.secret_code = code;
        self
    }

    /// Still in the game?
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.is_eliminated
    }

    /// Has a secret been chosen?
    #[inline]
    pub fn has_secret(&self) -> bool {
        !self.secret_code.is_empty()
    }

    /// Hash this player's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_uuid(&self.id.0);
        hasher.update_str(&self.name);
        hasher.update_str(&self.secret_code.to_string());
        hasher.update_bool(self.is_eliminated);
        hasher.update_bool(self.is_bot);
        hasher.update_u32(self.guess_history.len() as u32);
        for guess in &self.guess_history {
            hasher.update_str(&guess.raw_value.to_string());
            hasher.update_u32(guess.exact_matches);
            hasher.update_u32(guess.misplaced_matches);
            hasher.update_uuid(&guess.guesser_id.0);
        }
        hasher.update_str(self.outcome_title.as_deref().unwrap_or(""));
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Fewest seats a game can start with.
pub const MIN_PLAYERS: usize = 2;
/// Most seats a room can have.
pub const MAX_PLAYERS: usize = 6;
/// Shortest code the lobby offers.
pub const MIN_DIGITS: usize = 3;
/// Longest code the lobby offers.
pub const MAX_DIGITS: usize = 6;
/// Turn limits the lobby offers, in seconds (0 = unlimited).
pub const TURN_TIME_OPTIONS: [u32; 5] = [0, 15, 30, 45, 60];

/// Game configuration, fixed once play starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Digits per code (at least 1).
    pub digit_count: usize,
    /// Seconds a human has per turn; 0 means unlimited.
    pub turn_time_limit_secs: u32,
    /// Seats in the room.
    pub player_count: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            digit_count: 4,
            turn_time_limit_secs: 0,
            player_count: 4,
        }
    }
}

impl GameSettings {
    /// Clamp every field to what the lobby offers.
    ///
    /// The time limit snaps to the nearest entry of [`TURN_TIME_OPTIONS`].
    pub fn clamped(self) -> Self {
        let turn_time_limit_secs = TURN_TIME_OPTIONS
            .iter()
            .copied()
            .min_by_key(|opt| opt.abs_diff(self.turn_time_limit_secs))
            .unwrap_or(0);

        Self {
            digit_count: self.digit_count.clamp(MIN_DIGITS, MAX_DIGITS),
            turn_time_limit_secs,
            player_count: self.player_count.clamp(MIN_PLAYERS, MAX_PLAYERS),
        }
    }

    /// True when turns expire.
    #[inline]
    pub fn has_time_limit(&self) -> bool {
        self.turn_time_limit_secs > 0
    }
}

// =============================================================================
// TURN STATE
// =============================================================================

/// Identity of one turn instance.
///
/// Timers and commit preconditions are keyed by this so an action computed
/// for one turn can never land on another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnKey {
    /// Player allowed to guess.
    pub guesser: PlayerId,
    /// Player being guessed against.
    pub target: PlayerId,
    /// Monotonic turn counter.
    pub turn_number: u64,
}

/// Who is guessing whom.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    /// Seating, fixed when play starts.
    pub turn_order: Vec<PlayerId>,
    /// Player allowed to guess.
    pub current_guesser: PlayerId,
    /// Player being guessed against.
    pub current_target: PlayerId,
    /// Starts at 1, +1 on every turn change.
    pub turn_number: u64,
}

impl TurnState {
    /// Key of the current turn.
    pub fn key(&self) -> TurnKey {
        TurnKey {
            guesser: self.current_guesser,
            target: self.current_target,
            turn_number: self.turn_number,
        }
    }
}

// =============================================================================
// GAME PHASE
// =============================================================================

/// Current phase of the game.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Gathering players and settings
    #[default]
    Lobby,
    /// Everyone picks a secret
    Setup,
    /// Guessing in progress
    Playing,
    /// Finished, outcomes assigned
    GameOver,
}

impl GamePhase {
    fn as_u8(self) -> u8 {
        match self {
            GamePhase::Lobby => 0,
            GamePhase::Setup => 1,
            GamePhase::Playing => 2,
            GamePhase::GameOver => 3,
        }
    }
}

// =============================================================================
// GAME
// =============================================================================

/// Complete state of a game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    /// Room identifier
    pub id: GameId,

    /// Player who controls the lobby
    pub host_id: PlayerId,

    /// Game configuration
    pub settings: GameSettings,

    /// All players (BTreeMap for deterministic iteration)
    pub players: BTreeMap<PlayerId, Player>,

    /// Join order
    pub seats: Vec<PlayerId>,

    /// Present from the moment play starts
    pub turn: Option<TurnState>,

    /// Current phase
    pub phase: GamePhase,

    /// Set at game over; `None` if no winner could be determined
    pub winner_id: Option<PlayerId>,

    /// Bumped by every committed change
    pub revision: u64,

    /// Seed of the game's random source
    pub rng_seed: u64,
}

impl Game {
    /// Create a lobby with the host in the first seat.
    pub fn new(id: GameId, host: Player, settings: GameSettings, rng_seed: u64) -> Self {
        let host_id = host.id;
        let mut players = BTreeMap::new();
        players.insert(host_id, host);

        Self {
            id,
            host_id,
            settings,
            players,
            seats: vec![host_id],
            turn: None,
            phase: GamePhase::Lobby,
            winner_id: None,
            revision: 0,
            rng_seed,
        }
    }

    /// Create a game already in play from a finished setup.
    ///
    /// `turn_order` becomes the fixed seating: seat 0 guesses first, seat 1
    /// is the first target. Players missing a secret or seated twice make
    /// this return `None`.
    pub fn in_play(
        id: GameId,
        settings: GameSettings,
        roster: Vec<Player>,
        turn_order: Vec<PlayerId>,
        rng_seed: u64,
    ) -> Option<Self> {
        let (first, second) = match turn_order.as_slice() {
            [a, b, ..] => (*a, *b),
            _ => return None,
        };

        let mut players = BTreeMap::new();
        for player in roster {
            if player.secret_code.len() != settings.digit_count {
                return None;
            }
            players.insert(player.id, player);
        }

        let seated: BTreeSet<_> = turn_order.iter().collect();
        if seated.len() != turn_order.len() || turn_order.iter().any(|id| !players.contains_key(id)) {
            return None;
        }

        Some(Self {
            id,
            host_id: first,
            settings,
            players,
            seats: turn_order.clone(),
            turn: Some(TurnState {
                turn_order,
                current_guesser: first,
                current_target: second,
                turn_number: 1,
            }),
            phase: GamePhase::Playing,
            winner_id: None,
            revision: 0,
            rng_seed,
        })
    }

    /// Get a player by ID.
    pub fn get_player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Get a player mutably by ID.
    pub fn get_player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Is the player seated and not eliminated?
    pub fn is_active(&self, id: &PlayerId) -> bool {
        self.players.get(id).is_some_and(Player::is_active)
    }

    /// Eliminated player ids.
    pub fn eliminated(&self) -> BTreeSet<PlayerId> {
        self.players
            .values()
            .filter(|p| p.is_eliminated)
            .map(|p| p.id)
            .collect()
    }

    /// Active players in seating order.
    pub fn active_players(&self) -> Vec<PlayerId> {
        self.seating()
            .iter()
            .copied()
            .filter(|id| self.is_active(id))
            .collect()
    }

    /// Count of active players.
    pub fn active_count(&self) -> usize {
        self.players.values().filter(|p| p.is_active()).count()
    }

    /// Turn order once play started, join order before.
    pub fn seating(&self) -> &[PlayerId] {
        match &self.turn {
            Some(turn) => &turn.turn_order,
            None => &self.seats,
        }
    }

    /// Key of the current turn while playing.
    pub fn turn_key(&self) -> Option<TurnKey> {
        match (self.phase, &self.turn) {
            (GamePhase::Playing, Some(turn)) => Some(turn.key()),
            _ => None,
        }
    }

    /// Check if the game has ended.
    pub fn is_over(&self) -> bool {
        matches!(self.phase, GamePhase::GameOver)
    }

    /// Is this player a bot?
    pub fn is_bot(&self, id: &PlayerId) -> bool {
        self.players.get(id).is_some_and(|p| p.is_bot)
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.revision, self.rng_seed, |hasher| {
            hasher.update_uuid(&self.id);
            hasher.update_u8(self.phase.as_u8());
            hasher.update_u32(self.settings.digit_count as u32);
            hasher.update_u32(self.settings.turn_time_limit_secs);
            hasher.update_u32(self.settings.player_count as u32);

            for id in &self.seats {
                hasher.update_uuid(&id.0);
            }

            // Hash all players in sorted order (BTreeMap guarantees this)
            for player in self.players.values() {
                player.hash_into(hasher);
            }

            if let Some(turn) = &self.turn {
                for id in &turn.turn_order {
                    hasher.update_uuid(&id.0);
                }
                hasher.update_uuid(&turn.current_guesser.0);
                hasher.update_uuid(&turn.current_target.0);
                hasher.update_u64(turn.turn_number);
            }

            hasher.update_opt_uuid(self.winner_id.as_ref().map(|id| &id.0));
        })
    }

    /// Compact binary snapshot.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Restore a binary snapshot.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

// =============================================================================
// TESTS
// =============================================================================
