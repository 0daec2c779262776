//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are JSON, tagged by `type`.

use serde::{Serialize, Deserialize};

use crate::game::code::Code;
use crate::game::events::GameEvent;
use crate::game::lifecycle::TurnError;
use crate::game::lobby::{LobbyError, SettingsUpdate};
use crate::game::state::{
    ChatMessage, Game, GamePhase, GameSettings, GuessResult, PlayerId, TurnState,
};
use crate::network::session::SessionError;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Open a new room and become its host.
    CreateRoom {
        /// Display name.
        name: String,
        /// Initial settings; defaults apply to omitted fields.
        #[serde(default)]
        settings: SettingsUpdate,
    },

    /// Take a seat in an existing room.
    JoinRoom {
        /// Room id (UUID string).
        room_id: String,
        /// Display name.
        name: String,
    },

    /// Seat a bot (host).
    AddBot,

    /// Unseat a player (host).
    RemovePlayer {
        /// Who to remove.
        player_id: PlayerId,
    },

    /// Change settings (host).
    UpdateSettings {
        /// Fields to change.
        settings: SettingsUpdate,
    },

    /// Close the lobby (host).
    StartSetup,

    /// Lock in a secret during setup.
    SetSecret {
        /// Digits, e.g. `"0427"`.
        code: String,
    },

    /// Guess the current target's secret.
    SubmitGuess {
        /// Digits, e.g. `"1234"`.
        guess: String,
    },

    /// Post a chat line.
    Chat {
        /// Message text.
        text: String,
    },

    /// Ping for latency measurement.
    Ping { timestamp: u64 },

    /// Leave the room.
    Leave,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Seated in a room.
    Joined {
        /// Room id (UUID string).
        room_id: String,
        /// Your player id.
        player_id: PlayerId,
    },

    /// Full state as this client may see it.
    Snapshot(GameView),

    /// Game event notification.
    Event(GameEvent),

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// One player as seen by a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    /// Player identifier.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Server-controlled.
    pub is_bot: bool,
    /// Code cracked.
    pub is_eliminated: bool,
    /// Secret locked in.
    pub has_secret: bool,
    /// Only for the owner, or for everyone once the game is over.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_code: Option<Code>,
    /// Guesses made against this player.
    pub guess_history: Vec<GuessResult>,
    /// Title at game over.
    pub outcome_title: Option<String>,
    /// Latest chat line.
    pub last_message: Option<ChatMessage>,
}

/// Game state as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    /// Room id (UUID string).
    pub room_id: String,
    /// Who receives this view.
    pub viewer_id: Option<PlayerId>,
    /// Lobby controller.
    pub host_id: PlayerId,
    /// Current phase.
    pub phase: GamePhase,
    /// Settings.
    pub settings: GameSettings,
    /// Players in seating order.
    pub players: Vec<PlayerView>,
    /// Turn state once play started.
    pub turn: Option<TurnState>,
    /// Winner at game over.
    pub winner_id: Option<PlayerId>,
    /// Store revision.
    pub revision: u64,
    /// SHA-256 fingerprint of the full state (hex).
    pub state_hash: String,
}

impl GameView {
    /// Project `game` for `viewer`, hiding other players' secrets until
    /// the game is over.
    pub fn for_viewer(game: &Game, viewer: Option<PlayerId>) -> Self {
        let reveal_all = game.is_over();
        let players = game
            .seating()
            .iter()
            .filter_map(|id| game.get_player(id))
            .map(|p| PlayerView {
                id: p.id,
                name: p.name.clone(),
                is_bot: p.is_bot,
                is_eliminated: p.is_eliminated,
                has_secret: p.has_secret(),
                secret_code: (p.has_secret() && (reveal_all || Some(p.id) == viewer))
                    .then(|| p.secret_code.clone()),
                guess_history: p.guess_history.clone(),
                outcome_title: p.outcome_title.clone(),
                last_message: p.last_message.clone(),
            })
            .collect();

        Self {
            room_id: uuid::Uuid::from_bytes(game.id).to_string(),
            viewer_id: viewer,
            host_id: game.host_id,
            phase: game.phase,
            settings: game.settings,
            players,
            turn: game.turn.clone(),
            winner_id: game.winner_id,
            revision: game.revision,
            state_hash: hex::encode(game.compute_hash()),
        }
    }
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Build an error message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Message could not be parsed.
    InvalidMessage,
    /// Invalid input (code, name, settings).
    InvalidInput,
    /// Not the current guesser.
    NotYourTurn,
    /// Host-only action.
    NotHost,
    /// Action belongs to another phase.
    WrongPhase,
    /// Room not found.
    RoomNotFound,
    /// Room is full.
    RoomFull,
    /// Already in a room.
    AlreadyInRoom,
    /// Not in a room.
    NotInRoom,
    /// State moved on; retry.
    Conflict,
    /// Server overloaded.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

impl From<&SessionError> for ServerError {
    fn from(err: &SessionError) -> Self {
        let code = match err {
            SessionError::Turn(TurnError::NotYourTurn) => ErrorCode::NotYourTurn,
            SessionError::Turn(TurnError::GameNotInProgress) => ErrorCode::WrongPhase,
            SessionError::Turn(_) => ErrorCode::InvalidInput,
            SessionError::Lobby(LobbyError::NotHost) => ErrorCode::NotHost,
            SessionError::Lobby(LobbyError::WrongPhase(_)) => ErrorCode::WrongPhase,
            SessionError::Lobby(LobbyError::RoomFull) => ErrorCode::RoomFull,
            SessionError::Lobby(LobbyError::AlreadyJoined) => ErrorCode::AlreadyInRoom,
            SessionError::Lobby(_) => ErrorCode::InvalidInput,
            SessionError::Conflict => ErrorCode::Conflict,
            SessionError::NotFound => ErrorCode::RoomNotFound,
            SessionError::NotInSession => ErrorCode::NotInRoom,
            SessionError::AlreadyInSession => ErrorCode::AlreadyInRoom,
        };
        Self::new(code, err.to_string())
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
