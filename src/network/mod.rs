//! Network Layer
//!
//! WebSocket server for real-time multiplayer rooms.
//! This layer is **non-deterministic** - all rules run through `game/`.

pub mod protocol;
pub mod store;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, ServerError, ErrorCode, GameView, PlayerView};
pub use store::{CommitOutcome, GameStore, MemoryStore};
pub use session::{GameSession, SessionConfig, SessionError, SessionId, SessionManager};
pub use server::{GameServer, ServerConfig, GameServerError};
