//! WebSocket Game Server
//!
//! Async WebSocket server for multiplayer rooms.
//! Routes client messages to sessions and forwards each client its own
//! view of every committed state, plus the game events.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::game::state::PlayerId;
use crate::network::protocol::{
    ClientMessage, ServerMessage, ServerError, ErrorCode, GameView,
};
use crate::network::session::{
    GameSession, SessionConfig, SessionError, SessionId, SessionManager,
};

/// Environment variable for the bind address.
pub const ENV_BIND_ADDR: &str = "DIGIT_DUEL_BIND_ADDR";
/// Environment variable for the connection limit.
pub const ENV_MAX_CONNECTIONS: &str = "DIGIT_DUEL_MAX_CONNECTIONS";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Clients silent this long are dropped.
    pub idle_timeout: Duration,
    /// How often idle clients and finished rooms are swept.
    pub cleanup_interval: Duration,
    /// Settings for every room.
    pub session: SessionConfig,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
            session: SessionConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `DIGIT_DUEL_BIND_ADDR` and
    /// `DIGIT_DUEL_MAX_CONNECTIONS`.
    pub fn from_env() -> Result<Self, GameServerError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GameServerError> {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_BIND_ADDR) {
            config.bind_addr = addr
                .parse()
                .map_err(|_| GameServerError::InvalidConfig(format!("{ENV_BIND_ADDR}={addr}")))?;
        }
        if let Some(max) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = max
                .parse()
                .map_err(|_| GameServerError::InvalidConfig(format!("{ENV_MAX_CONNECTIONS}={max}")))?;
        }

        Ok(config)
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Bad configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Connected client state.
struct ConnectedClient {
    /// Player identity once seated.
    player_id: Option<PlayerId>,
    /// Room the player sits in.
    session_id: Option<SessionId>,
    /// Last activity.
    last_activity: Instant,
    /// Task pushing snapshots and events to this client.
    forwarder: Option<JoinHandle<()>>,
}

impl ConnectedClient {
    fn seat(&self) -> Option<(PlayerId, SessionId)> {
        Some((self.player_id?, self.session_id?))
    }

    fn detach(&mut self) -> Option<(PlayerId, SessionId)> {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        let seat = self.seat();
        self.session_id = None;
        seat
    }
}

type Clients = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Session manager.
    sessions: Arc<SessionManager>,
    /// Connected clients.
    clients: Clients,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let sessions = Arc::new(SessionManager::new(config.session.clone()));

        Self {
            config,
            sessions,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind and run the server until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the accept loop on an already bound listener.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server v{} listening on {}", self.config.version, listener.local_addr()?);

        let cleanup_clients = self.clients.clone();
        let cleanup_sessions = self.sessions.clone();
        let cleanup_config = self.config.clone();

        // Spawn cleanup task
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_clients, cleanup_sessions, cleanup_config).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let sessions = self.sessions.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            // Register client
            clients.write().await.insert(addr, ConnectedClient {
                player_id: None,
                session_id: None,
                last_activity: Instant::now(),
                forwarder: None,
            });

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                                            ErrorCode::InvalidMessage,
                                            "Invalid message format",
                                        ))).await;
                                        continue;
                                    }
                                };

                                if let Some(client) = clients.write().await.get_mut(&addr) {
                                    client.last_activity = Instant::now();
                                }

                                if let Err(e) = Self::handle_client_message(addr, client_msg, &clients, &sessions, &msg_tx).await {
                                    debug!("Rejected message from {}: {}", addr, e);
                                    let _ = msg_tx.send(ServerMessage::Error(ServerError::from(&e))).await;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup
            Self::handle_leave(addr, &clients, &sessions).await;
            clients.write().await.remove(&addr);
            sender_task.abort();

            info!("Client {} cleaned up", addr);
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        addr: SocketAddr,
        msg: ClientMessage,
        clients: &Clients,
        sessions: &Arc<SessionManager>,
        sender: &mpsc::Sender<ServerMessage>,
    ) -> Result<(), SessionError> {
        match msg {
            ClientMessage::CreateRoom { name, settings } => {
                Self::ensure_unseated(addr, clients).await?;
                let player_id = PlayerId::new_v4();
                let session = sessions.create_session(player_id, &name, settings).await?;
                Self::seat_client(addr, player_id, session, clients, sender).await;
            }
            ClientMessage::JoinRoom { room_id, name } => {
                Self::ensure_unseated(addr, clients).await?;
                let session_id = uuid::Uuid::parse_str(&room_id)
                    .map_err(|_| SessionError::NotFound)?
                    .into_bytes();
                let player_id = PlayerId::new_v4();
                let session = sessions.join_session(&session_id, player_id, &name).await?;
                Self::seat_client(addr, player_id, session, clients, sender).await;
            }
            ClientMessage::AddBot => {
                let (player_id, session) = Self::seated(addr, clients, sessions).await?;
                session.add_bot(player_id)?;
            }
            ClientMessage::RemovePlayer { player_id: target } => {
                let (player_id, session) = Self::seated(addr, clients, sessions).await?;
                session.remove_player(player_id, target)?;
                sessions.unregister_player(&target).await;
            }
            ClientMessage::UpdateSettings { settings } => {
                let (player_id, session) = Self::seated(addr, clients, sessions).await?;
                session.update_settings(player_id, settings)?;
            }
            ClientMessage::StartSetup => {
                let (player_id, session) = Self::seated(addr, clients, sessions).await?;
                session.start_setup(player_id)?;
            }
            ClientMessage::SetSecret { code } => {
                let (player_id, session) = Self::seated(addr, clients, sessions).await?;
                session.set_secret(player_id, &code)?;
            }
            ClientMessage::SubmitGuess { guess } => {
                let (player_id, session) = Self::seated(addr, clients, sessions).await?;
                session.submit_guess(player_id, &guess)?;
            }
            ClientMessage::Chat { text } => {
                let (player_id, session) = Self::seated(addr, clients, sessions).await?;
                session.post_chat(player_id, &text)?;
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
                }).await;
            }
            ClientMessage::Leave => {
                Self::handle_leave(addr, clients, sessions).await;
            }
        }
        Ok(())
    }

    async fn ensure_unseated(addr: SocketAddr, clients: &Clients) -> Result<(), SessionError> {
        match clients.read().await.get(&addr).and_then(ConnectedClient::seat) {
            Some(_) => Err(SessionError::AlreadyInSession),
            None => Ok(()),
        }
    }

    async fn seated(
        addr: SocketAddr,
        clients: &Clients,
        sessions: &SessionManager,
    ) -> Result<(PlayerId, Arc<GameSession>), SessionError> {
        let (player_id, session_id) = clients
            .read()
            .await
            .get(&addr)
            .and_then(ConnectedClient::seat)
            .ok_or(SessionError::NotInSession)?;
        let session = sessions.get_session(&session_id).await.ok_or(SessionError::NotFound)?;
        Ok((player_id, session))
    }

    /// Record the seat, confirm it, and start forwarding state.
    async fn seat_client(
        addr: SocketAddr,
        player_id: PlayerId,
        session: Arc<GameSession>,
        clients: &Clients,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        let _ = sender.send(ServerMessage::Joined {
            room_id: uuid::Uuid::from_bytes(session.id).to_string(),
            player_id,
        }).await;

        let forwarder = spawn_forwarder(&session, player_id, sender.clone());
        if let Some(client) = clients.write().await.get_mut(&addr) {
            client.player_id = Some(player_id);
            client.session_id = Some(session.id);
            client.forwarder = Some(forwarder);
        }
        debug!("Client {} seated as {} in {}", addr, player_id, hex::encode(&session.id[..4]));
    }

    /// Handle leave (explicit or disconnect).
    async fn handle_leave(addr: SocketAddr, clients: &Clients, sessions: &SessionManager) {
        let seat = clients.write().await.get_mut(&addr).and_then(ConnectedClient::detach);
        let Some((player_id, session_id)) = seat else { return };

        if let Some(session) = sessions.get_session(&session_id).await {
            if let Err(e) = session.leave(player_id) {
                debug!("Leave for {} not committed: {}", player_id, e);
            }
        }
        sessions.unregister_player(&player_id).await;
    }

    /// Run cleanup loop.
    async fn run_cleanup_loop(clients: Clients, sessions: Arc<SessionManager>, config: ServerConfig) {
        let mut interval = interval(config.cleanup_interval);

        loop {
            interval.tick().await;

            // Cleanup idle connections
            let now = Instant::now();
            let to_remove: Vec<_> = {
                let clients = clients.read().await;
                clients.iter()
                    .filter(|(_, c)| now.duration_since(c.last_activity) > config.idle_timeout)
                    .map(|(addr, _)| *addr)
                    .collect()
            };

            for addr in to_remove {
                Self::handle_leave(addr, &clients, &sessions).await;
                if clients.write().await.remove(&addr).is_some() {
                    info!("Removed idle client {}", addr);
                }
            }

            // Cleanup finished and abandoned rooms
            sessions.cleanup().await;
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.sessions.session_count().await
    }
}

/// Push `viewer`'s snapshot after every commit, and every game event.
fn spawn_forwarder(session: &Arc<GameSession>, viewer: PlayerId, sender: mpsc::Sender<ServerMessage>) -> JoinHandle<()> {
    let mut states = session.subscribe_state();
    let mut events = session.subscribe_events();
    let initial = session.snapshot();
    let weak: Weak<GameSession> = Arc::downgrade(session);

    tokio::spawn(async move {
        let view = GameView::for_viewer(&initial, Some(viewer));
        if sender.send(ServerMessage::Snapshot(view)).await.is_err() {
            return;
        }

        loop {
            let msg = tokio::select! {
                state = states.recv() => match state {
                    Ok(game) => ServerMessage::Snapshot(GameView::for_viewer(&game, Some(viewer))),
                    Err(broadcast::error::RecvError::Lagged(_)) => match weak.upgrade() {
                        Some(session) => ServerMessage::Snapshot(GameView::for_viewer(&session.snapshot(), Some(viewer))),
                        None => break,
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                event = events.recv() => match event {
                    Ok(event) => ServerMessage::Event(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Forwarder for {} skipped {} events", viewer, skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            if sender.send(msg).await.is_err() {
                break;
            }
        }
    })
}
