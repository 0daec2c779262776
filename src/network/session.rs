//! Game Session Management
//!
//! A session binds one shared [`GameStore`] to the game rules. Client
//! actions become guarded commits; a driver task watches the store and
//! keeps exactly one deferred action armed for the current turn: a bot's
//! move, or a human's turn timeout.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::core::rng::{derive_game_seed, DeterministicRng, RandomSource};
use crate::game::code::Code;
use crate::game::events::GameEvent;
use crate::game::lifecycle::{
    plan_bot_guess, plan_guess, plan_timeout, Transition, TurnError, BOT_THINK_MAX, BOT_THINK_MIN,
};
use crate::game::lobby::{self, LobbyError, SettingsUpdate};
use crate::game::outcome::TitlePool;
use crate::game::patch::{GamePatch, Precondition};
use crate::game::state::{Game, GameSettings, PlayerId, TurnKey};
use crate::network::store::{CommitOutcome, GameStore, MemoryStore};

/// Unique session identifier (same bytes as the game id).
pub type SessionId = [u8; 16];

/// Lobby edits retry this many times when another edit lands first.
const LOBBY_COMMIT_ATTEMPTS: usize = 3;

/// Configuration for a game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Shortest bot think time.
    pub bot_think_min: Duration,
    /// Longest bot think time.
    pub bot_think_max: Duration,
    /// Length of one unit of `turn_time_limit_secs`.
    pub turn_time_unit: Duration,
    /// End-of-game titles.
    pub titles: TitlePool,
    /// Event channel depth.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bot_think_min: BOT_THINK_MIN,
            bot_think_max: BOT_THINK_MAX,
            turn_time_unit: Duration::from_secs(1),
            titles: TitlePool::default(),
            event_capacity: 256,
        }
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Turn action rejected
    #[error(transparent)]
    Turn(#[from] TurnError),

    /// Lobby action rejected
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// Someone else committed first
    #[error("game state changed, try again")]
    Conflict,

    /// No such session
    #[error("session not found")]
    NotFound,

    /// Player has no session
    #[error("not in a session")]
    NotInSession,

    /// Player already has a session
    #[error("already in a session")]
    AlreadyInSession,
}

/// The deferred action armed for the current turn.
struct ArmedTimer {
    key: TurnKey,
    handle: JoinHandle<()>,
}

/// A shared game and the tasks that drive it.
pub struct GameSession {
    /// Session identifier.
    pub id: SessionId,
    store: Arc<dyn GameStore>,
    rng: Mutex<DeterministicRng>,
    config: SessionConfig,
    events: broadcast::Sender<GameEvent>,
    driver: Mutex<Option<JoinHandle<()>>>,
    timer: Mutex<Option<ArmedTimer>>,
}

impl GameSession {
    /// Session over a fresh in-memory store.
    pub fn new(game: Game, config: SessionConfig) -> Arc<Self> {
        let id = game.id;
        let seed = game.rng_seed;
        Self::with_store(id, Arc::new(MemoryStore::new(game)), seed, config)
    }

    /// Session over an existing store.
    pub fn with_store(id: SessionId, store: Arc<dyn GameStore>, rng_seed: u64, config: SessionConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Arc::new(Self {
            id,
            store,
            rng: Mutex::new(DeterministicRng::new(rng_seed)),
            config,
            events,
            driver: Mutex::new(None),
            timer: Mutex::new(None),
        })
    }

    /// Current state.
    pub fn snapshot(&self) -> Game {
        self.store.read()
    }

    /// Committed states, in order.
    pub fn subscribe_state(&self) -> broadcast::Receiver<Arc<Game>> {
        self.store.subscribe()
    }

    /// Events of committed transitions.
    pub fn subscribe_events(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Game over?
    pub fn is_finished(&self) -> bool {
        self.store.read().is_over()
    }

    // -------------------------------------------------------------------------
    // Lobby
    // -------------------------------------------------------------------------

    /// Seat a human.
    pub fn join(&self, player_id: PlayerId, name: &str) -> Result<Vec<GameEvent>, SessionError> {
        self.edit(|game, _| lobby::join(game, player_id, name))
    }

    /// Seat a bot (host).
    pub fn add_bot(&self, as_player: PlayerId) -> Result<Vec<GameEvent>, SessionError> {
        self.edit(|game, rng| lobby::add_bot(game, as_player, rng))
    }

    /// Unseat a player (host).
    pub fn remove_player(&self, as_player: PlayerId, player_id: PlayerId) -> Result<Vec<GameEvent>, SessionError> {
        self.edit(|game, _| lobby::remove_player(game, as_player, player_id))
    }

    /// Player leaves.
    pub fn leave(&self, player_id: PlayerId) -> Result<Vec<GameEvent>, SessionError> {
        self.edit(|game, _| lobby::leave(game, player_id))
    }

    /// Change settings (host).
    pub fn update_settings(&self, as_player: PlayerId, update: SettingsUpdate) -> Result<Vec<GameEvent>, SessionError> {
        self.edit(|game, _| lobby::update_settings(game, as_player, update))
    }

    /// Close the lobby (host).
    pub fn start_setup(&self, as_player: PlayerId) -> Result<Vec<GameEvent>, SessionError> {
        self.edit(|game, rng| lobby::start_setup(game, as_player, rng))
    }

    /// Lock in a secret.
    pub fn set_secret(&self, player_id: PlayerId, secret: &str) -> Result<Vec<GameEvent>, SessionError> {
        self.edit(|game, rng| lobby::set_secret(game, player_id, secret, rng))
    }

    /// Post a chat line.
    pub fn post_chat(&self, player_id: PlayerId, text: &str) -> Result<Vec<GameEvent>, SessionError> {
        self.edit(|game, _| lobby::post_chat(game, player_id, text, Utc::now()))
    }

    /// Run a lobby edit on a working copy and commit it as a replacement.
    fn edit<F>(&self, mut op: F) -> Result<Vec<GameEvent>, SessionError>
    where
        F: FnMut(&mut Game, &mut DeterministicRng) -> Result<Vec<GameEvent>, LobbyError>,
    {
        for _ in 0..LOBBY_COMMIT_ATTEMPTS {
            let snapshot = self.store.read();
            let mut working = snapshot.clone();
            let events = op(&mut working, &mut *self.rng())?;
            if events.is_empty() {
                return Ok(events);
            }

            let transition = Transition {
                precondition: Precondition::Revision(snapshot.revision),
                patch: GamePatch::Replace(Box::new(working)),
                events,
            };
            match self.commit(transition) {
                Err(SessionError::Conflict) => continue,
                result => return result,
            }
        }
        Err(SessionError::Conflict)
    }

    // -------------------------------------------------------------------------
    // Turns
    // -------------------------------------------------------------------------

    /// Submit a guess as `as_player`.
    #[instrument(skip(self), fields(session = %hex::encode(&self.id[..4])))]
    pub fn submit_guess(&self, as_player: PlayerId, guess: &str) -> Result<Vec<GameEvent>, SessionError> {
        let guess: Code = guess.parse().map_err(TurnError::from)?;
        let game = self.store.read();
        let transition = plan_guess(&game, &guess, as_player, &self.config.titles, &mut *self.rng())?;
        self.commit(transition)
    }

    /// Expire turn `key` if it is still current.
    pub fn handle_turn_timeout(&self, key: &TurnKey) -> Result<Vec<GameEvent>, SessionError> {
        let game = self.store.read();
        let transition = plan_timeout(&game, key, &self.config.titles, &mut *self.rng())?;
        self.commit(transition)
    }

    /// Let the bot play turn `key` if it is still current.
    pub fn play_bot_turn(&self, key: &TurnKey) -> Result<Vec<GameEvent>, SessionError> {
        let game = self.store.read();
        let transition = plan_bot_guess(&game, key, &self.config.titles, &mut *self.rng())?;
        self.commit(transition)
    }

    fn commit(&self, transition: Transition) -> Result<Vec<GameEvent>, SessionError> {
        match self.store.commit(&transition.precondition, &transition.patch) {
            CommitOutcome::Applied { revision } => {
                let events: Vec<GameEvent> = transition
                    .events
                    .into_iter()
                    .map(|e| e.at_revision(revision))
                    .collect();
                for event in &events {
                    // No subscribers is fine.
                    let _ = self.events.send(event.clone());
                }
                Ok(events)
            }
            CommitOutcome::Conflict => {
                debug!(session = %hex::encode(&self.id[..4]), "transition discarded, state moved on");
                Err(SessionError::Conflict)
            }
        }
    }

    fn rng(&self) -> MutexGuard<'_, DeterministicRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Driver
    // -------------------------------------------------------------------------

    /// Start the task that arms bot moves and turn timeouts.
    ///
    /// Idempotent. The task ends when the game is over or the session is
    /// dropped.
    pub fn start(self: &Arc<Self>) {
        let mut driver = self.driver.lock().unwrap_or_else(PoisonError::into_inner);
        if driver.is_some() {
            return;
        }

        let updates = self.store.subscribe();
        let initial = self.store.read();
        *driver = Some(tokio::spawn(drive(Arc::downgrade(self), updates, initial)));
    }

    /// Stop the driver and any armed timer.
    pub fn stop(&self) {
        if let Some(handle) = self.driver.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
        self.disarm();
    }

    /// Arm the deferred action for `key` unless it is already armed.
    fn arm(self: &Arc<Self>, game: &Game, key: Option<TurnKey>) {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.as_ref().map(|t| t.key) == key {
            return;
        }
        if let Some(old) = timer.take() {
            old.handle.abort();
        }

        let Some(key) = key else { return };
        let Some(delay) = self.delay_for(game, &key) else { return };
        let is_bot = game.is_bot(&key.guesser);
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(session) = weak.upgrade() {
                session.fire(is_bot, &key);
            }
        });
        *timer = Some(ArmedTimer { key, handle });
    }

    fn disarm(&self) {
        if let Some(old) = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take() {
            old.handle.abort();
        }
    }

    /// Delay before the deferred action for `key`, if one applies.
    fn delay_for(&self, game: &Game, key: &TurnKey) -> Option<Duration> {
        if game.is_bot(&key.guesser) {
            let (min, max) = (self.config.bot_think_min, self.config.bot_think_max);
            Some(self.rng().next_duration(min, max))
        } else if game.settings.has_time_limit() {
            Some(self.config.turn_time_unit * game.settings.turn_time_limit_secs)
        } else {
            None
        }
    }

    fn fire(&self, is_bot: bool, key: &TurnKey) {
        let result = if is_bot {
            self.play_bot_turn(key)
        } else {
            self.handle_turn_timeout(key)
        };

        match result {
            Ok(_) => {}
            Err(SessionError::Conflict) | Err(SessionError::Turn(TurnError::StaleTurn)) => {
                debug!(turn = key.turn_number, "deferred action was stale");
            }
            Err(e) => warn!(turn = key.turn_number, error = %e, "deferred action failed"),
        }
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Watch committed states and keep one timer armed for the current turn.
async fn drive(session: Weak<GameSession>, mut updates: broadcast::Receiver<Arc<Game>>, initial: Game) {
    let mut latest = Arc::new(initial);

    loop {
        let Some(strong) = session.upgrade() else { break };
        strong.arm(&latest, latest.turn_key());

        if latest.is_over() {
            info!(session = %hex::encode(&strong.id[..4]), "game finished, driver exiting");
            break;
        }
        drop(strong);

        latest = match updates.recv().await {
            Ok(game) => game,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "driver lagged, re-reading state");
                match session.upgrade() {
                    Some(s) => Arc::new(s.snapshot()),
                    None => break,
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
    }
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Registry of sessions and which player is in which.
pub struct SessionManager {
    sessions: RwLock<BTreeMap<SessionId, Arc<GameSession>>>,
    player_sessions: RwLock<BTreeMap<PlayerId, SessionId>>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create a new session manager.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            player_sessions: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    /// Open a room hosted by `host_id` and start its driver.
    pub async fn create_session(
        &self,
        host_id: PlayerId,
        host_name: &str,
        settings: SettingsUpdate,
    ) -> Result<Arc<GameSession>, SessionError> {
        if self.player_sessions.read().await.contains_key(&host_id) {
            return Err(SessionError::AlreadyInSession);
        }

        let id = uuid::Uuid::new_v4().into_bytes();
        let seed = derive_game_seed(&id, &[host_id.0]);
        let defaults = GameSettings::default();
        let settings = GameSettings {
            digit_count: settings.digit_count.unwrap_or(defaults.digit_count),
            turn_time_limit_secs: settings.turn_time_limit_secs.unwrap_or(defaults.turn_time_limit_secs),
            player_count: settings.player_count.unwrap_or(defaults.player_count),
        };
        let game = lobby::create_game(id, host_id, host_name, settings, seed)?;

        let session = GameSession::new(game, self.config.clone());
        session.start();

        self.sessions.write().await.insert(id, Arc::clone(&session));
        self.register_player(host_id, id).await;
        info!(session = %hex::encode(&id[..4]), host = %host_id, "room created");
        Ok(session)
    }

    /// Get session by ID.
    pub async fn get_session(&self, id: &SessionId) -> Option<Arc<GameSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Get session for a player.
    pub async fn get_player_session(&self, player_id: &PlayerId) -> Option<Arc<GameSession>> {
        let session_id = *self.player_sessions.read().await.get(player_id)?;
        self.get_session(&session_id).await
    }

    /// Seat `player_id` in room `id`.
    pub async fn join_session(&self, id: &SessionId, player_id: PlayerId, name: &str) -> Result<Arc<GameSession>, SessionError> {
        if self.player_sessions.read().await.contains_key(&player_id) {
            return Err(SessionError::AlreadyInSession);
        }
        let session = self.get_session(id).await.ok_or(SessionError::NotFound)?;
        session.join(player_id, name)?;
        self.register_player(player_id, *id).await;
        Ok(session)
    }

    /// Register player to session.
    pub async fn register_player(&self, player_id: PlayerId, session_id: SessionId) {
        self.player_sessions.write().await.insert(player_id, session_id);
    }

    /// Unregister player from session.
    pub async fn unregister_player(&self, player_id: &PlayerId) {
        self.player_sessions.write().await.remove(player_id);
    }

    /// Remove a session.
    pub async fn remove_session(&self, id: &SessionId) {
        if let Some(session) = self.sessions.write().await.remove(id) {
            session.stop();
        }
        self.player_sessions.write().await.retain(|_, s| *s != *id);
    }

    /// Get active session count.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop finished sessions and rooms nobody is registered in.
    pub async fn cleanup(&self) -> usize {
        let occupied: Vec<SessionId> = self.player_sessions.read().await.values().copied().collect();
        let to_remove: Vec<SessionId> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(id, session)| session.is_finished() || !occupied.contains(*id))
            .map(|(id, _)| *id)
            .collect();

        for id in &to_remove {
            self.remove_session(id).await;
        }
        if !to_remove.is_empty() {
            info!(removed = to_remove.len(), "cleaned up sessions");
        }
        to_remove.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::GameEventData;
    use crate::game::state::{GamePhase, Player};

    const A: PlayerId = PlayerId::new([1; 16]);
    const B: PlayerId = PlayerId::new([2; 16]);
    const C: PlayerId = PlayerId::new([3; 16]);

    fn in_play(players: Vec<Player>, digit_count: usize, time_limit: u32) -> Game {
        let settings = GameSettings {
            digit_count,
            turn_time_limit_secs: time_limit,
            player_count: players.len(),
        };
        let order = players.iter().map(|p| p.id).collect();
        Game::in_play([4; 16], settings, players, order, 11).unwrap()
    }

    fn humans(time_limit: u32) -> Game {
        in_play(
            vec![
                Player::new(A, "A").with_secret("11".parse().unwrap()),
                Player::new(B, "B").with_secret("22".parse().unwrap()),
            ],
            2,
            time_limit,
        )
    }

    fn key(session: &GameSession) -> TurnKey {
        session.snapshot().turn_key().unwrap()
    }

    #[tokio::test]
    async fn test_guess_commits_and_broadcasts() {
        let session = GameSession::new(humans(0), SessionConfig::default());
        let mut events = session.subscribe_events();

        let committed = session.submit_guess(A, "20").unwrap();
        assert!(committed.iter().all(|e| e.revision == 1));

        let first = events.recv().await.unwrap();
        assert!(matches!(first.data, GameEventData::GuessScored { exact: 1, misplaced: 0, .. }));
        assert_eq!(key(&session).guesser, B);
    }

    #[tokio::test]
    async fn test_rejected_guess_surfaces_error() {
        let session = GameSession::new(humans(0), SessionConfig::default());
        assert_eq!(session.submit_guess(B, "12"), Err(SessionError::Turn(TurnError::NotYourTurn)));
        assert!(matches!(session.submit_guess(A, "1x"), Err(SessionError::Turn(TurnError::InvalidGuess(_)))));
        assert_eq!(session.snapshot().revision, 0);
    }

    #[tokio::test]
    async fn test_stale_timeout_noops() {
        let session = GameSession::new(humans(15), SessionConfig::default());
        let stale = key(&session);
        session.submit_guess(A, "20").unwrap();

        assert_eq!(session.handle_turn_timeout(&stale), Err(SessionError::Turn(TurnError::StaleTurn)));
        assert_eq!(session.snapshot().revision, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_times_out_human_turn() {
        let session = GameSession::new(humans(15), SessionConfig::default());
        session.start();

        tokio::time::sleep(Duration::from_secs(16)).await;
        let k = key(&session);
        assert_eq!((k.guesser, k.turn_number), (B, 2));
        assert!(session.snapshot().players[&B].guess_history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guess_rearms_timer() {
        let session = GameSession::new(humans(15), SessionConfig::default());
        session.start();

        tokio::time::sleep(Duration::from_secs(10)).await;
        session.submit_guess(A, "20").unwrap();

        // The first timer would have fired at 15s; the new one fires at 25s.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(key(&session).turn_number, 2);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(key(&session).turn_number, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untimed_human_turn_waits() {
        let session = GameSession::new(humans(0), SessionConfig::default());
        session.start();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(key(&session).turn_number, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bots_play_to_the_end() {
        let game = in_play(
            vec![
                Player::bot(A, "Bot A").with_secret("1".parse().unwrap()),
                Player::bot(B, "Bot B").with_secret("2".parse().unwrap()),
                Player::bot(C, "Bot C").with_secret("3".parse().unwrap()),
            ],
            1,
            0,
        );
        let session = GameSession::new(game, SessionConfig::default());
        session.start();

        let mut waited = 0;
        while !session.is_finished() {
            tokio::time::sleep(Duration::from_secs(1)).await;
            waited += 1;
            assert!(waited < 100_000, "bot game did not finish");
        }

        let game = session.snapshot();
        assert_eq!(game.active_count(), 1);
        assert!(game.winner_id.is_some());
        assert!(game.players.values().all(|p| p.outcome_title.is_some()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_waits_think_time() {
        let game = in_play(
            vec![
                Player::bot(A, "Bot A").with_secret("12".parse().unwrap()),
                Player::new(B, "B").with_secret("34".parse().unwrap()),
            ],
            2,
            0,
        );
        let session = GameSession::new(game, SessionConfig::default());
        session.start();

        tokio::time::sleep(Duration::from_millis(1400)).await;
        assert_eq!(key(&session).turn_number, 1);

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(session.snapshot().players[&B].guess_history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_armed_bot_move() {
        let game = in_play(
            vec![
                Player::bot(A, "Bot A").with_secret("12".parse().unwrap()),
                Player::new(B, "B").with_secret("34".parse().unwrap()),
            ],
            2,
            0,
        );
        let session = GameSession::new(game, SessionConfig::default());
        session.start();

        // Let the driver arm the think timer, then stop before it fires.
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.stop();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(session.snapshot().revision, 0);
        assert!(session.snapshot().players[&B].guess_history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_session_times_out_nothing() {
        let manager = SessionManager::default();
        let session = GameSession::new(humans(15), SessionConfig::default());
        session.start();
        let id = session.id;
        manager.sessions.write().await.insert(id, Arc::clone(&session));

        tokio::time::sleep(Duration::from_millis(100)).await;
        manager.remove_session(&id).await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(session.snapshot().revision, 0);
        assert_eq!(key(&session).turn_number, 1);
    }

    #[tokio::test]
    async fn test_lobby_flow_through_session() {
        let manager = SessionManager::default();
        let session = manager.create_session(A, "Ann", SettingsUpdate::default()).await.unwrap();

        manager.join_session(&session.id, B, "Ben").await.unwrap();
        session.add_bot(A).unwrap();
        assert_eq!(session.add_bot(B), Err(SessionError::Lobby(LobbyError::NotHost)));

        session.update_settings(A, SettingsUpdate { digit_count: Some(3), ..Default::default() }).unwrap();
        session.start_setup(A).unwrap();
        session.set_secret(A, "123").unwrap();
        session.set_secret(B, "456").unwrap();

        let game = session.snapshot();
        assert_eq!(game.phase, GamePhase::Playing);
        assert_eq!(game.seats.len(), 3);
        assert!(game.revision >= 6);
    }

    #[tokio::test]
    async fn test_chat_through_session() {
        let session = GameSession::new(humans(0), SessionConfig::default());
        session.post_chat(A, " hi ").unwrap();
        let game = session.snapshot();
        assert_eq!(game.players[&A].last_message.as_ref().unwrap().text, "hi");
    }

    #[tokio::test]
    async fn test_session_manager() {
        let manager = SessionManager::default();
        let session = manager.create_session(A, "Ann", SettingsUpdate::default()).await.unwrap();
        assert_eq!(manager.session_count().await, 1);
        assert!(manager.get_player_session(&A).await.is_some());

        assert!(matches!(
            manager.create_session(A, "Ann", SettingsUpdate::default()).await,
            Err(SessionError::AlreadyInSession)
        ));
        assert!(matches!(
            manager.join_session(&[0xee; 16], B, "Ben").await,
            Err(SessionError::NotFound)
        ));

        manager.remove_session(&session.id).await;
        assert_eq!(manager.session_count().await, 0);
        assert!(manager.get_player_session(&A).await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_drops_empty_rooms() {
        let manager = SessionManager::default();
        manager.create_session(A, "Ann", SettingsUpdate::default()).await.unwrap();
        manager.create_session(B, "Ben", SettingsUpdate::default()).await.unwrap();

        manager.unregister_player(&A).await;
        assert_eq!(manager.cleanup().await, 1);
        assert_eq!(manager.session_count().await, 1);
        assert!(manager.get_player_session(&B).await.is_some());
    }
}
