//! Lobby & Setup
//!
//! Everything before the first guess: seating, settings, secrets, chat.
//! Each operation edits a working copy of the [`Game`] and returns the
//! events it produced; the caller commits the copy as one replacement.
//! Revisions are left alone here, the commit bumps them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::core::rng::RandomSource;
use crate::game::code::{Code, CodeError};
use crate::game::events::GameEvent;
use crate::game::state::{
    ChatMessage, Game, GameId, GamePhase, GameSettings, Player, PlayerId, TurnState, MIN_PLAYERS,
};

/// Longest display name, in characters.
pub const MAX_NAME_CHARS: usize = 20;
/// Longest chat line, in characters.
pub const MAX_CHAT_CHARS: usize = 120;

const BOT_NAMES: &[&str] = &["Cipher", "Tumbler", "Abacus", "Enigma", "Sprocket", "Ledger"];

/// Why a lobby action was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LobbyError {
    /// Only the host may do this.
    #[error("only the host can do that")]
    NotHost,

    /// Action belongs to another phase.
    #[error("not allowed during {0:?}")]
    WrongPhase(GamePhase),

    /// Every seat is taken.
    #[error("room is full")]
    RoomFull,

    /// Player is already seated.
    #[error("already in this room")]
    AlreadyJoined,

    /// Player is not in this game.
    #[error("unknown player")]
    UnknownPlayer,

    /// The host cannot remove itself.
    #[error("the host cannot be removed")]
    CannotRemoveHost,

    /// Blank name.
    #[error("name must not be empty")]
    EmptyName,

    /// Blank chat line.
    #[error("message must not be empty")]
    EmptyMessage,

    /// Too few or too many seated players to start.
    #[error("need between {min} and {max} players, have {seated}")]
    PlayerCount {
        /// Seated players.
        seated: usize,
        /// Fewest allowed.
        min: usize,
        /// Most allowed.
        max: usize,
    },

    /// Secret has the wrong shape.
    #[error("invalid secret: {0}")]
    InvalidSecret(#[from] CodeError),
}

/// Partial settings change; `None` keeps the current value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    /// New digit count.
    #[serde(default)]
    pub digit_count: Option<usize>,
    /// New turn time limit in seconds.
    #[serde(default)]
    pub turn_time_limit_secs: Option<u32>,
    /// New seat count.
    #[serde(default)]
    pub player_count: Option<usize>,
}

/// Trim and cap a display name.
pub fn clean_name(name: &str) -> Result<String, LobbyError> {
    let name: String = name.trim().chars().take(MAX_NAME_CHARS).collect();
    if name.is_empty() {
        Err(LobbyError::EmptyName)
    } else {
        Ok(name)
    }
}

/// Open a lobby with the host in the first seat.
pub fn create_game(
    id: GameId,
    host_id: PlayerId,
    host_name: &str,
    settings: GameSettings,
    rng_seed: u64,
) -> Result<Game, LobbyError> {
    let host = Player::new(host_id, clean_name(host_name)?);
    Ok(Game::new(id, host, settings.clamped(), rng_seed))
}

/// Seat a human player.
pub fn join(game: &mut Game, player_id: PlayerId, name: &str) -> Result<Vec<GameEvent>, LobbyError> {
    require_phase(game, GamePhase::Lobby)?;
    if game.players.contains_key(&player_id) {
        return Err(LobbyError::AlreadyJoined);
    }
    if game.seats.len() >= game.settings.player_count {
        return Err(LobbyError::RoomFull);
    }

    let name = clean_name(name)?;
    seat(game, Player::new(player_id, name));
    Ok(vec![joined_event(game, &player_id)])
}

/// Seat a bot (host only).
pub fn add_bot<R: RandomSource>(game: &mut Game, as_player: PlayerId, rng: &mut R) -> Result<Vec<GameEvent>, LobbyError> {
    require_host(game, as_player)?;
    require_phase(game, GamePhase::Lobby)?;
    if game.seats.len() >= game.settings.player_count {
        return Err(LobbyError::RoomFull);
    }

    let mut id = PlayerId::random(rng);
    while game.players.contains_key(&id) {
        id = PlayerId::random(rng);
    }

    let name = bot_name(game);
    seat(game, Player::bot(id, name));
    Ok(vec![joined_event(game, &id)])
}

/// Unseat a player (host only, not themselves).
pub fn remove_player(game: &mut Game, as_player: PlayerId, player_id: PlayerId) -> Result<Vec<GameEvent>, LobbyError> {
    require_host(game, as_player)?;
    require_phase(game, GamePhase::Lobby)?;
    if player_id == game.host_id {
        return Err(LobbyError::CannotRemoveHost);
    }
    unseat(game, player_id)?;
    Ok(vec![GameEvent::player_left(game.revision + 1, player_id)])
}

/// A player walks out of the lobby. The next seat inherits the host role.
///
/// Outside the lobby the seat is kept so the rotation stays intact.
pub fn leave(game: &mut Game, player_id: PlayerId) -> Result<Vec<GameEvent>, LobbyError> {
    if game.phase != GamePhase::Lobby {
        return Ok(Vec::new());
    }
    unseat(game, player_id)?;
    if player_id == game.host_id {
        if let Some(next_host) = game.seats.iter().find(|id| !game.is_bot(id)) {
            game.host_id = *next_host;
        }
    }
    Ok(vec![GameEvent::player_left(game.revision + 1, player_id)])
}

/// Change settings (host only). Values are clamped to what the lobby offers.
pub fn update_settings(game: &mut Game, as_player: PlayerId, update: SettingsUpdate) -> Result<Vec<GameEvent>, LobbyError> {
    require_host(game, as_player)?;
    require_phase(game, GamePhase::Lobby)?;

    let current = game.settings;
    let mut settings = GameSettings {
        digit_count: update.digit_count.unwrap_or(current.digit_count),
        turn_time_limit_secs: update.turn_time_limit_secs.unwrap_or(current.turn_time_limit_secs),
        player_count: update.player_count.unwrap_or(current.player_count),
    }
    .clamped();
    settings.player_count = settings.player_count.max(game.seats.len());

    game.settings = settings;
    Ok(vec![GameEvent::settings_changed(game.revision + 1, settings)])
}

/// Close the lobby (host only). Bots pick their secrets immediately.
pub fn start_setup<R: RandomSource>(game: &mut Game, as_player: PlayerId, rng: &mut R) -> Result<Vec<GameEvent>, LobbyError> {
    require_host(game, as_player)?;
    require_phase(game, GamePhase::Lobby)?;

    let seated = game.seats.len();
    if seated < MIN_PLAYERS || seated > game.settings.player_count {
        return Err(LobbyError::PlayerCount {
            seated,
            min: MIN_PLAYERS,
            max: game.settings.player_count,
        });
    }

    let revision = game.revision + 1;
    let digit_count = game.settings.digit_count;
    let mut events = vec![GameEvent::phase_changed(revision, GamePhase::Lobby, GamePhase::Setup)];
    game.phase = GamePhase::Setup;

    for id in game.seats.clone() {
        if let Some(player) = game.players.get_mut(&id).filter(|p| p.is_bot) {
            player.secret_code = Code::random(rng, digit_count);
            events.push(GameEvent::secret_locked(revision, id));
        }
    }

    events.extend(maybe_start_play(game, rng));
    Ok(events)
}

/// Lock in a secret. The last one in shuffles the seats and starts play.
pub fn set_secret<R: RandomSource>(
    game: &mut Game,
    player_id: PlayerId,
    secret: &str,
    rng: &mut R,
) -> Result<Vec<GameEvent>, LobbyError> {
    require_phase(game, GamePhase::Setup)?;
    let digit_count = game.settings.digit_count;
    let code = Code::parse_with_len(secret, digit_count)?;

    let player = game.players.get_mut(&player_id).ok_or(LobbyError::UnknownPlayer)?;
    player.secret_code = code;

    let mut events = vec![GameEvent::secret_locked(game.revision + 1, player_id)];
    events.extend(maybe_start_play(game, rng));
    Ok(events)
}

/// Post a chat line as `player_id`.
pub fn post_chat(
    game: &mut Game,
    player_id: PlayerId,
    text: &str,
    now: DateTime<Utc>,
) -> Result<Vec<GameEvent>, LobbyError> {
    if game.is_over() {
        return Err(LobbyError::WrongPhase(game.phase));
    }

    let text: String = text.trim().chars().take(MAX_CHAT_CHARS).collect();
    if text.is_empty() {
        return Err(LobbyError::EmptyMessage);
    }

    let player = game.players.get_mut(&player_id).ok_or(LobbyError::UnknownPlayer)?;
    player.last_message = Some(ChatMessage { text: text.clone(), timestamp: now });
    Ok(vec![GameEvent::chat_posted(game.revision + 1, player_id, text)])
}

fn maybe_start_play<R: RandomSource>(game: &mut Game, rng: &mut R) -> Vec<GameEvent> {
    if !game.players.values().all(Player::has_secret) {
        return Vec::new();
    }

    let mut turn_order = game.seats.clone();
    rng.shuffle(&mut turn_order);

    let (guesser, target) = match turn_order.as_slice() {
        [a, b, ..] => (*a, *b),
        _ => return Vec::new(),
    };

    game.turn = Some(TurnState {
        turn_order,
        current_guesser: guesser,
        current_target: target,
        turn_number: 1,
    });
    game.phase = GamePhase::Playing;
    info!(game = %hex::encode(&game.id[..4]), players = game.seats.len(), "play started");

    let revision = game.revision + 1;
    vec![
        GameEvent::phase_changed(revision, GamePhase::Setup, GamePhase::Playing),
        GameEvent::turn_started(revision, guesser, target, 1, true),
    ]
}

fn require_phase(game: &Game, phase: GamePhase) -> Result<(), LobbyError> {
    if game.phase == phase {
        Ok(())
    } else {
        Err(LobbyError::WrongPhase(game.phase))
    }
}

fn require_host(game: &Game, as_player: PlayerId) -> Result<(), LobbyError> {
    if game.host_id == as_player {
        Ok(())
    } else {
        Err(LobbyError::NotHost)
    }
}

fn seat(game: &mut Game, player: Player) {
    game.seats.push(player.id);
    game.players.insert(player.id, player);
}

fn unseat(game: &mut Game, player_id: PlayerId) -> Result<(), LobbyError> {
    game.players.remove(&player_id).ok_or(LobbyError::UnknownPlayer)?;
    game.seats.retain(|id| *id != player_id);
    Ok(())
}

fn joined_event(game: &Game, id: &PlayerId) -> GameEvent {
    let (name, is_bot) = game
        .get_player(id)
        .map(|p| (p.name.clone(), p.is_bot))
        .unwrap_or_default();
    GameEvent::player_joined(game.revision + 1, *id, name, is_bot)
}

fn bot_name(game: &Game) -> String {
    let taken = |name: &str| game.players.values().any(|p| p.name == name);
    BOT_NAMES
        .iter()
        .map(|n| format!("Bot {n}"))
        .chain((1..).map(|i| format!("Bot {i}")))
        .find(|name| !taken(name))
        .unwrap_or_else(|| "Bot".to_string())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::DeterministicRng;
    use crate::game::events::GameEventData;

    const HOST: PlayerId = PlayerId::new([1; 16]);
    const GUEST: PlayerId = PlayerId::new([2; 16]);

    fn lobby() -> Game {
        create_game([9; 16], HOST, "  Host  ", GameSettings::default(), 5).unwrap()
    }

    #[test]
    fn test_create_trims_name_and_seats_host() {
        let game = lobby();
        assert_eq!(game.players[&HOST].name, "Host");
        assert_eq!(game.seats, vec![HOST]);
        assert_eq!(game.phase, GamePhase::Lobby);
        assert_eq!(create_game([0; 16], HOST, "   ", GameSettings::default(), 0), Err(LobbyError::EmptyName));
    }

    #[test]
    fn test_join_caps_name() {
        let mut game = lobby();
        join(&mut game, GUEST, "An extremely long display name").unwrap();
        assert_eq!(game.players[&GUEST].name.chars().count(), MAX_NAME_CHARS);
        assert_eq!(join(&mut game, GUEST, "again"), Err(LobbyError::AlreadyJoined));
    }

    #[test]
    fn test_join_full_room() {
        let mut game = lobby();
        update_settings(&mut game, HOST, SettingsUpdate { player_count: Some(2), ..Default::default() }).unwrap();
        join(&mut game, GUEST, "Guest").unwrap();
        assert_eq!(join(&mut game, PlayerId::new([3; 16]), "Late"), Err(LobbyError::RoomFull));
    }

    #[test]
    fn test_host_only_actions() {
        let mut game = lobby();
        join(&mut game, GUEST, "Guest").unwrap();
        let mut rng = DeterministicRng::new(1);

        assert_eq!(add_bot(&mut game, GUEST, &mut rng), Err(LobbyError::NotHost));
        assert_eq!(start_setup(&mut game, GUEST, &mut rng), Err(LobbyError::NotHost));
        assert_eq!(remove_player(&mut game, GUEST, HOST), Err(LobbyError::NotHost));
        assert_eq!(remove_player(&mut game, HOST, HOST), Err(LobbyError::CannotRemoveHost));

        remove_player(&mut game, HOST, GUEST).unwrap();
        assert_eq!(game.seats, vec![HOST]);
    }

    #[test]
    fn test_bots_get_distinct_names() {
        let mut game = lobby();
        let mut rng = DeterministicRng::new(2);
        add_bot(&mut game, HOST, &mut rng).unwrap();
        add_bot(&mut game, HOST, &mut rng).unwrap();

        let names: Vec<_> = game.seats[1..].iter().map(|id| game.players[id].name.clone()).collect();
        assert_eq!(names, vec!["Bot Cipher", "Bot Tumbler"]);
        assert!(game.seats[1..].iter().all(|id| game.is_bot(id)));
    }

    #[test]
    fn test_settings_clamped_and_floor_at_seated() {
        let mut game = lobby();
        join(&mut game, GUEST, "Guest").unwrap();
        join(&mut game, PlayerId::new([3; 16]), "Third").unwrap();

        update_settings(
            &mut game,
            HOST,
            SettingsUpdate { digit_count: Some(12), turn_time_limit_secs: Some(20), player_count: Some(2) },
        )
        .unwrap();

        assert_eq!(game.settings.digit_count, 6);
        assert_eq!(game.settings.turn_time_limit_secs, 15);
        assert_eq!(game.settings.player_count, 3);
    }

    #[test]
    fn test_start_setup_needs_two() {
        let mut game = lobby();
        let mut rng = DeterministicRng::new(3);
        assert_eq!(
            start_setup(&mut game, HOST, &mut rng),
            Err(LobbyError::PlayerCount { seated: 1, min: 2, max: 4 })
        );
    }

    #[test]
    fn test_full_setup_starts_play() {
        let mut game = lobby();
        let mut rng = DeterministicRng::new(4);
        join(&mut game, GUEST, "Guest").unwrap();
        add_bot(&mut game, HOST, &mut rng).unwrap();

        start_setup(&mut game, HOST, &mut rng).unwrap();
        assert_eq!(game.phase, GamePhase::Setup);
        let bot = game.seats[2];
        assert_eq!(game.players[&bot].secret_code.len(), 4);

        assert!(matches!(
            set_secret(&mut game, HOST, "12a4", &mut rng),
            Err(LobbyError::InvalidSecret(CodeError::InvalidDigit('a')))
        ));
        assert!(set_secret(&mut game, HOST, "123", &mut rng).is_err());
        set_secret(&mut game, HOST, "1234", &mut rng).unwrap();
        assert_eq!(game.phase, GamePhase::Setup);

        let events = set_secret(&mut game, GUEST, "0000", &mut rng).unwrap();
        assert_eq!(game.phase, GamePhase::Playing);
        let turn = game.turn.as_ref().unwrap();
        assert_eq!(turn.turn_number, 1);
        assert_eq!(turn.current_guesser, turn.turn_order[0]);
        assert_eq!(turn.current_target, turn.turn_order[1]);
        let mut sorted = turn.turn_order.clone();
        sorted.sort();
        let mut seats = game.seats.clone();
        seats.sort();
        assert_eq!(sorted, seats);
        assert!(events.iter().any(|e| matches!(e.data, GameEventData::TurnStarted { turn_number: 1, .. })));
    }

    #[test]
    fn test_chat() {
        let mut game = lobby();
        let now = Utc::now();
        post_chat(&mut game, HOST, "  hello  ", now).unwrap();

        let msg = game.players[&HOST].last_message.as_ref().unwrap();
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.timestamp, now);
        assert_eq!(post_chat(&mut game, HOST, "   ", now), Err(LobbyError::EmptyMessage));

        let long = "x".repeat(500);
        post_chat(&mut game, HOST, &long, now).unwrap();
        assert_eq!(game.players[&HOST].last_message.as_ref().unwrap().text.len(), MAX_CHAT_CHARS);

        game.phase = GamePhase::GameOver;
        assert_eq!(post_chat(&mut game, HOST, "gg", now), Err(LobbyError::WrongPhase(GamePhase::GameOver)));
    }

    #[test]
    fn test_host_leaving_hands_over() {
        let mut game = lobby();
        join(&mut game, GUEST, "Guest").unwrap();
        leave(&mut game, HOST).unwrap();
        assert_eq!(game.host_id, GUEST);
        assert_eq!(game.seats, vec![GUEST]);
    }
}
