//! Digit Duel Game Server
//!
//! Runs the WebSocket server, or with `--demo` plays a bot-only game locally.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use digit_duel::{
    VERSION,
    core::rng::{DeterministicRng, RandomSource},
    game::{
        code::Code,
        events::GameEventData,
        lifecycle::LocalGame,
        outcome::TitlePool,
        state::{Game, GameSettings, Player, PlayerId},
    },
    network::server::{GameServer, ServerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Digit Duel Server v{}", VERSION);

    if std::env::args().any(|arg| arg == "--demo") {
        return demo_game();
    }

    let config = ServerConfig::from_env().context("reading server configuration")?;
    let server = GameServer::new(config);

    tokio::select! {
        result = server.run() => result.context("server stopped")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received");
            server.shutdown();
        }
    }

    Ok(())
}

/// Play four bots against each other and log every event.
fn demo_game() -> anyhow::Result<()> {
    info!("=== Starting Demo Game ===");

    let game_id = [1u8; 16];
    let rng_seed = 12345u64;
    let settings = GameSettings { digit_count: 3, turn_time_limit_secs: 0, player_count: 4 };
    let mut rng = DeterministicRng::new(rng_seed);

    info!("Game ID: {}", hex::encode(game_id));
    info!("RNG Seed: {}", rng_seed);

    let roster: Vec<Player> = (1..=4u8)
        .map(|i| {
            let secret = Code::random(&mut rng, settings.digit_count);
            Player::bot(PlayerId::new([i; 16]), format!("Bot {i}")).with_secret(secret)
        })
        .collect();
    let mut order: Vec<PlayerId> = roster.iter().map(|p| p.id).collect();
    rng.shuffle(&mut order);

    for player in &roster {
        info!("{} ({}) hides {}", player.name, player.id, player.secret_code);
    }

    let game = Game::in_play(game_id, settings, roster, order, rng_seed)
        .context("demo roster is not playable")?;
    let mut local = LocalGame::new(game, TitlePool::default());

    let mut total_events = 0;
    while !local.game().is_over() {
        let events = local.play_bot_turn().context("bot turn failed")?;
        total_events += events.len();

        for event in &events {
            match &event.data {
                GameEventData::GuessScored { guesser_id, target_id, guess, exact, misplaced } => {
                    info!("{} -> {}: {} ({} exact, {} misplaced)", guesser_id, target_id, guess, exact, misplaced);
                }
                GameEventData::PlayerEliminated { player_id, found_by } => {
                    info!("{} cracked by {}", player_id, found_by);
                }
                GameEventData::GameEnded { winner_id, outcomes } => {
                    match winner_id {
                        Some(winner) => info!("Game over! Winner: {}", winner),
                        None => info!("Game over with no winner"),
                    }
                    for outcome in outcomes {
                        info!("{}: {}", outcome.player_id, outcome.title);
                    }
                }
                _ => {}
            }
        }
    }

    // Print final results
    let game = local.into_game();
    info!("=== Game Results ===");
    info!("Turns played: {}", game.turn.as_ref().map_or(0, |t| t.turn_number));
    info!("Total events: {}", total_events);
    info!("Final State Hash: {}", hex::encode(game.compute_hash()));

    Ok(())
}
