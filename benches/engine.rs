use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use digit_duel::core::rng::DeterministicRng;
use digit_duel::game::code::Code;
use digit_duel::game::lifecycle::LocalGame;
use digit_duel::game::outcome::TitlePool;
use digit_duel::game::rotation::next_turn;
use digit_duel::game::scoring::score;
use digit_duel::game::state::{Game, GameSettings, Player, PlayerId};

fn bench_score(c: &mut Criterion) {
    let mut g = c.benchmark_group("scoring");
    for &len in &[3usize, 6usize] {
        let mut rng = DeterministicRng::new(0xD161_7D0E);
        let pairs: Vec<(Code, Code)> = (0..1024)
            .map(|_| (Code::random(&mut rng, len), Code::random(&mut rng, len)))
            .collect();
        g.bench_with_input(BenchmarkId::new("score_batch", len), &pairs, |b, pairs| {
            b.iter(|| {
                for (secret, guess) in pairs {
                    black_box(score(black_box(secret), black_box(guess)));
                }
            })
        });
    }
    g.finish();
}

fn bench_next_turn(c: &mut Criterion) {
    let order: Vec<PlayerId> = (1..=6u8).map(|i| PlayerId::new([i; 16])).collect();
    let eliminated: BTreeSet<PlayerId> = [order[2]].into_iter().collect();

    c.bench_function("next_turn_six_seats", |b| {
        b.iter(|| {
            for guesser in &order {
                for target in &order {
                    if guesser != target {
                        black_box(next_turn(&order, &eliminated, guesser, target, false));
                    }
                }
            }
        })
    });
}

fn bot_game(seed: u64) -> Game {
    let settings = GameSettings { digit_count: 3, turn_time_limit_secs: 0, player_count: 4 };
    let mut rng = DeterministicRng::new(seed);
    let roster: Vec<Player> = (1..=4u8)
        .map(|i| Player::bot(PlayerId::new([i; 16]), format!("Bot {i}")).with_secret(Code::random(&mut rng, 3)))
        .collect();
    let order = roster.iter().map(|p| p.id).collect();
    Game::in_play([7; 16], settings, roster, order, seed).expect("valid roster")
}

fn bench_bot_game(c: &mut Criterion) {
    c.bench_function("bot_game_to_completion", |b| {
        b.iter(|| {
            let mut local = LocalGame::new(bot_game(42), TitlePool::default());
            while !local.game().is_over() {
                local.play_bot_turn().expect("bot turn");
            }
            black_box(local.game().compute_hash())
        })
    });
}

criterion_group!(benches, bench_score, bench_next_turn, bench_bot_game);
criterion_main!(benches);
