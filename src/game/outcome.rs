//! Outcome Assignment
//!
//! Hands out end-of-game titles: one random winning title for the survivor,
//! distinct losing titles for everyone else.

use serde::{Deserialize, Serialize};

use crate::core::rng::RandomSource;
use crate::game::state::PlayerId;

/// Title given to a loser once the losing pool runs dry.
pub const FALLBACK_TITLE: &str = "Fellow Traveller";

const WINNING_TITLES: &[&str] = &[
    "Master Codebreaker",
    "The Unreadable",
    "Keeper of Secrets",
    "Last Vault Standing",
    "Mind Reader",
];

const LOSING_TITLES: &[&str] = &[
    "Open Book",
    "Leaky Safe",
    "Cracked Vault",
    "Lucky Guess Victim",
    "Predictable Pete",
    "Glass Lockbox",
    "Spoiled Surprise",
];

/// Title pools used at game over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitlePool {
    /// One of these goes to the winner.
    pub winning: Vec<String>,
    /// Drawn without replacement for the losers.
    pub losing: Vec<String>,
    /// Used once `losing` is exhausted.
    pub fallback: String,
}

impl Default for TitlePool {
    fn default() -> Self {
        Self {
            winning: WINNING_TITLES.iter().map(|t| t.to_string()).collect(),
            losing: LOSING_TITLES.iter().map(|t| t.to_string()).collect(),
            fallback: FALLBACK_TITLE.to_string(),
        }
    }
}

/// Title for one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Who gets it.
    pub player_id: PlayerId,
    /// The title.
    pub title: String,
    /// True for the winner.
    pub winner: bool,
}

/// Assign titles to `players` (in the given order).
///
/// With no winner every player draws from the losing pool.
pub fn assign_outcomes<R: RandomSource>(
    players: &[PlayerId],
    winner: Option<PlayerId>,
    pool: &TitlePool,
    rng: &mut R,
) -> Vec<Outcome> {
    let winning_title = winner.map(|_| {
        rng.choose(&pool.winning)
            .cloned()
            .unwrap_or_else(|| pool.fallback.clone())
    });

    let mut losing = pool.losing.clone();
    rng.shuffle(&mut losing);

    players
        .iter()
        .map(|id| {
            if Some(*id) == winner {
                Outcome {
                    player_id: *id,
                    title: winning_title.clone().unwrap_or_else(|| pool.fallback.clone()),
                    winner: true,
                }
            } else {
                Outcome {
                    player_id: *id,
                    title: losing.pop().unwrap_or_else(|| pool.fallback.clone()),
                    winner: false,
                }
            }
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
