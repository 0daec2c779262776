//! Shared Game Store
//!
//! The single document every participant reads and commits to. A commit
//! names a [`Precondition`]; the first commit whose precondition holds wins
//! and every later one computed from the same snapshot is a conflict.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use crate::game::patch::{GamePatch, Precondition};
use crate::game::state::Game;

/// Result of a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Patch applied, producing this revision.
    Applied {
        /// Revision after the patch.
        revision: u64,
    },
    /// Precondition failed; nothing changed.
    Conflict,
}

/// A subscribable game document with guarded commits.
pub trait GameStore: Send + Sync {
    /// Current state.
    fn read(&self) -> Game;

    /// Receive every committed state. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<Arc<Game>>;

    /// Atomically check `precondition` and apply `patch`.
    fn commit(&self, precondition: &Precondition, patch: &GamePatch) -> CommitOutcome;
}

/// In-process store.
pub struct MemoryStore {
    state: Mutex<Game>,
    updates: broadcast::Sender<Arc<Game>>,
}

impl MemoryStore {
    /// Subscriber queue depth.
    pub const CHANNEL_CAPACITY: usize = 64;

    /// Store holding `game`.
    pub fn new(game: Game) -> Self {
        let (updates, _) = broadcast::channel(Self::CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(game),
            updates,
        }
    }

    /// Restore a store from [`MemoryStore::export_snapshot`] output.
    pub fn restore(snapshot: &[u8]) -> Result<Self, bincode::Error> {
        Ok(Self::new(Game::from_bytes(snapshot)?))
    }

    /// Binary snapshot of the current state.
    pub fn export_snapshot(&self) -> Result<Vec<u8>, bincode::Error> {
        self.lock().to_bytes()
    }

    fn lock(&self) -> MutexGuard<'_, Game> {
        // A panicked writer never leaves a half-applied patch behind, so the
        // state is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GameStore for MemoryStore {
    fn read(&self) -> Game {
        self.lock().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<Arc<Game>> {
        self.updates.subscribe()
    }

    fn commit(&self, precondition: &Precondition, patch: &GamePatch) -> CommitOutcome {
        let mut game = self.lock();
        if !game.satisfies(precondition) {
            debug!(?precondition, revision = game.revision, "commit conflict");
            return CommitOutcome::Conflict;
        }

        game.apply_patch(patch);
        let revision = game.revision;
        // Sent under the lock so subscribers see revisions in order.
        let _ = self.updates.send(Arc::new(game.clone()));
        CommitOutcome::Applied { revision }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::outcome::TitlePool;
    use crate::game::lifecycle::plan_guess;
    use crate::game::state::{GameSettings, Player, PlayerId};
    use crate::core::rng::DeterministicRng;

    const A: PlayerId = PlayerId::new([1; 16]);
    const B: PlayerId = PlayerId::new([2; 16]);
    const C: PlayerId = PlayerId::new([3; 16]);

    fn game() -> Game {
        let settings = GameSettings { digit_count: 3, turn_time_limit_secs: 15, player_count: 3 };
        let roster = vec![
            Player::new(A, "A").with_secret("111".parse().unwrap()),
            Player::new(B, "B").with_secret("222".parse().unwrap()),
            Player::new(C, "C").with_secret("333".parse().unwrap()),
        ];
        Game::in_play([1; 16], settings, roster, vec![A, B, C], 9).unwrap()
    }

    #[test]
    fn test_first_commit_wins() {
        let store = MemoryStore::new(game());
        let snapshot = store.read();
        let mut rng = DeterministicRng::new(1);
        let titles = TitlePool::default();

        // Two actors plan from the same snapshot for the same turn.
        let first = plan_guess(&snapshot, &"200".parse().unwrap(), A, &titles, &mut rng).unwrap();
        let second = plan_guess(&snapshot, &"020".parse().unwrap(), A, &titles, &mut rng).unwrap();

        assert_eq!(
            store.commit(&first.precondition, &first.patch),
            CommitOutcome::Applied { revision: 1 }
        );
        assert_eq!(store.commit(&second.precondition, &second.patch), CommitOutcome::Conflict);

        let game = store.read();
        assert_eq!(game.players[&B].guess_history.len(), 1);
        assert_eq!(game.players[&B].guess_history[0].raw_value.to_string(), "200");
    }

    #[test]
    fn test_revision_guard() {
        let store = MemoryStore::new(game());
        let mut edited = store.read();
        edited.settings.turn_time_limit_secs = 30;
        let patch = GamePatch::Replace(Box::new(edited));

        assert_eq!(store.commit(&Precondition::Revision(0), &patch), CommitOutcome::Applied { revision: 1 });
        assert_eq!(store.commit(&Precondition::Revision(0), &patch), CommitOutcome::Conflict);
    }

    #[tokio::test]
    async fn test_subscribers_see_commits() {
        let store = MemoryStore::new(game());
        let mut rx = store.subscribe();

        let patch = GamePatch::Replace(Box::new(store.read()));
        store.commit(&Precondition::Revision(0), &patch);

        let update = rx.recv().await.unwrap();
        assert_eq!(update.revision, 1);

        drop(rx);
        // No receivers left: commits still succeed.
        assert_eq!(store.commit(&Precondition::Revision(1), &patch), CommitOutcome::Applied { revision: 2 });
    }

    #[test]
    fn test_snapshot_restore() {
        let store = MemoryStore::new(game());
        let bytes = store.export_snapshot().unwrap();
        let restored = MemoryStore::restore(&bytes).unwrap();
        assert_eq!(restored.read(), store.read());
    }
}
