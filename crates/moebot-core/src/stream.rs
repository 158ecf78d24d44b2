// ── Snapshot subscription ──
//
// Followers of the mower's state hold one of these instead of sampling
// `MoeBot::snapshot()`. Intermediate snapshots may be skipped when several
// payloads land before the follower wakes; the latest one is never lost.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::StateSnapshot;

/// Change feed of the session's state snapshot. Dropping it unsubscribes.
pub struct SnapshotStream {
    receiver: watch::Receiver<Arc<StateSnapshot>>,
}

impl SnapshotStream {
    pub(crate) fn new(mut receiver: watch::Receiver<Arc<StateSnapshot>>) -> Self {
        receiver.mark_unchanged();
        Self { receiver }
    }

    /// The latest published snapshot.
    pub fn get(&self) -> Arc<StateSnapshot> {
        self.receiver.borrow().clone()
    }

    /// Next snapshot published after the last one seen here. `None` once
    /// the session is gone.
    pub async fn changed(&mut self) -> Option<Arc<StateSnapshot>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// First snapshot, current one included, that satisfies `predicate`.
    pub async fn wait_until(
        &mut self,
        mut predicate: impl FnMut(&StateSnapshot) -> bool,
    ) -> Option<Arc<StateSnapshot>> {
        let snapshot = self.receiver.wait_for(|s| predicate(s)).await.ok()?;
        Some(Arc::clone(&snapshot))
    }

    /// Yields the current snapshot, then each later one.
    pub fn into_stream(self) -> WatchStream<Arc<StateSnapshot>> {
        WatchStream::new(self.receiver)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::model::MotionState;
    use crate::store::SnapshotStore;

    #[tokio::test]
    async fn changed_skips_to_the_latest_snapshot() {
        let store = SnapshotStore::new();
        let mut stream = store.subscribe();

        store.update(|s| s.battery_percent = Some(50));
        store.update(|s| s.battery_percent = Some(49));

        let snapshot = stream.changed().await.unwrap();
        assert_eq!(snapshot.battery_percent, Some(49));
        assert_eq!(stream.get().battery_percent, Some(49));
    }

    #[tokio::test]
    async fn wait_until_accepts_the_current_snapshot() {
        let store = SnapshotStore::new();
        store.update(|s| s.motion_state = Some(MotionState::Park));
        let mut stream = store.subscribe();

        let snapshot = stream
            .wait_until(|s| s.is_in(&MotionState::Park))
            .await
            .unwrap();
        assert_eq!(snapshot.motion_state, Some(MotionState::Park));
    }

    #[tokio::test]
    async fn changed_ends_with_the_store() {
        let store = SnapshotStore::new();
        let mut stream = store.subscribe();
        drop(store);
        assert!(stream.changed().await.is_none());
    }
}
