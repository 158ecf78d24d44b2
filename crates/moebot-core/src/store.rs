// ── Snapshot store ──
//
// Holds the current `StateSnapshot` behind a `watch` channel. Writers
// publish a whole new `Arc` per change; readers never observe a partially
// applied payload.

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::StateSnapshot;
use crate::stream::SnapshotStream;

/// Single-writer reactive cell for the mower's state.
pub struct SnapshotStore {
    current: watch::Sender<Arc<StateSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (current, _) = watch::channel(Arc::new(StateSnapshot::default()));
        Self { current }
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.current.subscribe())
    }

    pub(crate) fn receiver(&self) -> watch::Receiver<Arc<StateSnapshot>> {
        self.current.subscribe()
    }

    /// Apply `edit` to a copy of the current snapshot and publish the copy.
    ///
    /// Subscribers are only woken when the edit actually changed something.
    /// Returns whether a new snapshot was published.
    pub(crate) fn update(&self, edit: impl FnOnce(&mut StateSnapshot)) -> bool {
        self.current.send_if_modified(|current| {
            let mut next = StateSnapshot::clone(current);
            edit(&mut next);
            if next == **current {
                return false;
            }
            *current = Arc::new(next);
            true
        })
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
