// ── Listener fan-out ──
//
// Registered callbacks see every payload the projector accepts, in
// registration order, on the thread that projected it. A panicking
// callback is logged and skipped; it never reaches the session loop.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use moebot_api::Payload;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const BROADCAST_CAPACITY: usize = 64;

/// A payload observer. Callbacks run synchronously and should return
/// quickly; hand heavy work off to a task.
pub type Listener = Arc<dyn Fn(&Payload) + Send + Sync>;

pub struct ListenerHub {
    callbacks: RwLock<Vec<Listener>>,
    payload_tx: broadcast::Sender<Arc<Payload>>,
}

impl ListenerHub {
    pub fn new() -> Self {
        let (payload_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            callbacks: RwLock::new(Vec::new()),
            payload_tx,
        }
    }

    /// Register a callback for the lifetime of the session.
    pub fn add<F>(&self, listener: F)
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    pub fn len(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A droppable subscription to accepted payloads. Slow receivers lag
    /// and skip rather than block the loop.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Payload>> {
        self.payload_tx.subscribe()
    }

    pub(crate) fn notify(&self, payload: &Payload) {
        // Snapshot the list so a callback may register another listener.
        let callbacks: Vec<Listener> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (index, callback) in callbacks.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
                warn!(listener = index, "listener panicked while handling payload");
            }
        }

        if self.payload_tx.receiver_count() > 0 {
            let delivered = self
                .payload_tx
                .send(Arc::new(payload.clone()))
                .unwrap_or_default();
            debug!(receivers = delivered, "broadcast payload");
        }
    }
}

impl Default for ListenerHub {
    fn default() -> Self {
        Self::new()
    }
}
