// ── Waiting for a motion state ──

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::model::{MotionState, StateSnapshot};

/// How a bounded wait ended. Timing out is a normal outcome: the mower may
/// simply be slow to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Reached,
    TimedOut,
}

impl WaitOutcome {
    pub fn is_reached(self) -> bool {
        matches!(self, Self::Reached)
    }
}

/// Wait until the snapshot's motion state equals `target`, or `timeout`
/// passes.
///
/// Runs entirely on the caller's task against snapshot updates; the
/// session loop is never blocked by a waiter.
pub async fn wait_for_state(
    mut snapshots: watch::Receiver<Arc<StateSnapshot>>,
    target: &MotionState,
    timeout: Duration,
) -> WaitOutcome {
    debug!(%target, ?timeout, "waiting for motion state");

    let outcome = match tokio::time::timeout(timeout, snapshots.wait_for(|s| s.is_in(target))).await
    {
        Ok(Ok(_)) => WaitOutcome::Reached,
        // Session dropped or deadline passed.
        Ok(Err(_)) | Err(_) => WaitOutcome::TimedOut,
    };

    let state = snapshots.borrow().motion_state.clone();
    info!(
        ?outcome,
        state = state.as_ref().map_or("unknown", MotionState::as_str),
        "finished waiting for {target}"
    );
    outcome
}
