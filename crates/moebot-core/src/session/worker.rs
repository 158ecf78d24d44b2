// ── Session loop ──
//
// One task per listening session. Each iteration performs exactly one
// exchange, picked by priority: shutdown, queued command, status poll,
// heartbeat, and otherwise a bounded wait for a push from the mower. The
// wait also wakes for a newly queued command or shutdown.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::link::{Link, settle};
use crate::command::{CommandEnvelope, Request};
use crate::config::Timing;
use crate::projector::Projection;

/// Handle to a running loop. The task hands its receiver back on exit so
/// the queue survives a stop/start cycle.
pub(crate) struct Worker {
    pub cancel: CancellationToken,
    pub handle: JoinHandle<mpsc::Receiver<CommandEnvelope>>,
}

pub(crate) async fn session_loop(
    link: Link,
    timing: Timing,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) -> mpsc::Receiver<CommandEnvelope> {
    debug!("session loop started, requesting initial status");
    if let Err(e) = link.poll().await {
        debug!(error = %e, "initial status request failed");
    }

    let mut status_due = Instant::now() + timing.status_interval;
    let mut heartbeat_due = Instant::now() + timing.heartbeat_interval;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let now = Instant::now();
        let outcome = if let Ok(envelope) = rx.try_recv() {
            dispatch(&link, envelope).await
        } else if now >= status_due {
            debug!("status interval elapsed");
            let outcome = settle(&link.poll().await.map(Some));
            status_due = Instant::now() + timing.status_interval;
            heartbeat_due = Instant::now() + timing.heartbeat_interval;
            outcome
        } else if now >= heartbeat_due {
            debug!("sending heartbeat");
            let outcome = settle(&link.heartbeat().await);
            heartbeat_due = Instant::now() + timing.heartbeat_interval;
            outcome
        } else {
            let deadline = now
                + timing
                    .receive_window
                    .min(status_due - now)
                    .min(heartbeat_due - now);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                envelope = rx.recv() => match envelope {
                    Some(envelope) => dispatch(&link, envelope).await,
                    None => break,
                },
                received = receive_until(&link, deadline) => settle(&received),
            }
        };

        if outcome.is_some_and(|p| !p.is_applied()) {
            debug!(backoff = ?timing.retry_backoff, "exchange failed, backing off");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                () = tokio::time::sleep(timing.retry_backoff) => {}
            }
        }
    }

    info!("session loop stopped");
    rx
}

/// Wait for a push until `deadline`. A transport that returns empty-handed
/// early is held until the deadline.
async fn receive_until(
    link: &Link,
    deadline: Instant,
) -> Result<Option<Projection>, moebot_api::Error> {
    let received = link
        .receive(deadline.saturating_duration_since(Instant::now()))
        .await;
    if matches!(received, Ok(None)) {
        tokio::time::sleep_until(deadline).await;
    }
    received
}

/// Run one queued entry and answer its waiter, if any.
async fn dispatch(link: &Link, envelope: CommandEnvelope) -> Option<Projection> {
    let CommandEnvelope {
        request,
        response_tx,
    } = envelope;

    let result = match request {
        Request::Write(command) => {
            debug!(property = %command.dp, value = %command.value, "sending queued command");
            link.write(command).await
        }
        Request::Poll => link.poll().await.map(Some),
    };

    let outcome = settle(&result);
    if let Some(tx) = response_tx {
        let reply = result
            .map(|p| p.unwrap_or(Projection::Invalid))
            .map_err(Into::into);
        let _ = tx.send(reply);
    }
    outcome
}
