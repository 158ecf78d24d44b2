// ── MoeBot session ──
//
// Full lifecycle management for one mower: protocol negotiation, the
// background listen loop, gated commands, and reactive access to the
// state snapshot.

mod link;
mod worker;

use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use moebot_api::{DeviceTransport, DpId, Payload, ProtocolVersion, ZoneConfig};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::{CommandEnvelope, CommandRequest, MowerCommand, Request};
use crate::config::{DeviceIdentity, SessionConfig};
use crate::error::CoreError;
use crate::listeners::ListenerHub;
use crate::model::{MotionState, StateSnapshot};
use crate::projector::{PayloadProjector, Projection};
use crate::store::SnapshotStore;
use crate::stream::SnapshotStream;
use crate::wait::{WaitOutcome, wait_for_state};

use self::link::Link;
use self::worker::{Worker, session_loop};

// ── Session phases ──────────────────────────────────────────────────

/// Lifecycle phase observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotNegotiated,
    Negotiating,
    /// Negotiated, loop stopped. Commands are sent inline.
    Idle,
    /// Loop running. Commands are queued.
    Running,
    ShuttingDown,
}

/// Whether the background loop owns the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

// ── MoeBot ──────────────────────────────────────────────────────────

/// A session with one mower.
///
/// Cheaply cloneable via `Arc`. Create it with [`new`](Self::new) and
/// negotiate with [`connect`](Self::connect), or do both with
/// [`open`](Self::open). Dropping the last handle stops the loop.
#[derive(Clone)]
pub struct MoeBot {
    inner: Arc<MoeBotInner>,
}

struct MoeBotInner {
    config: SessionConfig,
    link: Link,
    store: Arc<SnapshotStore>,
    listeners: Arc<ListenerHub>,
    version: OnceLock<ProtocolVersion>,
    phase: watch::Sender<SessionPhase>,
    command_tx: Mutex<mpsc::Sender<CommandEnvelope>>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    /// Also serialises `connect`, `listen` and `unlisten`.
    worker: Mutex<Option<Worker>>,
}

impl Drop for MoeBotInner {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut() {
            worker.cancel.cancel();
        }
    }
}

impl MoeBot {
    /// Create a session. Does NOT talk to the mower -- call
    /// [`connect()`](Self::connect) to negotiate a protocol version.
    pub fn new(config: SessionConfig, transport: impl DeviceTransport + 'static) -> Self {
        let store = Arc::new(SnapshotStore::new());
        let listeners = Arc::new(ListenerHub::new());
        let projector = PayloadProjector::new(Arc::clone(&store), Arc::clone(&listeners));
        let (phase, _) = watch::channel(SessionPhase::NotNegotiated);
        let (command_tx, command_rx) = mpsc::channel(config.command_queue_capacity.max(1));

        Self {
            inner: Arc::new(MoeBotInner {
                config,
                link: Link::new(Box::new(transport), projector),
                store,
                listeners,
                version: OnceLock::new(),
                phase,
                command_tx: Mutex::new(command_tx),
                command_rx: Mutex::new(Some(command_rx)),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Create a session and negotiate in one step.
    pub async fn open(
        config: SessionConfig,
        transport: impl DeviceTransport + 'static,
    ) -> Result<Self, CoreError> {
        let bot = Self::new(config, transport);
        bot.connect().await?;
        Ok(bot)
    }

    // ── Negotiation ─────────────────────────────────────────────────

    /// Find a protocol version the mower answers to.
    ///
    /// Probes each configured version in order with a status request and
    /// keeps the first one whose reply projects cleanly. Once a version is
    /// adopted it is kept for the life of the session and later calls
    /// return it without probing.
    pub async fn connect(&self) -> Result<ProtocolVersion, CoreError> {
        let _lifecycle = self.inner.worker.lock().await;
        if let Some(version) = self.protocol_version() {
            return Ok(version);
        }

        let identity = &self.inner.config.identity;
        self.set_phase(SessionPhase::Negotiating);
        info!(
            device_id = %identity.device_id,
            address = %identity.address,
            "negotiating protocol version"
        );

        for &version in &self.inner.config.protocol_versions {
            self.inner.link.set_version(version).await;
            let projection = match self.inner.link.status().await {
                Ok(projection) => projection,
                Err(e) => Projection::from_error(&e),
            };
            debug!(%version, ?projection, "probed protocol version");

            if projection.is_applied() {
                let _ = self.inner.version.set(version);
                self.set_phase(SessionPhase::Idle);
                info!(%version, "negotiated protocol version");
                return Ok(version);
            }
        }

        self.set_phase(SessionPhase::NotNegotiated);
        let tried = self
            .inner
            .config
            .protocol_versions
            .iter()
            .copied()
            .map(ProtocolVersion::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        error!(address = %identity.address, %tried, "no protocol version seems to be valid");
        Err(CoreError::NoValidVersion {
            address: identity.address.to_string(),
            tried,
        })
    }

    // ── Listen lifecycle ────────────────────────────────────────────

    /// Start the background loop: keep the connection open, poll on a
    /// timer, send heartbeats, and project pushes as they arrive.
    pub async fn listen(&self) -> Result<(), CoreError> {
        self.ensure_connected()?;
        let mut worker = self.inner.worker.lock().await;
        if worker.is_some() {
            return Err(CoreError::AlreadyRunning);
        }

        let rx = self
            .inner
            .command_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| CoreError::Internal("command queue receiver missing".into()))?;

        self.inner.link.set_persistent(true).await;
        self.set_phase(SessionPhase::Running);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(session_loop(
            self.inner.link.clone(),
            self.inner.config.timing,
            rx,
            cancel.clone(),
        ));
        *worker = Some(Worker { cancel, handle });

        info!(device_id = %self.id(), "listening to mower");
        Ok(())
    }

    /// Stop the background loop and wait for it to exit.
    ///
    /// Entries still queued are dropped; callers awaiting them (see
    /// [`poll`](Self::poll)) get [`CoreError::Cancelled`].
    pub async fn unlisten(&self) -> Result<(), CoreError> {
        let mut guard = self.inner.worker.lock().await;
        let Some(worker) = guard.take() else {
            return Err(CoreError::NotRunning);
        };

        {
            // Nothing is queued after this point.
            let _queue = self.inner.command_tx.lock().await;
            self.set_phase(SessionPhase::ShuttingDown);
        }
        worker.cancel.cancel();

        let mut rx = match worker.handle.await {
            Ok(rx) => rx,
            Err(e) => {
                // The queue went down with the task. Start a fresh one.
                warn!(error = %e, "session loop ended abnormally");
                let (tx, rx) = mpsc::channel(self.inner.config.command_queue_capacity.max(1));
                *self.inner.command_tx.lock().await = tx;
                rx
            }
        };

        let mut dropped = 0usize;
        while let Ok(envelope) = rx.try_recv() {
            dropped += 1;
            if let Some(tx) = envelope.response_tx {
                let _ = tx.send(Err(CoreError::Cancelled));
            }
        }
        if dropped > 0 {
            debug!(dropped, "cancelled queued commands");
        }
        *self.inner.command_rx.lock().await = Some(rx);

        self.inner.link.set_persistent(false).await;
        self.set_phase(SessionPhase::Idle);
        info!(device_id = %self.id(), "stopped listening to mower");
        Ok(())
    }

    // ── Mower commands ──────────────────────────────────────────────

    /// Start mowing, or resume if paused. `spiral` selects fixed-area
    /// spiral mowing. Waits for `MOWING`.
    pub async fn start(&self, spiral: bool) -> Result<WaitOutcome, CoreError> {
        self.run_command(MowerCommand::Start { spiral }).await
    }

    /// Pause mowing. Waits for `PAUSED`.
    pub async fn pause(&self) -> Result<WaitOutcome, CoreError> {
        self.run_command(MowerCommand::Pause).await
    }

    /// Abandon the paused or parked task. Waits for `STANDBY`.
    pub async fn cancel(&self) -> Result<WaitOutcome, CoreError> {
        self.run_command(MowerCommand::Cancel).await
    }

    /// Return to the charging station. Waits for `PARK`.
    pub async fn dock(&self) -> Result<WaitOutcome, CoreError> {
        self.run_command(MowerCommand::Dock).await
    }

    async fn run_command(&self, command: MowerCommand) -> Result<WaitOutcome, CoreError> {
        let state = self.inner.store.snapshot().motion_state.clone();
        debug!(%command, ?state, "attempting command");

        let gated = command
            .check(state.as_ref())
            .inspect_err(|e| warn!(error = %e, "command refused"))?;

        self.submit(gated.request).await?;
        Ok(self
            .wait_for_state(&gated.expect, self.inner.config.timing.wait_timeout)
            .await)
    }

    // ── Settings ────────────────────────────────────────────────────

    pub async fn set_mow_time(&self, minutes: u32) -> Result<(), CoreError> {
        self.submit(CommandRequest::property(DpId::MowTime, minutes))
            .await
    }

    pub async fn set_mow_in_rain(&self, enabled: bool) -> Result<(), CoreError> {
        self.submit(CommandRequest::property(DpId::MowInRain, enabled))
            .await
    }

    pub async fn set_zones(&self, zones: &ZoneConfig) -> Result<(), CoreError> {
        self.submit(CommandRequest::property(DpId::Zones, zones.encode()))
            .await
    }

    /// Write zones given in the device's base64 form. The block is decoded
    /// first so a malformed value never reaches the mower.
    pub async fn set_zones_encoded(&self, encoded: &str) -> Result<(), CoreError> {
        let zones = ZoneConfig::decode(encoded)?;
        self.set_zones(&zones).await
    }

    /// Refresh the snapshot from the mower now.
    ///
    /// While listening the request is queued and this waits for the loop
    /// to run it.
    pub async fn poll(&self) -> Result<Projection, CoreError> {
        self.ensure_connected()?;

        if self.is_listening() {
            let (tx, rx) = oneshot::channel();
            match self.enqueue(Request::Poll, Some(tx)).await {
                Ok(()) => return confirm(rx.await.map_err(|_| CoreError::Cancelled)??),
                // The loop stopped in the meantime.
                Err(CoreError::NotRunning) => {}
                Err(e) => return Err(e),
            }
        }
        confirm(self.inner.link.poll().await?)
    }

    /// Queue the write while listening, otherwise send it now and project
    /// the reply before returning.
    async fn submit(&self, request: CommandRequest) -> Result<(), CoreError> {
        self.ensure_connected()?;

        if self.is_listening() {
            match self.enqueue(Request::Write(request.clone()), None).await {
                Err(CoreError::NotRunning) => {}
                queued => return queued,
            }
        }

        debug!(property = %request.dp, value = %request.value, "sending command");
        match self.inner.link.write(request).await? {
            Some(projection) => confirm(projection).map(drop),
            None => Ok(()),
        }
    }

    async fn enqueue(
        &self,
        request: Request,
        response_tx: Option<oneshot::Sender<Result<Projection, CoreError>>>,
    ) -> Result<(), CoreError> {
        let tx = self.inner.command_tx.lock().await;
        if self.phase() != SessionPhase::Running {
            return Err(CoreError::NotRunning);
        }
        tx.try_send(CommandEnvelope {
            request,
            response_tx,
        })
        .map_err(|e| match e {
            TrySendError::Full(_) => CoreError::QueueFull {
                capacity: tx.max_capacity(),
            },
            TrySendError::Closed(_) => CoreError::NotRunning,
        })
    }

    // ── Waiting ─────────────────────────────────────────────────────

    /// Wait until the mower reports `target`, or `timeout` passes.
    pub async fn wait_for_state(&self, target: &MotionState, timeout: Duration) -> WaitOutcome {
        wait_for_state(self.inner.store.receiver(), target, timeout).await
    }

    // ── Observation ─────────────────────────────────────────────────

    /// Register a payload callback for the lifetime of the session.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.inner.listeners.add(listener);
    }

    /// Droppable subscription to every accepted payload.
    pub fn payloads(&self) -> broadcast::Receiver<Arc<Payload>> {
        self.inner.listeners.subscribe()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        self.inner.store.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        *self.inner.phase.borrow()
    }

    /// Subscribe to lifecycle phase changes.
    pub fn phase_changes(&self) -> watch::Receiver<SessionPhase> {
        self.inner.phase.subscribe()
    }

    pub fn run_state(&self) -> RunState {
        match self.phase() {
            SessionPhase::Running | SessionPhase::ShuttingDown => RunState::Running,
            _ => RunState::Stopped,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.run_state() == RunState::Running
    }

    // ── Identity ────────────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.inner.config.identity
    }

    pub fn id(&self) -> &str {
        &self.inner.config.identity.device_id
    }

    pub fn address(&self) -> IpAddr {
        self.inner.config.identity.address
    }

    /// The negotiated protocol version, `None` until `connect` succeeds.
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.inner.version.get().copied()
    }

    // ── Snapshot accessors ──────────────────────────────────────────

    pub fn snapshot(&self) -> Arc<StateSnapshot> {
        self.inner.store.snapshot()
    }

    pub fn online(&self) -> bool {
        self.snapshot().online
    }

    pub fn motion_state(&self) -> Option<MotionState> {
        self.snapshot().motion_state.clone()
    }

    pub fn emergency_state(&self) -> Option<String> {
        self.snapshot().emergency_state.clone()
    }

    pub fn mow_in_rain(&self) -> Option<bool> {
        self.snapshot().mow_in_rain
    }

    pub fn mow_time_minutes(&self) -> Option<u32> {
        self.snapshot().mow_time_minutes
    }

    pub fn work_mode(&self) -> Option<String> {
        self.snapshot().work_mode.clone()
    }

    pub fn battery_percent(&self) -> Option<u8> {
        self.snapshot().battery_percent
    }

    pub fn zones(&self) -> Option<ZoneConfig> {
        self.snapshot().zones
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.snapshot().last_update_at()
    }

    // ── Internals ───────────────────────────────────────────────────

    fn ensure_connected(&self) -> Result<ProtocolVersion, CoreError> {
        self.protocol_version().ok_or(CoreError::NotConnected)
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.inner.phase.send_replace(phase);
    }
}

/// An unreachable mower is an error for the caller; other failed
/// projections were already logged and are reported as-is.
fn confirm(projection: Projection) -> Result<Projection, CoreError> {
    match projection {
        Projection::Unreachable => Err(CoreError::ConnectionFailed {
            reason: "mower reported itself unreachable".into(),
        }),
        other => Ok(other),
    }
}

impl fmt::Display for MoeBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        let state = snapshot
            .motion_state
            .as_ref()
            .map_or("unknown", MotionState::as_str);
        write!(f, "[MoeBot - id: {}, state: {state}, battery: ", self.id())?;
        match snapshot.battery_percent {
            Some(battery) => write!(f, "{battery}%]"),
            None => f.write_str("unknown]"),
        }
    }
}

impl fmt::Debug for MoeBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoeBot")
            .field("device_id", &self.id())
            .field("address", &self.address())
            .field("protocol_version", &self.protocol_version())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use moebot_api::testing::{MockReply, MockTransport};
    use secrecy::SecretString;
    use serde_json::json;
    use std::net::Ipv4Addr;

    fn config() -> SessionConfig {
        SessionConfig::new(DeviceIdentity::new(
            "bf0123456789",
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)),
            SecretString::from("0123456789abcdef"),
        ))
    }

    #[tokio::test]
    async fn display_summarises_state() {
        let transport = MockTransport::new();
        transport.set_status(MockReply::dps(json!({ "6": 100, "101": "STANDBY" })));
        let bot = MoeBot::open(config(), transport).await.unwrap();

        assert_eq!(
            bot.to_string(),
            "[MoeBot - id: bf0123456789, state: STANDBY, battery: 100%]"
        );
    }

    #[test]
    fn display_before_any_report() {
        let bot = MoeBot::new(config(), MockTransport::new());
        assert_eq!(
            bot.to_string(),
            "[MoeBot - id: bf0123456789, state: unknown, battery: unknown]"
        );
        assert_eq!(bot.phase(), SessionPhase::NotNegotiated);
        assert_eq!(bot.run_state(), RunState::Stopped);
    }

    #[test]
    fn debug_never_prints_the_local_key() {
        let bot = MoeBot::new(config(), MockTransport::new());
        let debug = format!("{bot:?} {:?}", bot.identity());
        assert!(!debug.contains("0123456789abcdef"));
    }

    #[test]
    fn confirm_rejects_only_unreachable() {
        assert!(confirm(Projection::Applied).is_ok());
        assert!(confirm(Projection::Invalid).is_ok());
        assert!(
            confirm(Projection::Unreachable)
                .unwrap_err()
                .is_connection_error()
        );
    }
}
