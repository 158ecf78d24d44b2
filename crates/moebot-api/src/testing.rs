//! Scripted in-memory transport for tests.
//!
//! [`MockTransport`] answers every [`DeviceTransport`] call from replies
//! configured up front and records the calls it received, so tests can
//! drive a session without a mower on the network.
//!
//! # Example
//!
//! ```rust,ignore
//! use moebot_api::testing::{MockCall, MockReply, MockTransport};
//! use serde_json::json;
//!
//! let transport = MockTransport::new();
//! transport.set_status(MockReply::dps(json!({ "6": 100, "101": "STANDBY" })));
//!
//! // Hand `transport.clone()` to `MoeBot::new`, then inspect:
//! assert!(transport.calls().is_empty());
//! ```
//!
//! Clones share state: keep one handle in the test and give another to the
//! code under test.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Notify;

use crate::dps::DpId;
use crate::error::{DEVICE_UNREACHABLE, Error};
use crate::payload::Payload;
use crate::protocol::ProtocolVersion;
use crate::transport::DeviceTransport;

const DEFAULT_RECEIVE_WINDOW: Duration = Duration::from_millis(50);

/// A scripted answer to one transport call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Return this payload.
    Payload(Payload),
    /// Return `Ok(None)`.
    Empty,
    /// Return the error payload the transport produces for an offline device.
    UnreachablePayload,
    /// Fail the call with [`Error::Unreachable`].
    UnreachableError,
}

impl MockReply {
    /// A report whose `dps` is the given JSON object.
    pub fn dps(dps: Value) -> Self {
        let map = match dps {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::Payload(Payload::report(map))
    }

    /// An error payload with an arbitrary code.
    pub fn device_error(code: u32, message: &str) -> Self {
        Self::Payload(Payload::error(code, message))
    }

    fn into_result(self) -> Result<Option<Payload>, Error> {
        match self {
            Self::Payload(payload) => Ok(Some(payload)),
            Self::Empty => Ok(None),
            Self::UnreachablePayload => Ok(Some(Payload::error(
                DEVICE_UNREACHABLE,
                "Network Error: Device Unreachable",
            ))),
            Self::UnreachableError => Err(Error::Unreachable {
                message: "mock device offline".into(),
            }),
        }
    }
}

/// A call recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    SetVersion(ProtocolVersion),
    SetPersistent(bool),
    Status,
    SetValue { dp: DpId, value: Value },
    Heartbeat,
    Receive,
}

type Responder = Box<dyn FnMut(DpId, &Value) -> MockReply + Send>;

struct MockState {
    version: Option<ProtocolVersion>,
    persistent: bool,
    status: MockReply,
    status_by_version: HashMap<ProtocolVersion, MockReply>,
    status_queue: VecDeque<MockReply>,
    responder: Option<Responder>,
    heartbeat: MockReply,
    pushes: VecDeque<MockReply>,
    receive_window: Duration,
    calls: Vec<MockCall>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            version: None,
            persistent: false,
            status: MockReply::UnreachablePayload,
            status_by_version: HashMap::new(),
            status_queue: VecDeque::new(),
            responder: None,
            heartbeat: MockReply::Empty,
            pushes: VecDeque::new(),
            receive_window: DEFAULT_RECEIVE_WINDOW,
            calls: Vec::new(),
        }
    }
}

/// In-memory [`DeviceTransport`] with scripted replies.
///
/// Defaults: `status()` reports the device as unreachable, `set_value()`
/// echoes the written property back as a report, `heartbeat()` returns
/// nothing, and `receive()` waits a short window for a pushed reply.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    pushed: Arc<Notify>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Scripting ────────────────────────────────────────────────────

    /// Reply used by `status()` for every version without its own reply.
    pub fn set_status(&self, reply: MockReply) {
        self.state().status = reply;
    }

    /// Reply used by `status()` while the given version is selected.
    pub fn set_status_for(&self, version: ProtocolVersion, reply: MockReply) {
        self.state().status_by_version.insert(version, reply);
    }

    /// One-shot reply consumed by the next `status()` call.
    pub fn push_status(&self, reply: MockReply) {
        self.state().status_queue.push_back(reply);
    }

    /// Compute `set_value()` replies from the written property.
    pub fn on_set_value<F>(&self, responder: F)
    where
        F: FnMut(DpId, &Value) -> MockReply + Send + 'static,
    {
        self.state().responder = Some(Box::new(responder));
    }

    /// Reply used by every `heartbeat()` call.
    pub fn set_heartbeat(&self, reply: MockReply) {
        self.state().heartbeat = reply;
    }

    /// Queue an unsolicited push for `receive()` and wake a pending call.
    pub fn push(&self, reply: MockReply) {
        self.state().pushes.push_back(reply);
        self.pushed.notify_one();
    }

    /// How long `receive()` waits for a push before returning nothing.
    pub fn set_receive_window(&self, window: Duration) {
        self.state().receive_window = window;
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Property writes in the order they were made.
    pub fn writes(&self) -> Vec<(DpId, Value)> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::SetValue { dp, value } => Some((*dp, value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls matching the predicate.
    pub fn count(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn version(&self) -> Option<ProtocolVersion> {
        self.state().version
    }

    pub fn is_persistent(&self) -> bool {
        self.state().persistent
    }

    fn record(&self, call: MockCall) {
        self.state().calls.push(call);
    }
}

fn echo(dp: DpId, value: &Value) -> MockReply {
    if dp == DpId::RequestStatus {
        return MockReply::Empty;
    }
    let mut dps = Map::new();
    dps.insert(dp.key().to_owned(), value.clone());
    MockReply::Payload(Payload::report(dps))
}

#[async_trait]
impl DeviceTransport for MockTransport {
    fn set_version(&mut self, version: ProtocolVersion) {
        let mut state = self.state();
        state.version = Some(version);
        state.calls.push(MockCall::SetVersion(version));
    }

    fn set_persistent(&mut self, persistent: bool) {
        let mut state = self.state();
        state.persistent = persistent;
        state.calls.push(MockCall::SetPersistent(persistent));
    }

    async fn status(&mut self) -> Result<Option<Payload>, Error> {
        let reply = {
            let mut state = self.state();
            state.calls.push(MockCall::Status);
            match state.status_queue.pop_front() {
                Some(reply) => reply,
                None => state
                    .version
                    .and_then(|v| state.status_by_version.get(&v).cloned())
                    .unwrap_or_else(|| state.status.clone()),
            }
        };
        reply.into_result()
    }

    async fn set_value(&mut self, dp: DpId, value: Value) -> Result<Option<Payload>, Error> {
        let reply = {
            let mut state = self.state();
            state.calls.push(MockCall::SetValue {
                dp,
                value: value.clone(),
            });
            match state.responder.as_mut() {
                Some(responder) => responder(dp, &value),
                None => echo(dp, &value),
            }
        };
        reply.into_result()
    }

    async fn heartbeat(&mut self) -> Result<Option<Payload>, Error> {
        let reply = {
            let mut state = self.state();
            state.calls.push(MockCall::Heartbeat);
            state.heartbeat.clone()
        };
        reply.into_result()
    }

    async fn receive(&mut self) -> Result<Option<Payload>, Error> {
        self.record(MockCall::Receive);

        let window = {
            let mut state = self.state();
            if let Some(reply) = state.pushes.pop_front() {
                return reply.into_result();
            }
            state.receive_window
        };

        let _ = tokio::time::timeout(window, self.pushed.notified()).await;

        match self.state().pushes.pop_front() {
            Some(reply) => reply.into_result(),
            None => Ok(None),
        }
    }
}
