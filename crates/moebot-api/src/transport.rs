// ── Transport contract ──
//
// The encrypted socket protocol lives outside this workspace. Anything
// that can turn the mower's frames into `Payload`s implements
// `DeviceTransport`; the session in `moebot-core` drives it.

use async_trait::async_trait;
use serde_json::Value;

use crate::dps::DpId;
use crate::error::Error;
use crate::payload::Payload;
use crate::protocol::ProtocolVersion;

/// A connection to one mower.
///
/// Every I/O method may legitimately return `Ok(None)` when the device sent
/// nothing back, or an error-shaped [`Payload`] when it answered with a
/// failure code. Implementations should bound each call by their own socket
/// timeout.
#[async_trait]
pub trait DeviceTransport: Send {
    /// Select the protocol revision used for subsequent frames.
    fn set_version(&mut self, version: ProtocolVersion);

    /// Keep the socket open between requests (required for pushes and
    /// heartbeats) or close it after every exchange.
    fn set_persistent(&mut self, persistent: bool);

    /// Request a full status report.
    async fn status(&mut self) -> Result<Option<Payload>, Error>;

    /// Write one property.
    async fn set_value(&mut self, dp: DpId, value: Value) -> Result<Option<Payload>, Error>;

    /// Send a keepalive frame and return whatever came back with it.
    async fn heartbeat(&mut self) -> Result<Option<Payload>, Error>;

    /// Wait for an unsolicited push from the device.
    ///
    /// Must be cancel-safe: the session drops this future when a command
    /// is queued or the loop shuts down.
    async fn receive(&mut self) -> Result<Option<Payload>, Error>;
}
