// ── Runtime session configuration ──
//
// These types describe *which* mower to talk to and how often. They carry
// the device credential and loop tuning, but never touch disk. The
// moebot-config crate (or the caller) builds a `SessionConfig` and hands
// it in.

use std::net::IpAddr;
use std::time::Duration;

use moebot_api::ProtocolVersion;
use secrecy::SecretString;

/// The identity of one mower on the local network.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    /// Tuya device id.
    pub device_id: String,
    /// LAN address of the mower.
    pub address: IpAddr,
    /// Local encryption key. Redacted in `Debug` output.
    pub local_key: SecretString,
}

impl DeviceIdentity {
    pub fn new(device_id: impl Into<String>, address: IpAddr, local_key: SecretString) -> Self {
        Self {
            device_id: device_id.into(),
            address,
            local_key,
        }
    }
}

/// Timers that drive the session loop and command waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Full status poll cadence while listening.
    pub status_interval: Duration,
    /// Keepalive cadence while listening.
    pub heartbeat_interval: Duration,
    /// Upper bound on a single wait for an unsolicited push.
    pub receive_window: Duration,
    /// Pause after a failed or unparseable exchange.
    pub retry_backoff: Duration,
    /// How long a command waits for its expected motion state.
    pub wait_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(12),
            receive_window: Duration::from_secs(5),
            retry_backoff: Duration::from_secs(2),
            wait_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything a [`MoeBot`](crate::MoeBot) session needs.
///
/// Built by the caller, passed to `MoeBot::new` -- core never reads config
/// files.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub identity: DeviceIdentity,
    /// Protocol versions to probe, most preferred first.
    pub protocol_versions: Vec<ProtocolVersion>,
    pub timing: Timing,
    /// Maximum number of commands queued while listening.
    pub command_queue_capacity: usize,
}

impl SessionConfig {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            protocol_versions: ProtocolVersion::NEGOTIATION_ORDER.to_vec(),
            timing: Timing::default(),
            command_queue_capacity: 20,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn defaults_match_device_cadence() {
        let config = SessionConfig::new(DeviceIdentity::new(
            "bf1234",
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50)),
            SecretString::from("0123456789abcdef"),
        ));
        assert_eq!(config.timing.status_interval, Duration::from_secs(30));
        assert_eq!(config.timing.heartbeat_interval, Duration::from_secs(12));
        assert_eq!(config.timing.retry_backoff, Duration::from_secs(2));
        assert_eq!(config.timing.wait_timeout, Duration::from_secs(10));
        assert_eq!(config.command_queue_capacity, 20);
        assert_eq!(
            config.protocol_versions,
            vec![ProtocolVersion::V3_4, ProtocolVersion::V3_3]
        );
    }

    #[test]
    fn local_key_is_redacted_in_debug() {
        let identity = DeviceIdentity::new(
            "bf1234",
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            SecretString::from("super-secret-key"),
        );
        let debug = format!("{identity:?}");
        assert!(!debug.contains("super-secret-key"));
    }
}
