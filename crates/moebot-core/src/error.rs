// ── Core error types ──
//
// User-facing errors from moebot-core. Consumers never see raw transport
// failures; the `From<moebot_api::Error>` impl folds them into session-level
// variants.

use thiserror::Error;

use moebot_api::ZoneDecodeError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach mower: {reason}")]
    ConnectionFailed { reason: String },

    #[error("No supported protocol version answered at {address} (tried {tried})")]
    NoValidVersion { address: String, tried: String },

    #[error("Session is not connected -- protocol negotiation has not succeeded")]
    NotConnected,

    #[error("Mower request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Command errors ───────────────────────────────────────────────
    #[error("Cannot {command} while the mower is {state}")]
    IllegalState { command: String, state: String },

    #[error("Command queue is full ({capacity} pending)")]
    QueueFull { capacity: usize },

    #[error("Request cancelled: the session stopped listening")]
    Cancelled,

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Session is already listening")]
    AlreadyRunning,

    #[error("Session is not listening")]
    NotRunning,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Invalid zone configuration: {0}")]
    Decode(#[from] ZoneDecodeError),

    #[error("Mower reported error {code}: {message}")]
    Device { code: u32, message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for the connection class: the mower cannot be talked
    /// to, either right now or for this whole session.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::NoValidVersion { .. }
                | Self::NotConnected
                | Self::Timeout { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<moebot_api::Error> for CoreError {
    fn from(err: moebot_api::Error) -> Self {
        match err {
            moebot_api::Error::Unreachable { message } => {
                CoreError::ConnectionFailed { reason: message }
            }
            moebot_api::Error::Io(e) => CoreError::ConnectionFailed {
                reason: e.to_string(),
            },
            moebot_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            moebot_api::Error::Device { code, message } => {
                if code == moebot_api::DEVICE_UNREACHABLE {
                    CoreError::ConnectionFailed { reason: message }
                } else {
                    CoreError::Device { code, message }
                }
            }
            moebot_api::Error::UnsupportedVersion(version) => {
                CoreError::Internal(format!("transport cannot speak protocol {version}"))
            }
            moebot_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_device_code_maps_to_connection_failure() {
        let err = CoreError::from(moebot_api::Error::Device {
            code: 905,
            message: "Network Error: Device Unreachable".into(),
        });
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
        assert!(err.is_connection_error());
    }

    #[test]
    fn other_device_codes_are_preserved() {
        let err = CoreError::from(moebot_api::Error::Device {
            code: 914,
            message: "Check device key or version".into(),
        });
        assert!(matches!(err, CoreError::Device { code: 914, .. }));
        assert!(!err.is_connection_error());
    }

    #[test]
    fn lifecycle_errors_are_not_connection_errors() {
        assert!(!CoreError::AlreadyRunning.is_connection_error());
        assert!(!CoreError::QueueFull { capacity: 20 }.is_connection_error());
        assert!(CoreError::NotConnected.is_connection_error());
    }

    #[test]
    fn illegal_state_message_names_command_and_state() {
        let err = CoreError::IllegalState {
            command: "pause".into(),
            state: "STANDBY".into(),
        };
        assert_eq!(err.to_string(), "Cannot pause while the mower is STANDBY");
    }
}
