use thiserror::Error;

/// Error code a device (or the local transport) reports when the mower
/// cannot be reached on the network.
pub const DEVICE_UNREACHABLE: u32 = 905;

/// Top-level error type for the `moebot-api` crate.
///
/// Covers the failure modes a [`DeviceTransport`](crate::DeviceTransport)
/// can surface. `moebot-core` maps these into session-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connectivity ────────────────────────────────────────────────
    /// The device did not answer at all.
    #[error("Device unreachable: {message}")]
    Unreachable { message: String },

    /// Socket-level failure (refused, reset, DNS).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Protocol ────────────────────────────────────────────────────
    /// The device answered with an error code.
    #[error("Device error {code}: {message}")]
    Device { code: u32, message: String },

    /// The transport was asked to speak a version it does not implement.
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the device is offline.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Unreachable { .. } => true,
            Self::Device { code, .. } => *code == DEVICE_UNREACHABLE,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Io(_) | Self::Timeout { .. }
        )
    }
}
