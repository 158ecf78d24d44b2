// moebot-api: Wire-level types and the transport contract for MoeBot mowers.

pub mod dps;
pub mod error;
pub mod payload;
pub mod protocol;
pub mod transport;
pub mod zone;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use dps::DpId;
pub use error::{DEVICE_UNREACHABLE, Error};
pub use payload::Payload;
pub use protocol::ProtocolVersion;
pub use transport::DeviceTransport;
pub use zone::{Zone, ZoneConfig, ZoneDecodeError};
