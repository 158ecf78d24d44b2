// moebot-core: Session engine between moebot-api and consumers.

pub mod command;
pub mod config;
pub mod error;
pub mod listeners;
pub mod model;
pub mod projector;
pub mod session;
pub mod store;
pub mod stream;
pub mod wait;

/// Version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{CommandRequest, GatedCommand, MowerCommand, Opcode};
pub use config::{DeviceIdentity, SessionConfig, Timing};
pub use error::CoreError;
pub use listeners::{Listener, ListenerHub};
pub use model::{MotionState, StateSnapshot};
pub use projector::{PayloadProjector, Projection};
pub use session::{MoeBot, RunState, SessionPhase};
pub use store::SnapshotStore;
pub use stream::SnapshotStream;
pub use wait::{WaitOutcome, wait_for_state};

// Wire types that appear in the session API.
pub use moebot_api::{DeviceTransport, DpId, Payload, ProtocolVersion, Zone, ZoneConfig};
