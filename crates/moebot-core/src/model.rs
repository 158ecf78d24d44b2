// ── Domain model ──
//
// The typed view of a mower that consumers read. `StateSnapshot` values are
// immutable once published: the projector builds a new one for every
// accepted payload.

use std::fmt;

use chrono::{DateTime, Utc};
use moebot_api::ZoneConfig;
use serde::{Deserialize, Serialize};

/// What the mower is doing, as reported on property 101.
///
/// Values outside the known set are kept verbatim in `Other` so newer
/// firmware never breaks parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MotionState {
    Standby,
    Paused,
    Charging,
    Mowing,
    FixedMowing,
    ChargingWithTaskSuspend,
    Park,
    Other(String),
}

impl MotionState {
    /// The wire spelling of this state.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Standby => "STANDBY",
            Self::Paused => "PAUSED",
            Self::Charging => "CHARGING",
            Self::Mowing => "MOWING",
            Self::FixedMowing => "FIXED_MOWING",
            Self::ChargingWithTaskSuspend => "CHARGING_WITH_TASK_SUSPEND",
            Self::Park => "PARK",
            Self::Other(raw) => raw,
        }
    }

    /// Whether the blades are running.
    pub fn is_mowing(&self) -> bool {
        matches!(self, Self::Mowing | Self::FixedMowing)
    }
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for MotionState {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "STANDBY" => Self::Standby,
            "PAUSED" => Self::Paused,
            "CHARGING" => Self::Charging,
            "MOWING" => Self::Mowing,
            "FIXED_MOWING" => Self::FixedMowing,
            "CHARGING_WITH_TASK_SUSPEND" => Self::ChargingWithTaskSuspend,
            "PARK" => Self::Park,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for MotionState {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_owned())
    }
}

impl From<MotionState> for String {
    fn from(state: MotionState) -> Self {
        match state {
            MotionState::Other(raw) => raw,
            known => known.as_str().to_owned(),
        }
    }
}

/// Point-in-time view of the mower.
///
/// Every field except `online` stays `None` until the device has reported
/// it at least once. Later payloads only overwrite the fields they carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub online: bool,
    pub motion_state: Option<MotionState>,
    pub emergency_state: Option<String>,
    pub mow_in_rain: Option<bool>,
    pub mow_time_minutes: Option<u32>,
    pub work_mode: Option<String>,
    pub battery_percent: Option<u8>,
    pub zones: Option<ZoneConfig>,
    /// Device-side unix timestamp of the last accepted report.
    pub last_update: Option<i64>,
}

impl StateSnapshot {
    /// `last_update` as a UTC datetime.
    pub fn last_update_at(&self) -> Option<DateTime<Utc>> {
        self.last_update
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    pub fn is_in(&self, state: &MotionState) -> bool {
        self.motion_state.as_ref() == Some(state)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn known_states_parse_to_variants() {
        assert_eq!(MotionState::from("STANDBY"), MotionState::Standby);
        assert_eq!(
            MotionState::from("CHARGING_WITH_TASK_SUSPEND"),
            MotionState::ChargingWithTaskSuspend
        );
        assert_eq!(MotionState::from("FIXED_MOWING").to_string(), "FIXED_MOWING");
    }

    #[test]
    fn unknown_states_pass_through_verbatim() {
        let state = MotionState::from("LOCKED_OUT");
        assert_eq!(state, MotionState::Other("LOCKED_OUT".into()));
        assert_eq!(state.as_str(), "LOCKED_OUT");
        assert_eq!(String::from(state), "LOCKED_OUT");
    }

    #[test]
    fn motion_state_serializes_as_wire_string() {
        let json = serde_json::to_value(MotionState::Park).unwrap();
        assert_eq!(json, serde_json::json!("PARK"));
        let back: MotionState = serde_json::from_value(serde_json::json!("MOWING")).unwrap();
        assert!(back.is_mowing());
    }

    #[test]
    fn default_snapshot_is_offline_and_empty() {
        let snapshot = StateSnapshot::default();
        assert!(!snapshot.online);
        assert_eq!(snapshot.motion_state, None);
        assert_eq!(snapshot.last_update_at(), None);
    }

    #[test]
    fn last_update_converts_to_utc() {
        let snapshot = StateSnapshot {
            last_update: Some(1_699_999_999),
            ..StateSnapshot::default()
        };
        assert_eq!(
            snapshot.last_update_at().unwrap().to_rfc3339(),
            "2023-11-14T22:13:19+00:00"
        );
    }
}
