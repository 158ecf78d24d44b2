// ── Data point identifiers ──
//
// The mower exposes a flat property map keyed by small integers sent as
// JSON object keys ("6", "101", ...). `DpId` is the closed set this crate
// understands; anything else in a payload is ignored by consumers.

use std::fmt;

/// A known data point on the mower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DpId {
    /// Battery charge in percent.
    Battery,
    /// Battery charge in percent, as reported by some rebadged firmwares.
    BatteryAlt,
    /// Current motion/work state (`STANDBY`, `MOWING`, ...).
    MotionState,
    /// Emergency/fault state.
    EmergencyState,
    /// Whether the mower keeps working when it rains.
    MowInRain,
    /// Scheduled mowing duration in minutes.
    MowTime,
    /// Write-only trigger asking the device to push a full report.
    RequestStatus,
    /// Base64 zone configuration block.
    Zones,
    /// Work mode (`AutoMode`, ...).
    WorkMode,
    /// Write-only command opcode (`StartMowing`, `PauseWork`, ...).
    Command,
}

impl DpId {
    /// Data points that carry state, in the order they are applied.
    ///
    /// `BatteryAlt` follows `Battery` so that a payload carrying both ends
    /// up with the alternate reading.
    pub const REPORTED: [Self; 8] = [
        Self::Battery,
        Self::BatteryAlt,
        Self::MotionState,
        Self::EmergencyState,
        Self::MowInRain,
        Self::MowTime,
        Self::Zones,
        Self::WorkMode,
    ];

    /// Numeric property code on the wire.
    pub const fn code(self) -> u32 {
        match self {
            Self::Battery => 6,
            Self::BatteryAlt => 13,
            Self::MotionState => 101,
            Self::EmergencyState => 103,
            Self::MowInRain => 104,
            Self::MowTime => 105,
            Self::RequestStatus => 109,
            Self::Zones => 113,
            Self::WorkMode => 114,
            Self::Command => 115,
        }
    }

    /// Property key as it appears in a payload's `dps` object.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Battery => "6",
            Self::BatteryAlt => "13",
            Self::MotionState => "101",
            Self::EmergencyState => "103",
            Self::MowInRain => "104",
            Self::MowTime => "105",
            Self::RequestStatus => "109",
            Self::Zones => "113",
            Self::WorkMode => "114",
            Self::Command => "115",
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            6 => Some(Self::Battery),
            13 => Some(Self::BatteryAlt),
            101 => Some(Self::MotionState),
            103 => Some(Self::EmergencyState),
            104 => Some(Self::MowInRain),
            105 => Some(Self::MowTime),
            109 => Some(Self::RequestStatus),
            113 => Some(Self::Zones),
            114 => Some(Self::WorkMode),
            115 => Some(Self::Command),
            _ => None,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        key.parse().ok().and_then(Self::from_code)
    }

    /// `true` for data points that are only ever written, never reported.
    pub const fn is_write_only(self) -> bool {
        matches!(self, Self::RequestStatus | Self::Command)
    }
}

impl fmt::Display for DpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
