// ── Protocol versions ──
//
// Mowers ship with different firmware generations that each speak one
// revision of the local protocol. The session probes them in preference
// order until one answers with a usable status payload.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// A local protocol revision the transport can speak.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ProtocolVersion {
    #[strum(serialize = "3.3")]
    V3_3,
    #[strum(serialize = "3.4")]
    V3_4,
}

impl ProtocolVersion {
    /// Probe order used when no explicit preference is configured.
    pub const NEGOTIATION_ORDER: [Self; 2] = [Self::V3_4, Self::V3_3];

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.trim().parse()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn newest_version_is_probed_first() {
        assert_eq!(
            ProtocolVersion::NEGOTIATION_ORDER,
            [ProtocolVersion::V3_4, ProtocolVersion::V3_3]
        );
        assert!(ProtocolVersion::V3_4 > ProtocolVersion::V3_3);
    }

    #[test]
    fn parses_dotted_form() {
        assert_eq!("3.4".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V3_4);
        assert_eq!(ProtocolVersion::V3_3.to_string(), "3.3");
        assert!("3.1".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn serde_uses_dotted_strings() {
        let json = serde_json::to_string(&ProtocolVersion::V3_4).unwrap();
        assert_eq!(json, "\"3.4\"");
        let back: ProtocolVersion = serde_json::from_str("\" 3.3\"").unwrap();
        assert_eq!(back, ProtocolVersion::V3_3);
    }
}
