// ── Device payloads ──
//
// Everything the mower sends back is a JSON object. Successful reads carry
// a `dps` map of property key -> value and usually a `t` timestamp. Failed
// reads carry an `Err` code (sometimes a number, sometimes a numeric string)
// and an `Error` message instead.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::dps::DpId;
use crate::error::Error;

/// A raw payload received from the device.
///
/// Unknown top-level fields are preserved in `extra` so that listeners can
/// see exactly what the device sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Property map, absent on errors and bare acknowledgements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dps: Option<Map<String, Value>>,

    /// Device-side unix timestamp of the report.
    #[serde(
        rename = "t",
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<i64>,

    /// Error marker, kept verbatim.
    #[serde(rename = "Err", default, skip_serializing_if = "Option::is_none")]
    pub err: Option<Value>,

    /// Human-readable error text accompanying `Err`.
    #[serde(rename = "Error", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// All remaining fields the device sends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Payload {
    /// Parse a payload from a JSON text frame.
    pub fn parse(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| {
            debug!(error = %e, body = text, "unparseable device frame");
            Error::Deserialization {
                message: e.to_string(),
                body: text.to_owned(),
            }
        })
    }

    /// Build a payload from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let body = value.to_string();
        serde_json::from_value(value).map_err(|e| {
            debug!(error = %e, %body, "device payload has an unexpected shape");
            Error::Deserialization {
                message: e.to_string(),
                body,
            }
        })
    }

    /// Build a successful report carrying the given properties.
    pub fn report(dps: Map<String, Value>) -> Self {
        Self {
            dps: Some(dps),
            ..Self::default()
        }
    }

    /// Build an error-shaped payload, as the transport does for failed reads.
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self {
            err: Some(Value::String(code.to_string())),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_timestamp(mut self, t: i64) -> Self {
        self.timestamp = Some(t);
        self
    }

    /// `true` if the payload carries an error marker.
    pub fn is_error(&self) -> bool {
        self.err.is_some()
    }

    /// Numeric error code, if the marker holds one.
    pub fn error_code(&self) -> Option<u32> {
        match self.err.as_ref()? {
            Value::Number(n) => n.as_u64().and_then(|c| u32::try_from(c).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Look up a known property.
    pub fn get(&self, dp: DpId) -> Option<&Value> {
        self.dps.as_ref()?.get(dp.key())
    }

    /// The full payload as a JSON value.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Accept a timestamp either as a JSON number or a numeric string.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_status_report() {
        let payload = Payload::from_value(json!({
            "devId": "bf0123456789abcdef",
            "dps": { "6": 87, "101": "STANDBY", "104": true },
            "t": 1_699_999_999
        }))
        .unwrap();

        assert!(!payload.is_error());
        assert_eq!(payload.timestamp, Some(1_699_999_999));
        assert_eq!(payload.get(DpId::Battery), Some(&json!(87)));
        assert_eq!(payload.get(DpId::MotionState), Some(&json!("STANDBY")));
        assert_eq!(payload.get(DpId::MowTime), None);
        assert_eq!(payload.extra["devId"], "bf0123456789abcdef");
    }

    #[test]
    fn error_code_accepts_string_and_number() {
        let stringly = Payload::parse(
            r#"{"Error": "Network Error: Device Unreachable", "Err": "905", "Payload": null}"#,
        )
        .unwrap();
        assert!(stringly.is_error());
        assert_eq!(stringly.error_code(), Some(905));
        assert_eq!(
            stringly.error_message.as_deref(),
            Some("Network Error: Device Unreachable")
        );

        let numeric = Payload::from_value(json!({ "Err": 914 })).unwrap();
        assert_eq!(numeric.error_code(), Some(914));
    }

    #[test]
    fn non_numeric_error_marker_is_still_an_error() {
        let payload = Payload::from_value(json!({ "Err": "bad" })).unwrap();
        assert!(payload.is_error());
        assert_eq!(payload.error_code(), None);
    }

    #[test]
    fn string_timestamp_is_accepted() {
        let payload = Payload::from_value(json!({ "dps": {}, "t": "1700000000" })).unwrap();
        assert_eq!(payload.timestamp, Some(1_700_000_000));
    }

    #[test]
    fn serializes_back_to_device_shape() {
        let mut dps = Map::new();
        dps.insert("105".into(), json!(30));
        let payload = Payload::report(dps).with_timestamp(42);

        assert_eq!(payload.to_value(), json!({ "dps": { "105": 30 }, "t": 42 }));
        assert_eq!(
            Payload::error(905, "offline").to_value(),
            json!({ "Err": "905", "Error": "offline" })
        );
    }

    #[test]
    fn malformed_text_keeps_body() {
        let err = Payload::parse("not json").unwrap_err();
        match err {
            Error::Deserialization { body, .. } => assert_eq!(body, "not json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
