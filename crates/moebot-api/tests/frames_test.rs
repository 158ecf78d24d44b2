// Decoding of frames as captured from real mowers.

use serde_json::json;

use moebot_api::{DEVICE_UNREACHABLE, DpId, Error, Payload, Zone, ZoneConfig};

// ── Status reports ──────────────────────────────────────────────────

#[test]
fn test_full_status_report() {
    let frame = r#"{
        "devId": "bf8e1c2a9d0e4f1b3c5a7d",
        "dps": {
            "6": 87,
            "101": "MOWING",
            "103": "PRO_NO_ERROR",
            "104": true,
            "105": 4,
            "113": "AAAACgAAAAAAAAAAAAAAAAAAAAAAAAAAAA==",
            "114": "AutoMode"
        },
        "t": 1700000000
    }"#;

    let payload = Payload::parse(frame).unwrap();

    assert!(!payload.is_error());
    assert_eq!(payload.timestamp, Some(1_700_000_000));
    assert_eq!(payload.get(DpId::Battery), Some(&json!(87)));
    assert_eq!(payload.get(DpId::MotionState), Some(&json!("MOWING")));
    assert_eq!(payload.get(DpId::MowInRain), Some(&json!(true)));
    assert_eq!(payload.get(DpId::BatteryAlt), None);
    assert_eq!(payload.extra.get("devId"), Some(&json!("bf8e1c2a9d0e4f1b3c5a7d")));

    let zones = payload
        .get(DpId::Zones)
        .and_then(|v| v.as_str())
        .map(ZoneConfig::decode)
        .unwrap()
        .unwrap();
    assert_eq!(zones.zone(1), Some(Zone::new(10, 0)));
}

#[test]
fn test_string_timestamp_is_accepted() {
    let payload = Payload::parse(r#"{"dps": {"101": "STANDBY"}, "t": "1700000123"}"#).unwrap();
    assert_eq!(payload.timestamp, Some(1_700_000_123));
}

#[test]
fn test_unknown_keys_are_ignored_by_lookup() {
    let payload = Payload::parse(r#"{"dps": {"999": 1, "6": 50}}"#).unwrap();
    assert_eq!(payload.get(DpId::Battery), Some(&json!(50)));
    assert_eq!(DpId::from_key("999"), None);
}

// ── Error frames ────────────────────────────────────────────────────

#[test]
fn test_unreachable_frame_as_string_code() {
    let payload =
        Payload::parse(r#"{"Error": "Network Error: Device Unreachable", "Err": "905", "Payload": null}"#)
            .unwrap();

    assert!(payload.is_error());
    assert_eq!(payload.error_code(), Some(DEVICE_UNREACHABLE));
    assert_eq!(
        payload.error_message.as_deref(),
        Some("Network Error: Device Unreachable")
    );
    assert!(payload.dps.is_none());
}

#[test]
fn test_unreachable_frame_as_numeric_code() {
    let payload = Payload::parse(r#"{"Err": 905, "Error": "unreachable"}"#).unwrap();
    assert_eq!(payload.error_code(), Some(DEVICE_UNREACHABLE));
}

#[test]
fn test_other_error_code() {
    let payload = Payload::parse(r#"{"Err": "914", "Error": "Check device key or version"}"#).unwrap();
    assert!(payload.is_error());
    assert_eq!(payload.error_code(), Some(914));
}

#[test]
fn test_garbage_frame_is_deserialization_error() {
    let err = Payload::parse("not json").unwrap_err();
    assert!(matches!(err, Error::Deserialization { ref body, .. } if body == "not json"));
    assert!(!err.is_unreachable());
}

// ── Zones ───────────────────────────────────────────────────────────

#[test]
fn test_zone_block_survives_device_round_trip() {
    let config = ZoneConfig::new([
        Zone::new(12, 40),
        Zone::new(30, 30),
        Zone::new(55, 20),
        Zone::new(0, 0),
        Zone::new(80, 10),
    ]);

    let frame = json!({ "dps": { "113": config.encode() } });
    let payload = Payload::from_value(frame).unwrap();
    let decoded = payload
        .get(DpId::Zones)
        .and_then(|v| v.as_str())
        .map(ZoneConfig::decode)
        .unwrap()
        .unwrap();

    assert_eq!(decoded, config);
}
