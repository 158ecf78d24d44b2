// ── Payload projection ──
//
// Turns raw device payloads into snapshot updates. Each recognised property
// has a typed setter; keys the mower sends that we do not model are
// ignored, and values of the wrong JSON type are logged and skipped so one
// odd field never discards the rest of the report.

use std::sync::Arc;

use moebot_api::{DEVICE_UNREACHABLE, DpId, Payload, ZoneConfig, ZoneDecodeError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::listeners::ListenerHub;
use crate::model::{MotionState, StateSnapshot};
use crate::store::SnapshotStore;

/// Result of projecting one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// The payload was a valid report and the snapshot now reflects it.
    Applied,
    /// Nothing usable: absent, error-shaped, or missing its `dps` section.
    Invalid,
    /// The device (or transport) reported the mower unreachable; the
    /// snapshot was marked offline.
    Unreachable,
}

impl Projection {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }

    /// How a transport-level failure would have projected.
    pub fn from_error(err: &moebot_api::Error) -> Self {
        if err.is_unreachable() {
            Self::Unreachable
        } else {
            Self::Invalid
        }
    }
}

#[derive(Debug, Error)]
enum FieldError {
    #[error("expected {0}")]
    Type(&'static str),
    #[error("{0} is out of range")]
    Range(u64),
    #[error(transparent)]
    Zones(#[from] ZoneDecodeError),
}

type Setter = fn(&mut StateSnapshot, &Value) -> Result<(), FieldError>;

/// Setter for each readable property. Write-only properties have none.
fn setter(dp: DpId) -> Option<Setter> {
    match dp {
        DpId::Battery | DpId::BatteryAlt => Some(set_battery),
        DpId::MotionState => Some(set_motion_state),
        DpId::EmergencyState => Some(set_emergency_state),
        DpId::MowInRain => Some(set_mow_in_rain),
        DpId::MowTime => Some(set_mow_time),
        DpId::Zones => Some(set_zones),
        DpId::WorkMode => Some(set_work_mode),
        DpId::RequestStatus | DpId::Command => None,
    }
}

fn set_battery(s: &mut StateSnapshot, v: &Value) -> Result<(), FieldError> {
    let raw = v.as_u64().ok_or(FieldError::Type("integer"))?;
    s.battery_percent = Some(u8::try_from(raw).map_err(|_| FieldError::Range(raw))?);
    Ok(())
}

fn set_motion_state(s: &mut StateSnapshot, v: &Value) -> Result<(), FieldError> {
    let raw = v.as_str().ok_or(FieldError::Type("string"))?;
    s.motion_state = Some(MotionState::from(raw));
    Ok(())
}

fn set_emergency_state(s: &mut StateSnapshot, v: &Value) -> Result<(), FieldError> {
    s.emergency_state = Some(opaque(v)?);
    Ok(())
}

fn set_mow_in_rain(s: &mut StateSnapshot, v: &Value) -> Result<(), FieldError> {
    s.mow_in_rain = Some(v.as_bool().ok_or(FieldError::Type("boolean"))?);
    Ok(())
}

fn set_mow_time(s: &mut StateSnapshot, v: &Value) -> Result<(), FieldError> {
    let raw = v.as_u64().ok_or(FieldError::Type("integer"))?;
    s.mow_time_minutes = Some(u32::try_from(raw).map_err(|_| FieldError::Range(raw))?);
    Ok(())
}

fn set_zones(s: &mut StateSnapshot, v: &Value) -> Result<(), FieldError> {
    let encoded = v.as_str().ok_or(FieldError::Type("base64 string"))?;
    s.zones = Some(ZoneConfig::decode(encoded)?);
    Ok(())
}

fn set_work_mode(s: &mut StateSnapshot, v: &Value) -> Result<(), FieldError> {
    s.work_mode = Some(opaque(v)?);
    Ok(())
}

/// Opaque fields keep any scalar, strings verbatim and the rest as JSON text.
fn opaque(v: &Value) -> Result<String, FieldError> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(_) | Value::Number(_) => Ok(v.to_string()),
        _ => Err(FieldError::Type("scalar")),
    }
}

// ── Projector ───────────────────────────────────────────────────────

/// Applies payloads to the snapshot store and fans accepted ones out to
/// listeners.
#[derive(Clone)]
pub struct PayloadProjector {
    store: Arc<SnapshotStore>,
    listeners: Arc<ListenerHub>,
}

impl PayloadProjector {
    pub fn new(store: Arc<SnapshotStore>, listeners: Arc<ListenerHub>) -> Self {
        Self { store, listeners }
    }

    pub fn project(&self, payload: Option<&Payload>) -> Projection {
        let Some(payload) = payload else {
            debug!("no payload to project");
            return Projection::Invalid;
        };

        if payload.is_error() {
            let code = payload.error_code();
            let message = payload.error_message.as_deref().unwrap_or_default();
            if code == Some(DEVICE_UNREACHABLE) {
                warn!(detail = message, "mower is unreachable");
                self.mark_offline();
                return Projection::Unreachable;
            }
            warn!(?code, detail = message, "mower returned an error payload");
            return Projection::Invalid;
        }

        let Some(dps) = payload.dps.as_ref() else {
            debug!(payload = %payload.to_value(), "payload has no dps section");
            return Projection::Invalid;
        };

        self.store.update(|snapshot| {
            snapshot.online = true;
            for dp in DpId::REPORTED {
                let (Some(value), Some(set)) = (dps.get(dp.key()), setter(dp)) else {
                    continue;
                };
                if let Err(e) = set(snapshot, value) {
                    warn!(property = %dp, %value, error = %e, "skipping malformed property");
                }
            }
            for key in dps.keys().filter(|k| DpId::from_key(k).is_none()) {
                trace!(%key, "ignoring unknown property");
            }
            if let Some(t) = payload.timestamp {
                snapshot.last_update = Some(t);
            }
        });

        self.listeners.notify(payload);
        Projection::Applied
    }

    /// Record a transport failure. Unreachable-class errors mark the mower
    /// offline; anything else only gets logged.
    pub fn project_error(&self, err: &moebot_api::Error) -> Projection {
        let projection = Projection::from_error(err);
        if projection == Projection::Unreachable {
            warn!(error = %err, "mower is unreachable");
            self.mark_offline();
        } else {
            warn!(error = %err, "transport request failed");
        }
        projection
    }

    fn mark_offline(&self) {
        self.store.update(|snapshot| snapshot.online = false);
    }
}
