// ── Command API ──
//
// Every outbound write is a `CommandRequest`: one property and its JSON
// argument. Stateful mower commands go through `MowerCommand::check`
// first, which refuses them locally when the current motion state does not
// allow them.

use std::fmt;

use moebot_api::DpId;
use serde_json::Value;
use strum::{Display, IntoStaticStr};
use tokio::sync::oneshot;

use crate::error::CoreError;
use crate::model::MotionState;
use crate::projector::Projection;

/// Opcodes accepted on the command property (115).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum Opcode {
    StartMowing,
    StartFixedMowing,
    ContinueWork,
    PauseWork,
    CancelWork,
    StartReturnStation,
}

impl Opcode {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// One property write.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub dp: DpId,
    pub value: Value,
}

impl CommandRequest {
    pub fn property(dp: DpId, value: impl Into<Value>) -> Self {
        Self {
            dp,
            value: value.into(),
        }
    }

    pub fn opcode(opcode: Opcode) -> Self {
        Self::property(DpId::Command, opcode.as_str())
    }

    /// The write that makes the mower push a full status report.
    pub fn request_status() -> Self {
        Self::property(DpId::RequestStatus, "")
    }
}

/// A stateful mower command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MowerCommand {
    /// Start (or resume) mowing. `spiral` selects fixed-area spiral mowing.
    Start { spiral: bool },
    Pause,
    Cancel,
    Dock,
}

/// A command that passed its state check.
#[derive(Debug, Clone, PartialEq)]
pub struct GatedCommand {
    pub request: CommandRequest,
    /// Motion state the mower should reach once the command took effect.
    pub expect: MotionState,
}

impl MowerCommand {
    pub fn name(self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Pause => "pause",
            Self::Cancel => "cancel",
            Self::Dock => "dock",
        }
    }

    /// Whether the command may be issued from `state`.
    pub fn permits(self, state: &MotionState) -> bool {
        use MotionState as S;
        match self {
            Self::Start { .. } => matches!(state, S::Standby | S::Paused | S::Charging),
            Self::Pause => matches!(state, S::Mowing | S::FixedMowing),
            Self::Cancel => matches!(state, S::Paused | S::ChargingWithTaskSuspend | S::Park),
            Self::Dock => matches!(state, S::Standby),
        }
    }

    /// Check the command against the current state and pick its opcode.
    ///
    /// Performs no I/O. An unknown state (nothing reported yet) never
    /// passes.
    pub fn check(self, current: Option<&MotionState>) -> Result<GatedCommand, CoreError> {
        let Some(state) = current.filter(|s| self.permits(s)) else {
            return Err(CoreError::IllegalState {
                command: self.name().to_owned(),
                state: current.map_or_else(|| "unknown".to_owned(), ToString::to_string),
            });
        };

        let (opcode, expect) = match self {
            Self::Start { spiral } => {
                let opcode = if *state == MotionState::Paused {
                    Opcode::ContinueWork
                } else if spiral {
                    Opcode::StartFixedMowing
                } else {
                    Opcode::StartMowing
                };
                (opcode, MotionState::Mowing)
            }
            Self::Pause => (Opcode::PauseWork, MotionState::Paused),
            Self::Cancel => (Opcode::CancelWork, MotionState::Standby),
            Self::Dock => (Opcode::StartReturnStation, MotionState::Park),
        };

        Ok(GatedCommand {
            request: CommandRequest::opcode(opcode),
            expect,
        })
    }
}

impl fmt::Display for MowerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start { spiral: true } => f.write_str("start (spiral)"),
            other => f.write_str(other.name()),
        }
    }
}

// ── Loop envelopes ──────────────────────────────────────────────────

/// What the session loop should do with a queued entry.
#[derive(Debug)]
pub(crate) enum Request {
    Write(CommandRequest),
    Poll,
}

/// A queue entry. Entries with a reply channel are awaited by the caller;
/// dropping the sender (as `unlisten` does) reads as cancellation.
pub(crate) struct CommandEnvelope {
    pub request: Request,
    pub response_tx: Option<oneshot::Sender<Result<Projection, CoreError>>>,
}
