// ── Device link ──
//
// The transport together with the projector. Every exchange with the mower
// goes through here, whether it is issued by the session loop or inline by
// a caller, so whatever comes back always lands in the snapshot.

use std::sync::Arc;
use std::time::Duration;

use moebot_api::{DeviceTransport, Payload, ProtocolVersion};
use tokio::sync::Mutex;
use tracing::debug;

use crate::command::CommandRequest;
use crate::projector::{PayloadProjector, Projection};

type ApiResult<T> = Result<T, moebot_api::Error>;

#[derive(Clone)]
pub(crate) struct Link {
    transport: Arc<Mutex<Box<dyn DeviceTransport>>>,
    projector: PayloadProjector,
}

impl Link {
    pub(crate) fn new(transport: Box<dyn DeviceTransport>, projector: PayloadProjector) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
            projector,
        }
    }

    pub(crate) async fn set_version(&self, version: ProtocolVersion) {
        self.transport.lock().await.set_version(version);
    }

    pub(crate) async fn set_persistent(&self, persistent: bool) {
        self.transport.lock().await.set_persistent(persistent);
    }

    /// Full status read. No reply at all counts as an invalid projection.
    pub(crate) async fn status(&self) -> ApiResult<Projection> {
        let reply = self.transport.lock().await.status().await;
        Ok(self.absorb(reply)?.unwrap_or_else(|| self.projector.project(None)))
    }

    /// Status read followed by the request-status trigger, which makes the
    /// mower push every property rather than only the ones that changed.
    pub(crate) async fn poll(&self) -> ApiResult<Projection> {
        let mut transport = self.transport.lock().await;

        let reply = transport.status().await;
        let projection = self
            .absorb(reply)?
            .unwrap_or_else(|| self.projector.project(None));

        let request = CommandRequest::request_status();
        let trigger = transport.set_value(request.dp, request.value).await;
        if let Err(e) = self.absorb(trigger) {
            debug!(error = %e, "status trigger was not accepted");
        }

        Ok(projection)
    }

    pub(crate) async fn write(&self, request: CommandRequest) -> ApiResult<Option<Projection>> {
        let reply = self
            .transport
            .lock()
            .await
            .set_value(request.dp, request.value)
            .await;
        self.absorb(reply)
    }

    pub(crate) async fn heartbeat(&self) -> ApiResult<Option<Projection>> {
        let reply = self.transport.lock().await.heartbeat().await;
        self.absorb(reply)
    }

    /// Wait up to `window` for an unsolicited push.
    pub(crate) async fn receive(&self, window: Duration) -> ApiResult<Option<Projection>> {
        let mut transport = self.transport.lock().await;
        match tokio::time::timeout(window, transport.receive()).await {
            Ok(reply) => self.absorb(reply),
            Err(_) => Ok(None),
        }
    }

    /// Project whatever came back. Transport errors are recorded (an
    /// unreachable mower goes offline) and handed back to the caller.
    fn absorb(&self, reply: ApiResult<Option<Payload>>) -> ApiResult<Option<Projection>> {
        match reply {
            Ok(payload) => Ok(payload.map(|p| self.projector.project(Some(&p)))),
            Err(e) => {
                self.projector.project_error(&e);
                Err(e)
            }
        }
    }
}

/// Collapse an exchange into the projection the loop acts on.
pub(crate) fn settle(result: &ApiResult<Option<Projection>>) -> Option<Projection> {
    match result {
        Ok(projection) => *projection,
        Err(e) => Some(Projection::from_error(e)),
    }
}
