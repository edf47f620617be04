//! Loopback authorization client
//!
//! Stands in for the vendor consent UI. Every launch is recorded; when built
//! with [`LoopbackAuthorizer::with_auto_reply`] each launch is immediately
//! answered with a fixed result code on a channel, the way a host delivers
//! activity results.

use bridge_traits::{
    error::{BridgeError, Result},
    AccessRequest, AuthorizationClient, HostSurface,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Android `RESULT_OK`.
const RESULT_OK: i32 = -1;

/// A handshake result as the host would report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityResult {
    pub request_code: i32,
    pub result_code: i32,
}

/// One call to `launch_authorization`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRecord {
    pub surface_id: String,
    pub request: AccessRequest,
    pub request_code: i32,
}

#[derive(Debug, Default)]
pub struct LoopbackAuthorizer {
    granted: AtomicBool,
    auto_reply: Option<(i32, mpsc::UnboundedSender<ActivityResult>)>,
    launches: Mutex<Vec<LaunchRecord>>,
}

impl LoopbackAuthorizer {
    /// Authorizer that records launches and never answers them.
    pub fn new() -> Self {
        Self::default()
    }

    /// Authorizer answering every launch with `result_code`.
    ///
    /// An OK answer also marks the permissions as granted.
    pub fn with_auto_reply(result_code: i32) -> (Self, mpsc::UnboundedReceiver<ActivityResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let authorizer = Self {
            auto_reply: Some((result_code, tx)),
            ..Self::default()
        };
        (authorizer, rx)
    }

    pub fn grant(&self) {
        self.granted.store(true, Ordering::SeqCst);
    }

    pub fn revoke(&self) {
        self.granted.store(false, Ordering::SeqCst);
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.launches.lock().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().len()
    }
}

impl AuthorizationClient for LoopbackAuthorizer {
    fn has_permissions(&self, _surface: &dyn HostSurface, request: &AccessRequest) -> Result<bool> {
        let granted = self.granted.load(Ordering::SeqCst);
        debug!(granted, types = request.types.len(), "Loopback permission check");
        Ok(granted)
    }

    fn launch_authorization(
        &self,
        surface: &dyn HostSurface,
        request: &AccessRequest,
        request_code: i32,
    ) -> Result<()> {
        if surface.is_finishing() {
            return Err(BridgeError::SurfaceUnavailable(format!(
                "surface {} is closing",
                surface.surface_id()
            )));
        }

        self.launches.lock().push(LaunchRecord {
            surface_id: surface.surface_id().to_string(),
            request: request.clone(),
            request_code,
        });
        debug!(request_code, surface_id = surface.surface_id(), "Loopback handshake launched");

        if let Some((result_code, tx)) = &self.auto_reply {
            if *result_code == RESULT_OK {
                self.grant();
            }
            let reply = ActivityResult {
                request_code,
                result_code: *result_code,
            };
            if tx.send(reply).is_err() {
                warn!(request_code, "Activity result receiver dropped");
            }
        }

        Ok(())
    }
}
