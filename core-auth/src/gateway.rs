//! # Authorization Gateway
//!
//! Dispatches named method calls to platform capabilities.
//!
//! ## Overview
//!
//! Every command answers its continuation exactly once, except
//! `requestAuthorization`: that one parks the continuation in the
//! [`PendingSlot`] and returns as soon as the handshake UI is launched. The
//! caller is resumed later, when the host reports the handshake outcome
//! through [`AuthorizationGateway::deliver_outcome`], when the optional
//! timeout fires, or never, if the surface is torn down first.
//!
//! | command | needs surface | answer |
//! |---------|---------------|--------|
//! | `checkAvailability` | no | `bool` from the probe, `true` without one |
//! | `hasPermissions` | yes | `bool` |
//! | `requestAuthorization` | yes | `true` once granted |
//! | `getData` | no | list of records, empty without a data source |
//! | anything else | - | `NotImplemented` |
//!
//! ## Usage
//!
//! ```no_run
//! use bridge_traits::{AccessRequest, AuthorizationClient, HostSurface, MethodCall};
//! use core_auth::{ActivityOutcome, AuthorizationGateway, RequestCorrelator, SurfaceBinding};
//! use core_runtime::{config::PluginConfig, events::EventBus};
//! use serde_json::json;
//! use std::sync::Arc;
//! # struct Sdk;
//! # impl AuthorizationClient for Sdk {
//! #     fn has_permissions(&self, _: &dyn HostSurface, _: &AccessRequest) -> bridge_traits::error::Result<bool> { Ok(false) }
//! #     fn launch_authorization(&self, _: &dyn HostSurface, _: &AccessRequest, _: i32) -> bridge_traits::error::Result<()> { Ok(()) }
//! # }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = PluginConfig::default();
//! let gateway = AuthorizationGateway::new(
//!     Arc::new(RequestCorrelator::new(config.pending_policy)),
//!     Arc::new(SurfaceBinding::new()),
//!     Arc::new(Sdk),
//!     EventBus::new(config.event_buffer_size),
//!     &config,
//! );
//!
//! let (tx, rx) = tokio::sync::oneshot::channel();
//! let call = MethodCall::new("requestAuthorization", json!({ "types": ["STEPS"], "permissions": [0] }));
//! gateway.dispatch(call, Box::new(tx)).await;
//!
//! // Later, from the host's activity-result callback:
//! gateway.deliver_outcome(ActivityOutcome::new(1001, -1));
//! let response = rx.await;
//! # }
//! ```

use bridge_traits::{
    AccessRequest, AuthorizationClient, BridgeError, CapabilityProbe, DataQuery, HealthAccess,
    HealthDataSource, HostSurface, MethodCall, MethodResponse, SurfaceProvider,
};
use core_runtime::config::PluginConfig;
use core_runtime::events::{AuthorizationEvent, CoreEvent, EventBus};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::correlator::{Continuation, PendingSlot};
use crate::error::{GatewayError, Result, AUTHORIZATION_FAILED_MESSAGE};
use crate::types::{ActivityOutcome, Command, PendingTicket, RequestTag};

/// Routes method calls to the vendor SDK and owns the authorization flow.
pub struct AuthorizationGateway {
    slot: Arc<dyn PendingSlot>,
    surfaces: Arc<dyn SurfaceProvider>,
    authorizer: Arc<dyn AuthorizationClient>,
    probe: Option<Arc<dyn CapabilityProbe>>,
    data_source: Option<Arc<dyn HealthDataSource>>,
    event_bus: EventBus,
    request_tag: RequestTag,
    scopes: Vec<String>,
    authorization_timeout: Option<Duration>,
}

impl AuthorizationGateway {
    pub fn new(
        slot: Arc<dyn PendingSlot>,
        surfaces: Arc<dyn SurfaceProvider>,
        authorizer: Arc<dyn AuthorizationClient>,
        event_bus: EventBus,
        config: &PluginConfig,
    ) -> Self {
        Self {
            slot,
            surfaces,
            authorizer,
            probe: None,
            data_source: None,
            event_bus,
            request_tag: RequestTag::new(config.request_code),
            scopes: config.scopes.clone(),
            authorization_timeout: config.authorization_timeout,
        }
    }

    /// Replaces the always-available answer of `checkAvailability`.
    pub fn with_probe(mut self, probe: Arc<dyn CapabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Backs `getData` with a real store instead of the empty answer.
    pub fn with_data_source(mut self, data_source: Arc<dyn HealthDataSource>) -> Self {
        self.data_source = Some(data_source);
        self
    }

    pub fn request_tag(&self) -> RequestTag {
        self.request_tag
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_pending()
    }

    /// Handles one method call, answering `continuation` now or, for
    /// `requestAuthorization`, once the handshake finishes.
    #[instrument(skip(self, call, continuation), fields(method = %call.method))]
    pub async fn dispatch(&self, call: MethodCall, continuation: Continuation) {
        let result = match Command::parse(&call.method) {
            Command::CheckAvailability => self.check_availability().await.map(Value::Bool),
            Command::HasPermissions => self.has_permissions(&call).map(Value::Bool),
            Command::GetData => self.get_data(&call).await,
            Command::RequestAuthorization => {
                self.request_authorization(&call, continuation);
                return;
            }
            Command::Unknown(method) => {
                debug!(method = %method, "Unhandled method");
                Err(GatewayError::NotImplemented { method })
            }
        };

        respond(continuation, result);
    }

    async fn check_availability(&self) -> Result<bool> {
        match &self.probe {
            Some(probe) => Ok(probe.is_available().await?),
            None => Ok(true),
        }
    }

    fn has_permissions(&self, call: &MethodCall) -> Result<bool> {
        let surface = self.require_surface()?;
        let request = self.access_request(call)?;
        let granted = self.authorizer.has_permissions(surface.as_ref(), &request)?;
        debug!(granted, types = request.types.len(), "Permission check");
        Ok(granted)
    }

    async fn get_data(&self, call: &MethodCall) -> Result<Value> {
        // Without a source the arguments are not looked at.
        let Some(source) = &self.data_source else {
            return Ok(Value::Array(Vec::new()));
        };

        let query: DataQuery = match &call.arguments {
            Value::Null => DataQuery::default(),
            args => serde_json::from_value(args.clone())
                .map_err(|e| GatewayError::InvalidArguments(e.to_string()))?,
        };

        let records = source.query(&query).await?;
        debug!(count = records.len(), "Fetched health records");
        serde_json::to_value(records)
            .map_err(|e| GatewayError::Bridge(BridgeError::OperationFailed(e.to_string())))
    }

    fn request_authorization(&self, call: &MethodCall, continuation: Continuation) {
        let prepared = self
            .require_surface()
            .and_then(|surface| Ok((surface, self.access_request(call)?)));
        let (surface, request) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(code = err.code(), "Authorization request refused");
                return respond(continuation, Err(err));
            }
        };

        let registered = match self.slot.register(self.request_tag, continuation) {
            Ok(registered) => registered,
            Err(rejected) => {
                warn!(
                    pending = rejected.pending.value(),
                    "Authorization already in progress"
                );
                return rejected.reject();
            }
        };

        if let Some(old) = registered.superseded {
            self.emit(AuthorizationEvent::Superseded {
                request_code: old.tag.value(),
            });
        }

        // Published before launching: an SDK may report back from inside the launch.
        self.emit(AuthorizationEvent::Requested {
            request_code: self.request_tag.value(),
            surface_id: surface.surface_id().to_string(),
        });

        if let Err(err) =
            self.authorizer
                .launch_authorization(surface.as_ref(), &request, self.request_tag.value())
        {
            error!(error = %err, "Failed to launch authorization UI");
            let message = err.to_string();
            if self.slot.resolve_ticket(registered.ticket, Err(err.into())) {
                self.emit(AuthorizationEvent::LaunchFailed {
                    request_code: self.request_tag.value(),
                    message,
                });
            }
            return;
        }

        info!(
            request_code = self.request_tag.value(),
            surface_id = surface.surface_id(),
            "Authorization handshake launched"
        );

        if let Some(after) = self.authorization_timeout {
            self.arm_timeout(registered.ticket, after);
        }
    }

    fn arm_timeout(&self, ticket: PendingTicket, after: Duration) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No tokio runtime, authorization timeout disabled");
                return;
            }
        };

        let slot = Arc::clone(&self.slot);
        let event_bus = self.event_bus.clone();
        handle.spawn(async move {
            tokio::time::sleep(after).await;
            let expired = slot.resolve_ticket(
                ticket,
                Err(GatewayError::TimedOut {
                    tag: ticket.tag,
                    after,
                }),
            );
            if expired {
                warn!(
                    request_code = ticket.tag.value(),
                    after_secs = after.as_secs(),
                    "Authorization timed out"
                );
                let _ = event_bus.emit(CoreEvent::Authorization(AuthorizationEvent::TimedOut {
                    request_code: ticket.tag.value(),
                    after_secs: after.as_secs(),
                }));
            }
        });
    }

    /// Resolves the pending request with the platform's handshake result.
    ///
    /// Returns `false` when nothing was waiting for `outcome.tag`; such
    /// outcomes are logged and otherwise ignored.
    #[instrument(skip(self), fields(request_code = outcome.tag.value(), status = outcome.status.code()))]
    pub fn deliver_outcome(&self, outcome: ActivityOutcome) -> bool {
        let result = if outcome.status.is_ok() {
            Ok(Value::Bool(true))
        } else {
            Err(GatewayError::AuthorizationFailed {
                message: AUTHORIZATION_FAILED_MESSAGE.to_string(),
                status: outcome.status.code(),
            })
        };

        let request_code = outcome.tag.value();
        if !self.slot.resolve(outcome.tag, result) {
            warn!("Ignoring authorization outcome with nothing pending");
            self.emit(AuthorizationEvent::StrayOutcome {
                request_code,
                status: outcome.status.code(),
            });
            return false;
        }

        if outcome.status.is_ok() {
            info!("Authorization granted");
            self.emit(AuthorizationEvent::Granted { request_code });
        } else {
            info!("Authorization denied");
            self.emit(AuthorizationEvent::Denied {
                request_code,
                status: outcome.status.code(),
            });
        }
        true
    }

    /// Drops the pending request without answering it.
    ///
    /// Used when the owning surface is destroyed. The caller of
    /// `requestAuthorization` will never receive a response.
    pub fn abandon_pending(&self) -> Option<PendingTicket> {
        let dropped = self.slot.clear()?;
        warn!(
            request_code = dropped.tag.value(),
            "Pending authorization abandoned, caller will not be answered"
        );
        self.emit(AuthorizationEvent::Abandoned {
            request_code: dropped.tag.value(),
        });
        Some(dropped)
    }

    fn require_surface(&self) -> Result<Arc<dyn HostSurface>> {
        self.surfaces
            .current_surface()
            .ok_or(GatewayError::NoContext)
    }

    fn access_request(&self, call: &MethodCall) -> Result<AccessRequest> {
        let types: Vec<String> = call.argument("types")?.unwrap_or_default();
        let permissions = call
            .argument::<Vec<i32>>("permissions")?
            .unwrap_or_default()
            .into_iter()
            .map(|code| {
                HealthAccess::from_code(code).ok_or_else(|| {
                    GatewayError::InvalidArguments(format!("Unknown permission code {}", code))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(AccessRequest {
            types,
            permissions,
            scopes: self.scopes.clone(),
        })
    }

    fn emit(&self, event: AuthorizationEvent) {
        // No subscribers is fine.
        let _ = self.event_bus.emit(CoreEvent::Authorization(event));
    }
}

fn respond(continuation: Continuation, result: Result<Value>) {
    let response = match result {
        Ok(value) => MethodResponse::success(value),
        Err(err) => {
            debug!(code = err.code(), error = %err, "Command failed");
            err.into_response()
        }
    };
    continuation.deliver(response);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::RequestCorrelator;
    use crate::surface::SurfaceBinding;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::HealthRecord;
    use chrono::{TimeZone, Utc};
    use core_runtime::config::PendingPolicy;
    use mockall::mock;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::oneshot;

    mock! {
        Probe {}

        #[async_trait]
        impl CapabilityProbe for Probe {
            async fn is_available(&self) -> BridgeResult<bool>;
        }
    }

    mock! {
        DataSource {}

        #[async_trait]
        impl HealthDataSource for DataSource {
            async fn query(&self, query: &DataQuery) -> BridgeResult<Vec<HealthRecord>>;
        }
    }

    struct Launch {
        surface_id: String,
        request: AccessRequest,
        request_code: i32,
    }

    #[derive(Default)]
    struct RecordingAuthorizer {
        granted: bool,
        fail_launch: bool,
        launches: Mutex<Vec<Launch>>,
    }

    impl AuthorizationClient for RecordingAuthorizer {
        fn has_permissions(&self, _: &dyn HostSurface, _: &AccessRequest) -> BridgeResult<bool> {
            Ok(self.granted)
        }

        fn launch_authorization(
            &self,
            surface: &dyn HostSurface,
            request: &AccessRequest,
            request_code: i32,
        ) -> BridgeResult<()> {
            if self.fail_launch {
                return Err(BridgeError::OperationFailed("sign-in client missing".into()));
            }
            self.launches.lock().push(Launch {
                surface_id: surface.surface_id().to_string(),
                request: request.clone(),
                request_code,
            });
            Ok(())
        }
    }

    struct Window;

    impl HostSurface for Window {
        fn surface_id(&self) -> &str {
            "main-window"
        }
    }

    struct Harness {
        gateway: AuthorizationGateway,
        authorizer: Arc<RecordingAuthorizer>,
        surfaces: Arc<SurfaceBinding>,
        events: EventBus,
        // Keeps the weakly bound surface alive.
        _window: Arc<dyn HostSurface>,
    }

    fn harness_with(config: PluginConfig, authorizer: RecordingAuthorizer) -> Harness {
        let authorizer = Arc::new(authorizer);
        let surfaces = Arc::new(SurfaceBinding::new());
        let window: Arc<dyn HostSurface> = Arc::new(Window);
        surfaces.attach(&window);
        let events = EventBus::new(16);

        let gateway = AuthorizationGateway::new(
            Arc::new(RequestCorrelator::new(config.pending_policy)),
            surfaces.clone(),
            authorizer.clone(),
            events.clone(),
            &config,
        );

        Harness {
            gateway,
            authorizer,
            surfaces,
            events,
            _window: window,
        }
    }

    fn harness() -> Harness {
        harness_with(PluginConfig::default(), RecordingAuthorizer::default())
    }

    async fn call(
        gateway: &AuthorizationGateway,
        method: &str,
        arguments: Value,
    ) -> oneshot::Receiver<MethodResponse> {
        let (tx, rx) = oneshot::channel();
        gateway
            .dispatch(MethodCall::new(method, arguments), Box::new(tx))
            .await;
        rx
    }

    fn auth_args() -> Value {
        json!({ "types": ["STEPS", "HEART_RATE"], "permissions": [0, 2] })
    }

    #[tokio::test]
    async fn test_check_availability_without_probe() {
        let h = harness();
        let response = call(&h.gateway, "checkAvailability", Value::Null).await;
        assert_eq!(response.await.unwrap(), MethodResponse::success(true));
    }

    #[tokio::test]
    async fn test_check_availability_uses_probe() {
        let mut probe = MockProbe::new();
        probe.expect_is_available().times(1).returning(|| Ok(false));

        let h = harness();
        let gateway = h.gateway.with_probe(Arc::new(probe));
        let response = call(&gateway, "checkAvailability", Value::Null).await;
        assert_eq!(response.await.unwrap(), MethodResponse::success(false));
    }

    #[tokio::test]
    async fn test_check_availability_probe_failure() {
        let mut probe = MockProbe::new();
        probe
            .expect_is_available()
            .returning(|| Err(BridgeError::NotAvailable("play services".into())));

        let gateway = harness().gateway.with_probe(Arc::new(probe));
        let response = call(&gateway, "checkAvailability", Value::Null).await;
        assert_eq!(response.await.unwrap().error_code(), Some("BRIDGE_ERROR"));
    }

    #[tokio::test]
    async fn test_has_permissions_requires_surface() {
        let h = harness();
        h.surfaces.detach();

        let response = call(&h.gateway, "hasPermissions", auth_args()).await;
        assert_eq!(
            response.await.unwrap(),
            MethodResponse::error("NO_ACTIVITY", "Activity not available")
        );
    }

    #[tokio::test]
    async fn test_has_permissions_answers_platform_state() {
        let h = harness_with(
            PluginConfig::default(),
            RecordingAuthorizer {
                granted: true,
                ..Default::default()
            },
        );
        let response = call(&h.gateway, "hasPermissions", auth_args()).await;
        assert_eq!(response.await.unwrap(), MethodResponse::success(true));
    }

    #[tokio::test]
    async fn test_unknown_permission_code_is_invalid() {
        let h = harness();
        let response = call(
            &h.gateway,
            "requestAuthorization",
            json!({ "types": ["STEPS"], "permissions": [9] }),
        )
        .await;

        assert_eq!(
            response.await.unwrap().error_code(),
            Some("INVALID_ARGUMENTS")
        );
        assert!(!h.gateway.is_pending());
        assert!(h.authorizer.launches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_has_permissions_rejects_malformed_types() {
        let h = harness();
        let response = call(
            &h.gateway,
            "hasPermissions",
            json!({ "types": "STEPS", "permissions": [0] }),
        )
        .await;

        assert_eq!(
            response.await.unwrap().error_code(),
            Some("INVALID_ARGUMENTS")
        );
    }

    #[tokio::test]
    async fn test_request_authorization_without_surface() {
        let h = harness();
        h.surfaces.detach();

        let response = call(&h.gateway, "requestAuthorization", auth_args()).await;
        assert_eq!(response.await.unwrap().error_code(), Some("NO_ACTIVITY"));
        assert!(!h.gateway.is_pending());
        assert!(h.authorizer.launches.lock().is_empty());
    }

    #[tokio::test]
    async fn test_request_authorization_granted() {
        let h = harness();
        let mut events = h.events.subscribe();

        let mut response = call(&h.gateway, "requestAuthorization", auth_args()).await;
        assert!(h.gateway.is_pending());
        assert!(response.try_recv().is_err());

        {
            let launches = h.authorizer.launches.lock();
            assert_eq!(launches.len(), 1);
            assert_eq!(launches[0].surface_id, "main-window");
            assert_eq!(launches[0].request_code, 1001);
            assert_eq!(
                launches[0].request.permissions,
                vec![HealthAccess::Read, HealthAccess::ReadWrite]
            );
            assert_eq!(launches[0].request.scopes, PluginConfig::default().scopes);
        }

        assert!(h.gateway.deliver_outcome(ActivityOutcome::new(1001, -1)));
        assert_eq!(response.await.unwrap(), MethodResponse::success(true));
        assert!(!h.gateway.is_pending());

        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Authorization(AuthorizationEvent::Requested {
                request_code: 1001,
                surface_id: "main-window".to_string(),
            })
        );
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Authorization(AuthorizationEvent::Granted { request_code: 1001 })
        );
    }

    #[tokio::test]
    async fn test_request_authorization_canceled() {
        let h = harness();
        let response = call(&h.gateway, "requestAuthorization", auth_args()).await;

        assert!(h.gateway.deliver_outcome(ActivityOutcome::new(1001, 0)));
        assert_eq!(
            response.await.unwrap(),
            MethodResponse::error("AUTH_FAILED", "Google Fit authorization failed")
                .with_details(json!({ "status": 0 }))
        );
    }

    #[tokio::test]
    async fn test_outcome_resolves_only_once() {
        let h = harness();
        let _response = call(&h.gateway, "requestAuthorization", auth_args()).await;

        assert!(h.gateway.deliver_outcome(ActivityOutcome::new(1001, -1)));
        assert!(!h.gateway.deliver_outcome(ActivityOutcome::new(1001, -1)));
    }

    #[tokio::test]
    async fn test_stray_outcome_is_ignored() {
        let h = harness();
        let mut events = h.events.subscribe();

        assert!(!h.gateway.deliver_outcome(ActivityOutcome::new(1001, 0)));
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Authorization(AuthorizationEvent::StrayOutcome {
                request_code: 1001,
                status: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_second_request_rejected_while_pending() {
        let h = harness();
        let first = call(&h.gateway, "requestAuthorization", auth_args()).await;
        let second = call(&h.gateway, "requestAuthorization", auth_args()).await;

        assert_eq!(
            second.await.unwrap().error_code(),
            Some("ALREADY_PENDING")
        );
        assert_eq!(h.authorizer.launches.lock().len(), 1);

        h.gateway.deliver_outcome(ActivityOutcome::new(1001, -1));
        assert_eq!(first.await.unwrap(), MethodResponse::success(true));
    }

    #[tokio::test]
    async fn test_second_request_evicts_under_evict_policy() {
        let config = PluginConfig::builder()
            .pending_policy(PendingPolicy::EvictPrevious)
            .build()
            .unwrap();
        let h = harness_with(config, RecordingAuthorizer::default());
        let mut events = h.events.subscribe();

        let first = call(&h.gateway, "requestAuthorization", auth_args()).await;
        let second = call(&h.gateway, "requestAuthorization", auth_args()).await;

        assert_eq!(first.await.unwrap().error_code(), Some("AUTH_SUPERSEDED"));
        h.gateway.deliver_outcome(ActivityOutcome::new(1001, -1));
        assert_eq!(second.await.unwrap(), MethodResponse::success(true));
        assert_eq!(h.authorizer.launches.lock().len(), 2);

        let mut superseded = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(
                event,
                CoreEvent::Authorization(AuthorizationEvent::Superseded { .. })
            ) {
                superseded += 1;
            }
        }
        assert_eq!(superseded, 1);
    }

    #[tokio::test]
    async fn test_launch_failure_clears_pending() {
        let h = harness_with(
            PluginConfig::default(),
            RecordingAuthorizer {
                fail_launch: true,
                ..Default::default()
            },
        );

        let mut events = h.events.subscribe();

        let response = call(&h.gateway, "requestAuthorization", auth_args()).await;
        assert_eq!(response.await.unwrap().error_code(), Some("BRIDGE_ERROR"));
        assert!(!h.gateway.is_pending());

        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Authorization(AuthorizationEvent::Requested {
                request_code: 1001,
                surface_id: "main-window".to_string(),
            })
        );
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Authorization(AuthorizationEvent::LaunchFailed {
                request_code: 1001,
                message: "Bridge operation failed: sign-in client missing".to_string(),
            })
        );
    }

    /// Resolves the pending slot from inside `launch_authorization`, the way an
    /// SDK with a cached grant may call straight back.
    struct InlineAuthorizer {
        slot: Arc<RequestCorrelator>,
    }

    impl AuthorizationClient for InlineAuthorizer {
        fn has_permissions(&self, _: &dyn HostSurface, _: &AccessRequest) -> BridgeResult<bool> {
            Ok(true)
        }

        fn launch_authorization(
            &self,
            _: &dyn HostSurface,
            _: &AccessRequest,
            request_code: i32,
        ) -> BridgeResult<()> {
            self.slot.resolve(RequestTag::new(request_code), Ok(Value::Bool(true)));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_requested_event_precedes_inline_outcome() {
        let config = PluginConfig::default();
        let slot = Arc::new(RequestCorrelator::new(config.pending_policy));
        let surfaces = Arc::new(SurfaceBinding::new());
        let window: Arc<dyn HostSurface> = Arc::new(Window);
        surfaces.attach(&window);
        let events = EventBus::new(16);
        let mut rx = events.subscribe();

        let gateway = AuthorizationGateway::new(
            slot.clone(),
            surfaces,
            Arc::new(InlineAuthorizer { slot: slot.clone() }),
            events,
            &config,
        );

        let response = call(&gateway, "requestAuthorization", auth_args()).await;
        assert_eq!(response.await.unwrap(), MethodResponse::success(true));
        assert!(!gateway.is_pending());

        assert_eq!(
            rx.recv().await.unwrap(),
            CoreEvent::Authorization(AuthorizationEvent::Requested {
                request_code: 1001,
                surface_id: "main-window".to_string(),
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_request_times_out() {
        let config = PluginConfig::builder()
            .authorization_timeout(Some(Duration::from_secs(30)))
            .build()
            .unwrap();
        let h = harness_with(config, RecordingAuthorizer::default());
        let mut events = h.events.subscribe();

        let response = call(&h.gateway, "requestAuthorization", auth_args()).await;
        assert_eq!(response.await.unwrap().error_code(), Some("AUTH_TIMEOUT"));
        assert!(!h.gateway.is_pending());

        // Late outcome after the timeout is a stray.
        assert!(!h.gateway.deliver_outcome(ActivityOutcome::new(1001, -1)));

        let mut timed_out = false;
        while let Ok(event) = events.try_recv() {
            if event
                == CoreEvent::Authorization(AuthorizationEvent::TimedOut {
                    request_code: 1001,
                    after_secs: 30,
                })
            {
                timed_out = true;
            }
        }
        assert!(timed_out);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_leaves_newer_request_alone() {
        let config = PluginConfig::builder()
            .authorization_timeout(Some(Duration::from_secs(10)))
            .build()
            .unwrap();
        let h = harness_with(config, RecordingAuthorizer::default());

        let first = call(&h.gateway, "requestAuthorization", auth_args()).await;
        h.gateway.deliver_outcome(ActivityOutcome::new(1001, -1));
        assert!(first.await.unwrap().is_success());

        tokio::time::sleep(Duration::from_secs(5)).await;
        let mut second = call(&h.gateway, "requestAuthorization", auth_args()).await;

        // First timer fires at t=10s, second at t=15s.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(h.gateway.is_pending());
        assert!(second.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(second.await.unwrap().error_code(), Some("AUTH_TIMEOUT"));
    }

    #[tokio::test]
    async fn test_abandon_pending_drops_caller() {
        let h = harness();
        let mut events = h.events.subscribe();
        let response = call(&h.gateway, "requestAuthorization", auth_args()).await;

        let dropped = h.gateway.abandon_pending().unwrap();
        assert_eq!(dropped.tag, RequestTag::new(1001));
        assert!(response.await.is_err());
        assert!(h.gateway.abandon_pending().is_none());

        let _requested = events.recv().await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Authorization(AuthorizationEvent::Abandoned { request_code: 1001 })
        );
    }

    #[tokio::test]
    async fn test_get_data_without_source_is_empty() {
        let h = harness();
        let response = call(&h.gateway, "getData", Value::Null).await;
        assert_eq!(response.await.unwrap(), MethodResponse::success(json!([])));
    }

    #[tokio::test]
    async fn test_get_data_queries_source() {
        let from = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();

        let mut source = MockDataSource::new();
        source
            .expect_query()
            .withf(|query| query.data_type.as_deref() == Some("STEPS"))
            .times(1)
            .returning(move |_| {
                Ok(vec![HealthRecord {
                    data_type: "STEPS".to_string(),
                    value: 4200.0,
                    unit: "COUNT".to_string(),
                    date_from: from,
                    date_to: to,
                    source_id: None,
                }])
            });

        let gateway = harness().gateway.with_data_source(Arc::new(source));
        let response = call(
            &gateway,
            "getData",
            json!({
                "dataTypeKey": "STEPS",
                "startTime": "2024-03-01T00:00:00Z",
                "endTime": "2024-03-02T00:00:00Z",
            }),
        )
        .await;

        match response.await.unwrap() {
            MethodResponse::Success { value } => {
                assert_eq!(value[0]["dataType"], "STEPS");
                assert_eq!(value[0]["value"], 4200.0);
            }
            other => panic!("Expected records, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_data_without_source_ignores_arguments() {
        let h = harness();
        let response = call(
            &h.gateway,
            "getData",
            json!({
                "dataTypeKey": "STEPS",
                "startTime": 1709251200000i64,
                "endTime": 1709337600000i64,
            }),
        )
        .await;
        assert_eq!(response.await.unwrap(), MethodResponse::success(json!([])));

        let response = call(&h.gateway, "getData", json!({ "startTime": "yesterday" })).await;
        assert_eq!(response.await.unwrap(), MethodResponse::success(json!([])));
    }

    #[tokio::test]
    async fn test_get_data_accepts_epoch_millis() {
        let from = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();

        let mut source = MockDataSource::new();
        source
            .expect_query()
            .withf(move |query| query.start_time == Some(from) && query.end_time == Some(to))
            .times(1)
            .returning(|_| Ok(Vec::new()));

        let gateway = harness().gateway.with_data_source(Arc::new(source));
        let response = call(
            &gateway,
            "getData",
            json!({
                "dataTypeKey": "STEPS",
                "startTime": 1709251200000i64,
                "endTime": 1709337600000i64,
            }),
        )
        .await;
        assert_eq!(response.await.unwrap(), MethodResponse::success(json!([])));
    }

    #[tokio::test]
    async fn test_get_data_rejects_malformed_query() {
        let gateway = harness()
            .gateway
            .with_data_source(Arc::new(MockDataSource::new()));
        let response = call(&gateway, "getData", json!({ "startTime": "yesterday" })).await;
        assert_eq!(
            response.await.unwrap().error_code(),
            Some("INVALID_ARGUMENTS")
        );
    }

    #[tokio::test]
    async fn test_unknown_method_not_implemented() {
        let h = harness();
        let response = call(&h.gateway, "foo", Value::Null).await;
        assert_eq!(response.await.unwrap(), MethodResponse::NotImplemented);
        assert!(!h.gateway.is_pending());
    }
}
