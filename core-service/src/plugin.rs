//! Health plugin façade.

use std::sync::Arc;

use bridge_traits::{
    AuthorizationClient, CapabilityProbe, Clock, HealthDataSource, HostSurface, MethodCall,
    MethodResponse, ResultSink, SystemClock,
};
use core_auth::{
    ActivityOutcome, AuthorizationGateway, PendingSlot, RequestCorrelator, SurfaceBinding,
};
use core_runtime::config::PluginConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver, SurfaceEvent};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::error::{CoreError, Result};

/// Entry point the host platform binds to its method channel and activity
/// lifecycle.
///
/// # Lifecycle
///
/// | host callback | plugin call |
/// |---------------|-------------|
/// | `onAttachedToActivity` | [`attach_surface`](Self::attach_surface) |
/// | `onDetachedFromActivityForConfigChanges` | [`detach_surface_for_config_changes`](Self::detach_surface_for_config_changes) |
/// | `onReattachedToActivityForConfigChanges` | [`reattach_surface`](Self::reattach_surface) |
/// | `onDetachedFromActivity` | [`detach_surface`](Self::detach_surface) |
/// | `onMethodCall` | [`on_method_call`](Self::on_method_call) |
/// | `onActivityResult` | [`on_activity_result`](Self::on_activity_result) |
pub struct HealthPlugin {
    config: PluginConfig,
    gateway: AuthorizationGateway,
    surfaces: Arc<SurfaceBinding>,
    event_bus: EventBus,
}

impl HealthPlugin {
    pub fn builder() -> HealthPluginBuilder {
        HealthPluginBuilder::default()
    }

    /// Method channel name the host should register.
    pub fn channel_name(&self) -> &str {
        &self.config.channel_name
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn is_authorization_pending(&self) -> bool {
        self.gateway.is_pending()
    }

    pub fn attach_surface(&self, surface: &Arc<dyn HostSurface>) {
        info!(surface_id = surface.surface_id(), "Surface attached");
        self.surfaces.attach(surface);
        self.emit(SurfaceEvent::Attached {
            surface_id: surface.surface_id().to_string(),
        });
    }

    /// Transient detach (rotation, theme change). A pending authorization
    /// survives and can still be answered after [`reattach_surface`](Self::reattach_surface).
    pub fn detach_surface_for_config_changes(&self) {
        let surface_id = self.surfaces.detach();
        debug!(surface_id = ?surface_id, "Surface detached for configuration change");
        self.emit(SurfaceEvent::Detached {
            surface_id,
            config_change: true,
        });
    }

    pub fn reattach_surface(&self, surface: &Arc<dyn HostSurface>) {
        self.attach_surface(surface);
    }

    /// Final detach. Any pending authorization is dropped unanswered.
    pub fn detach_surface(&self) {
        let surface_id = self.surfaces.detach();
        info!(surface_id = ?surface_id, "Surface detached");
        self.gateway.abandon_pending();
        self.emit(SurfaceEvent::Detached {
            surface_id,
            config_change: false,
        });
    }

    /// Host transport entry point. `result` is answered exactly once, or never
    /// if a pending authorization is abandoned.
    pub async fn on_method_call(&self, call: MethodCall, result: Box<dyn ResultSink>) {
        self.gateway.dispatch(call, result).await;
    }

    /// Dispatches `call` and waits for its response.
    ///
    /// For `requestAuthorization` this waits until the handshake outcome is
    /// delivered from another task through [`on_activity_result`](Self::on_activity_result).
    pub async fn invoke(&self, call: MethodCall) -> Result<MethodResponse> {
        let method = call.method.clone();
        let (tx, rx) = oneshot::channel();
        self.gateway.dispatch(call, Box::new(tx)).await;
        rx.await.map_err(|_| CoreError::Abandoned { method })
    }

    /// Host activity-result callback.
    ///
    /// Returns `true` when `request_code` belongs to this plugin, even if
    /// nothing was pending, so the host stops offering the result to other
    /// listeners.
    pub fn on_activity_result(&self, request_code: i32, result_code: i32) -> bool {
        if request_code != self.gateway.request_tag().value() {
            return false;
        }
        self.gateway
            .deliver_outcome(ActivityOutcome::new(request_code, result_code));
        true
    }

    /// Forwards results from a desktop [`LoopbackAuthorizer`](bridge_desktop::LoopbackAuthorizer)
    /// into [`on_activity_result`](Self::on_activity_result).
    #[cfg(feature = "desktop-shims")]
    pub fn forward_activity_results(
        self: &Arc<Self>,
        mut results: tokio::sync::mpsc::UnboundedReceiver<bridge_desktop::ActivityResult>,
    ) -> tokio::task::JoinHandle<()> {
        let plugin = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(result) = results.recv().await {
                if !plugin.on_activity_result(result.request_code, result.result_code) {
                    debug!(
                        request_code = result.request_code,
                        "Activity result not addressed to this plugin"
                    );
                }
            }
        })
    }

    fn emit(&self, event: SurfaceEvent) {
        let _ = self.event_bus.emit(CoreEvent::Surface(event));
    }
}

/// Builder for [`HealthPlugin`].
///
/// Only the [`AuthorizationClient`] is mandatory; with the `desktop-shims`
/// feature a loopback client is used when none is given.
#[derive(Default)]
pub struct HealthPluginBuilder {
    config: Option<PluginConfig>,
    authorizer: Option<Arc<dyn AuthorizationClient>>,
    probe: Option<Arc<dyn CapabilityProbe>>,
    data_source: Option<Arc<dyn HealthDataSource>>,
    pending_slot: Option<Arc<dyn PendingSlot>>,
    event_bus: Option<EventBus>,
    clock: Option<Arc<dyn Clock>>,
}

impl HealthPluginBuilder {
    pub fn config(mut self, config: PluginConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn authorizer(mut self, authorizer: Arc<dyn AuthorizationClient>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    pub fn capability_probe(mut self, probe: Arc<dyn CapabilityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn data_source(mut self, data_source: Arc<dyn HealthDataSource>) -> Self {
        self.data_source = Some(data_source);
        self
    }

    /// Overrides the default [`RequestCorrelator`]. The configured pending
    /// policy and clock are then up to the given slot.
    pub fn pending_slot(mut self, slot: Arc<dyn PendingSlot>) -> Self {
        self.pending_slot = Some(slot);
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<HealthPlugin> {
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => PluginConfig::default(),
        };

        let authorizer = match self.authorizer {
            Some(authorizer) => authorizer,
            None => default_authorizer()?,
        };

        let event_bus = self
            .event_bus
            .unwrap_or_else(|| EventBus::new(config.event_buffer_size));
        let slot: Arc<dyn PendingSlot> = match self.pending_slot {
            Some(slot) => slot,
            None => {
                let clock = match self.clock {
                    Some(clock) => clock,
                    None => Arc::new(SystemClock) as Arc<dyn Clock>,
                };
                Arc::new(RequestCorrelator::with_clock(config.pending_policy, clock))
            }
        };
        let surfaces = Arc::new(SurfaceBinding::new());

        let mut gateway = AuthorizationGateway::new(
            slot,
            surfaces.clone(),
            authorizer,
            event_bus.clone(),
            &config,
        );
        if let Some(probe) = self.probe {
            gateway = gateway.with_probe(probe);
        }
        if let Some(data_source) = self.data_source {
            gateway = gateway.with_data_source(data_source);
        }

        info!(
            channel = %config.channel_name,
            request_code = config.request_code,
            policy = ?config.pending_policy,
            timeout_secs = config.authorization_timeout.map(|t| t.as_secs()),
            "Health plugin initialized"
        );

        Ok(HealthPlugin {
            config,
            gateway,
            surfaces,
            event_bus,
        })
    }
}

#[cfg(feature = "desktop-shims")]
fn default_authorizer() -> Result<Arc<dyn AuthorizationClient>> {
    tracing::warn!("No authorization client provided, using desktop loopback authorizer");
    Ok(Arc::new(bridge_desktop::LoopbackAuthorizer::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn default_authorizer() -> Result<Arc<dyn AuthorizationClient>> {
    Err(CoreError::CapabilityMissing {
        capability: "AuthorizationClient".to_string(),
        message: "No authorization client provided and desktop shims are disabled. \
                  Inject the platform SDK adapter with HealthPluginBuilder::authorizer()."
            .to_string(),
    })
}
