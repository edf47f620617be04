//! Health plugin façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (foreground surface,
//! vendor authorization SDK, capability probe, data source) into the
//! authorization core and exposes the two entry points a host binds: the
//! method-call handler and the activity-result callback. Desktop hosts and
//! tests typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) so a loopback authorizer is available when no SDK is
//! injected.
//!
//! ```no_run
//! use bridge_desktop::{DesktopSurface, LoopbackAuthorizer};
//! use bridge_traits::{HostSurface, MethodCall};
//! use core_service::HealthPlugin;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> core_service::Result<()> {
//! let (authorizer, results) = LoopbackAuthorizer::with_auto_reply(-1);
//! let plugin = Arc::new(HealthPlugin::builder().authorizer(Arc::new(authorizer)).build()?);
//! plugin.forward_activity_results(results);
//!
//! let window: Arc<dyn HostSurface> = Arc::new(DesktopSurface::new("Main"));
//! plugin.attach_surface(&window);
//!
//! let granted = plugin
//!     .invoke(MethodCall::new(
//!         "requestAuthorization",
//!         json!({ "types": ["STEPS"], "permissions": [0] }),
//!     ))
//!     .await?;
//! assert!(granted.is_success());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod plugin;

pub use error::{CoreError, Result};
pub use plugin::{HealthPlugin, HealthPluginBuilder};
