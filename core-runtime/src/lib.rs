//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the health bridge:
//! - Plugin configuration with fail-fast validation
//! - Logging and tracing infrastructure
//! - Event bus for authorization and surface lifecycle events
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its configuration types, its
//! logging conventions and the broadcast channel hosts use to observe what the
//! plugin is doing without polling it.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{PendingPolicy, PluginConfig, PluginConfigBuilder};
pub use error::{Error, Result};
pub use events::{AuthorizationEvent, CoreEvent, EventBus, EventStream, SurfaceEvent};
