//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the health bridge core and the
//! platform layer that embeds it. Each trait is a capability the core needs but
//! that only the host can provide: a foreground surface to anchor vendor UI, the
//! vendor authorization SDK, a data store, a logging pipeline.
//!
//! ## Traits
//!
//! ### Method channel
//! - [`MethodCall`](channel::MethodCall) / [`MethodResponse`](channel::MethodResponse) - decoded call and its reply
//! - [`ResultSink`](channel::ResultSink) - one-shot continuation answering a call
//!
//! ### Platform Integration
//! - [`HostSurface`](surface::HostSurface) - the active Activity / view controller / window
//! - [`SurfaceProvider`](surface::SurfaceProvider) - on-demand lookup of the current surface
//!
//! ### Vendor SDK
//! - [`AuthorizationClient`](health::AuthorizationClient) - permission check and consent handshake launch
//! - [`CapabilityProbe`](health::CapabilityProbe) - is the health service installed
//! - [`HealthDataSource`](health::HealthDataSource) - record queries
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Loopback shims |
//! | Android  | host app (Google Fit) | 📋 Planned |
//! | iOS      | host app (HealthKit)  | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert SDK exceptions into it with an actionable
//! message rather than panicking across the FFI boundary.
//!
//! ## Thread Safety
//!
//! Bridge traits require `Send + Sync` so a single adapter instance can be
//! shared between the method-call handler and the activity-result callback.

pub mod channel;
pub mod error;
pub mod health;
pub mod surface;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use channel::{CallbackSink, MethodCall, MethodResponse, ResultSink};
pub use health::{
    AccessRequest, AuthorizationClient, CapabilityProbe, DataQuery, HealthAccess,
    HealthDataSource, HealthRecord,
};
pub use surface::{HostSurface, SurfaceProvider};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
