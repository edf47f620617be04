//! # Authorization Core
//!
//! Single in-flight authorization flow for the health bridge.
//!
//! ## Overview
//!
//! The platform consent handshake is asynchronous and runs outside the core:
//! the gateway launches the vendor UI, parks the caller's continuation in the
//! [`RequestCorrelator`], and resumes it when the host reports the result.
//!
//! ## Features
//!
//! - Exactly one pending authorization at a time, with an explicit policy for
//!   a second request (reject, or evict and answer the previous caller)
//! - Optional timeout so a handshake that never reports back still answers
//! - Foreground-surface guard on every UI-dependent command
//! - Pluggable capability probe and data source
//! - Authorization lifecycle events on the core event bus

pub mod correlator;
pub mod error;
pub mod gateway;
pub mod surface;
pub mod types;

pub use correlator::{
    AlreadyPending, Continuation, Outcome, PendingInfo, PendingSlot, Registered,
    RequestCorrelator,
};
pub use error::{GatewayError, Result, AUTHORIZATION_FAILED_MESSAGE};
pub use gateway::AuthorizationGateway;
pub use surface::SurfaceBinding;
pub use types::{ActivityOutcome, ActivityStatus, Command, PendingTicket, RequestTag};
