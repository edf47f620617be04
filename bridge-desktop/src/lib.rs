//! # Desktop Bridge Implementations
//!
//! In-process implementations of the bridge traits for desktop hosts and
//! tests (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! There is no vendor health SDK on desktop, so these adapters stand in for
//! it:
//! - `DesktopSurface` - a window handle acting as the foreground surface
//! - `LoopbackAuthorizer` - records handshake launches and can answer them
//!   with a fixed result code through a channel, like an activity result
//! - `StaticCapabilityProbe` - fixed availability answer
//! - `InMemoryHealthStore` - record store filtered by type and time range
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopSurface, LoopbackAuthorizer};
//!
//! let surface = DesktopSurface::new("Main window");
//! let (authorizer, mut results) = LoopbackAuthorizer::with_auto_reply(-1);
//!
//! // Hand both to the plugin, then forward `results` into
//! // `HealthPlugin::on_activity_result`.
//! ```

mod authorizer;
mod probe;
mod store;
mod surface;

pub use authorizer::{ActivityResult, LaunchRecord, LoopbackAuthorizer};
pub use probe::StaticCapabilityProbe;
pub use store::InMemoryHealthStore;
pub use surface::DesktopSurface;
