//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service` and, through it, `bridge-desktop`).
//! Host applications can depend on `health-bridge-workspace` and pick either
//! the `desktop-shims` feature (in-process adapters for development hosts) or
//! `host-only` (every bridge injected by the embedding platform).

#[cfg(any(feature = "desktop-shims", feature = "host-only"))]
pub use core_service::{CoreError, HealthPlugin, HealthPluginBuilder};
