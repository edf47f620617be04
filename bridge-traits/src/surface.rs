//! Foreground Surface Abstraction
//!
//! A host surface is whatever the platform needs in order to present vendor UI:
//! an `Activity` on Android, a `UIViewController` on iOS, a window on desktop.
//! The core never owns a surface. It only borrows the current one, on demand,
//! and must cope with there being none.

use std::sync::Arc;

/// The active host surface able to anchor platform UI.
///
/// # Platform Support
///
/// - **Android**: the `Activity` the plugin is bound to
/// - **iOS**: the key window's root view controller
/// - **Desktop**: the application's main window
pub trait HostSurface: Send + Sync {
    /// Stable identifier used in logs and lifecycle events.
    fn surface_id(&self) -> &str;

    /// Whether the surface is on its way out (e.g. `Activity.isFinishing`).
    ///
    /// A finishing surface is treated as absent.
    fn is_finishing(&self) -> bool {
        false
    }
}

/// Source of the current foreground surface.
pub trait SurfaceProvider: Send + Sync {
    /// Returns the current surface, or `None` if none is attached or the
    /// attached one is already gone.
    fn current_surface(&self) -> Option<Arc<dyn HostSurface>>;

    fn has_surface(&self) -> bool {
        self.current_surface().is_some()
    }
}
