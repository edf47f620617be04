//! Weak binding to the current foreground surface.

use bridge_traits::{HostSurface, SurfaceProvider};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Holds a non-owning reference to the surface the plugin is attached to.
///
/// The host keeps the surface alive; once it is dropped (or reports that it
/// is finishing) the binding answers `None` even without an explicit detach.
#[derive(Default)]
pub struct SurfaceBinding {
    current: RwLock<Option<Weak<dyn HostSurface>>>,
}

impl SurfaceBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `surface`, replacing any previous binding.
    pub fn attach(&self, surface: &Arc<dyn HostSurface>) {
        debug!(surface_id = surface.surface_id(), "Binding surface");
        *self.current.write() = Some(Arc::downgrade(surface));
    }

    /// Drops the binding and returns the id of the surface if it was still alive.
    pub fn detach(&self) -> Option<String> {
        self.current
            .write()
            .take()
            .and_then(|weak| weak.upgrade())
            .map(|surface| surface.surface_id().to_string())
    }

    pub fn is_bound(&self) -> bool {
        self.current.read().is_some()
    }
}

impl SurfaceProvider for SurfaceBinding {
    fn current_surface(&self) -> Option<Arc<dyn HostSurface>> {
        let surface = self.current.read().as_ref()?.upgrade()?;
        if surface.is_finishing() {
            debug!(surface_id = surface.surface_id(), "Surface is finishing");
            return None;
        }
        Some(surface)
    }
}

impl std::fmt::Debug for SurfaceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceBinding")
            .field("bound", &self.is_bound())
            .field("alive", &self.has_surface())
            .finish()
    }
}
