//! Desktop window surface

use bridge_traits::HostSurface;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

/// A desktop window acting as the foreground surface.
#[derive(Debug)]
pub struct DesktopSurface {
    id: String,
    title: String,
    finishing: AtomicBool,
}

impl DesktopSurface {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: format!("desktop-{}", Uuid::new_v4()),
            title: title.into(),
            finishing: AtomicBool::new(false),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Marks the window as closing; it stops being usable as a surface.
    pub fn close(&self) {
        debug!(surface_id = %self.id, "Closing desktop surface");
        self.finishing.store(true, Ordering::SeqCst);
    }
}

impl HostSurface for DesktopSurface {
    fn surface_id(&self) -> &str {
        &self.id
    }

    fn is_finishing(&self) -> bool {
        self.finishing.load(Ordering::SeqCst)
    }
}
