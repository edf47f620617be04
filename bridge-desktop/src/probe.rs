//! Fixed capability answer

use async_trait::async_trait;
use bridge_traits::{error::Result, CapabilityProbe};

/// Capability probe with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticCapabilityProbe {
    available: bool,
}

impl StaticCapabilityProbe {
    pub fn new(available: bool) -> Self {
        Self { available }
    }

    pub fn available() -> Self {
        Self::new(true)
    }

    pub fn unavailable() -> Self {
        Self::new(false)
    }
}

impl Default for StaticCapabilityProbe {
    fn default() -> Self {
        Self::available()
    }
}

#[async_trait]
impl CapabilityProbe for StaticCapabilityProbe {
    async fn is_available(&self) -> Result<bool> {
        Ok(self.available)
    }
}
