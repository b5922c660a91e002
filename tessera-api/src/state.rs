//! Shared gateway state.

use std::time::Instant;
use tessera_storage::InstanceRegistry;

/// State handed to every gateway handler.
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub registry: InstanceRegistry,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(registry: InstanceRegistry) -> Self {
        Self {
            registry,
            started_at: Instant::now(),
        }
    }
}
