//! Service wiring for the HTTP layer.

use std::sync::Arc;

use farmops_infra::{Clock, FarmopsConfig, InMemoryInventoryService};

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub inventory: InMemoryInventoryService,
    pub clock: Arc<dyn Clock>,
}

impl AppServices {
    pub fn new(config: &FarmopsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inventory: InMemoryInventoryService::in_memory(config, clock.clone()),
            clock,
        }
    }
}
