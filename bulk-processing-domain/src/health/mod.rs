//! Domain layer health check functionality
//! Liveness follows the batch store; readiness only says the process is serving.

use std::sync::Arc;

use bulk_processing_data::BatchStore;
use tracing::error;

/// Health checks backed by the batch store
#[derive(Clone)]
pub struct HealthService {
    store: Arc<dyn BatchStore>,
}

impl HealthService {
    pub fn new(store: Arc<dyn BatchStore>) -> Self {
        Self { store }
    }

    /// Whether the batch store answers a ping
    pub async fn liveness(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Liveness check failed");
                false
            }
        }
    }

    /// The process is ready as soon as it serves requests
    pub fn readiness(&self) -> bool {
        true
    }
}

impl std::fmt::Debug for HealthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthService").finish_non_exhaustive()
    }
}
