use std::sync::Arc;

use courier_core::CourierConfig;
use courier_jobs::JobHost;

/// The opaque handle through which startup units reach platform services.
///
/// Cheaply cloneable; a single context is built by the composition root and
/// shared across every initializer.
#[derive(Clone)]
pub struct AppContext {
    pub config: CourierConfig,
    pub jobs: Arc<dyn JobHost>,
}

impl AppContext {
    pub fn new(config: CourierConfig, jobs: Arc<dyn JobHost>) -> Self {
        Self { config, jobs }
    }
}
