//! Application state for the API server

use crate::{BatchService, Config};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clones).
#[derive(Clone)]
pub struct AppState {
    /// Batch service running every bulk operation
    pub service: Arc<BatchService>,

    /// Configuration the service was built with
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Arc<BatchService>) -> Self {
        let config = Arc::clone(service.config());
        Self { service, config }
    }
}
