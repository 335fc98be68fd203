mod error;
mod routes;
mod types;

pub use error::ApiError;
pub use routes::create_router;
pub use types::{ErrorResponse, HealthResponse, SelfTestResponse};

use std::sync::Arc;

use crate::generation::GenerationService;

/// Shared application state, built once at startup.
pub struct AppState {
    pub generator: Arc<dyn GenerationService>,
    pub device: String,
}

impl AppState {
    pub fn new(generator: Arc<dyn GenerationService>, device: impl Into<String>) -> Self {
        Self {
            generator,
            device: device.into(),
        }
    }
}
