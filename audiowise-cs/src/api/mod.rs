//! HTTP API endpoints

mod health;
mod upload;

pub use health::{health_routes, HealthResponse};
pub use upload::{classify_routes, ClassificationResponse};
