//! audiowise-cs library interface
//!
//! Exposes the router, state and startup helpers for integration testing.

pub mod api;
pub mod error;

pub use crate::error::{ApiError, ApiResult};

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use audiowise_common::config::Config;
use audiowise_common::manifest;
use audiowise_common::{InferenceContext, LabelCatalog, Result};

/// Upload payloads above this size are refused outright.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Pipeline, label catalog and model, wired once at startup
    pub inference: Arc<InferenceContext>,
    /// Directory upload temp files are staged in
    pub upload_dir: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last classification error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(inference: Arc<InferenceContext>, upload_dir: PathBuf) -> Self {
        Self {
            inference,
            upload_dir,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::classify_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the label catalog the way the deployment is configured: load the
/// persisted catalog when one is named, otherwise derive it from the
/// training manifest. Both binaries go through this, so the CLI and the
/// server can never disagree about label order.
pub fn load_catalog(config: &Config) -> Result<LabelCatalog> {
    if let Some(labels_path) = &config.model.labels {
        info!(path = %labels_path.display(), "Loading label catalog");
        return LabelCatalog::load(labels_path);
    }
    info!(path = %config.model.manifest.display(), "Deriving label catalog from manifest");
    let records = manifest::read_manifest(&config.model.manifest)?;
    LabelCatalog::from_manifest_classes(records.into_iter().map(|r| r.class_name))
}
