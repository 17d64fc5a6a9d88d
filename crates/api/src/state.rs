use std::sync::Arc;

use colorbook_pipeline::{BatchCoordinator, JobRegistry};
use colorbook_providers::Translator;

use crate::config::ServerConfig;
use crate::storage::AssetStore;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: colorbook_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Polling registry for every AI job.
    pub jobs: Arc<JobRegistry>,
    pub batches: Arc<BatchCoordinator>,
    pub assets: Arc<dyn AssetStore>,
    pub translator: Arc<dyn Translator>,
    /// Client for fetching provider-hosted images.
    pub http: reqwest::Client,
}
