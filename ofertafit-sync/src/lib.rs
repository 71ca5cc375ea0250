//! ofertafit-sync library interface
//!
//! The price-synchronization and catalog-admission engine behind the
//! ofertafit storefront. Exposes the application state and router so
//! integration tests can drive the service in-process.

pub mod api;
pub mod db;
pub mod error;
pub mod ingest;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use ofertafit_common::config::AppConfig;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::ingest::IngestPipeline;
use crate::services::sync_orchestrator::SyncOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// The price-sync job
    pub orchestrator: Arc<SyncOrchestrator>,
    /// The catalog-admission job
    pub pipeline: Arc<IngestPipeline>,
    /// Resolved configuration, validated once at startup
    pub config: Arc<AppConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        orchestrator: Arc<SyncOrchestrator>,
        pipeline: Arc<IngestPipeline>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            orchestrator,
            pipeline,
            config,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::sync_routes())
        .merge(api::ingest_routes())
        .with_state(state)
}
