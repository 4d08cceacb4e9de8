//! triptych-curator library interface
//!
//! Exposes the curation pipeline and HTTP router for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod types;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, CurationError};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::services::CurationOrchestrator;
use crate::types::ReadingResolver;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub orchestrator: Arc<CurationOrchestrator>,
    pub reading_resolver: Arc<dyn ReadingResolver>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        orchestrator: Arc<CurationOrchestrator>,
        reading_resolver: Arc<dyn ReadingResolver>,
    ) -> Self {
        Self {
            db,
            orchestrator,
            reading_resolver,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::arc_routes())
        .merge(api::bundle_routes())
        .merge(api::session_routes())
        .merge(api::reading_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
