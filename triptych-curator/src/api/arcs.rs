//! Arc endpoints
//!
//! Seeding an arc is the only manual write; every later arc is created by
//! session-end rollover.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use triptych_common::db::Arc as CurationArc;
use triptych_common::time::{now, parse_date_key};

use crate::db::arcs;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /users/:user_id/arcs request body
#[derive(Debug, Deserialize)]
pub struct StartArcRequest {
    pub theme: String,
    pub description: String,
    #[serde(default)]
    pub short_description: Option<String>,
    /// `YYYY-MM-DD`; defaults to today (UTC)
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub target_days: Option<u32>,
}

/// POST /users/:user_id/arcs
pub async fn start_arc(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<StartArcRequest>,
) -> ApiResult<(StatusCode, Json<CurationArc>)> {
    if request.theme.trim().is_empty() {
        return Err(ApiError::BadRequest("theme must not be empty".to_string()));
    }
    if request.target_days == Some(0) {
        return Err(ApiError::BadRequest(
            "target_days must be at least 1".to_string(),
        ));
    }

    let start_date = match request.start_date.as_deref() {
        Some(raw) => parse_date_key(raw)?,
        None => now().date_naive(),
    };
    let short_description = request
        .short_description
        .unwrap_or_else(|| request.theme.clone());

    let arc = state
        .orchestrator
        .start_arc(
            &user_id,
            &request.theme,
            &request.description,
            &short_description,
            start_date,
            request.target_days,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(arc)))
}

/// GET /users/:user_id/arcs/active
pub async fn get_active_arc(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<CurationArc>> {
    arcs::active_arc(&state.db, &user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No active arc for user {}", user_id)))
}

/// Build arc routes
pub fn arc_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:user_id/arcs", post(start_arc))
        .route("/users/:user_id/arcs/active", get(get_active_arc))
}
