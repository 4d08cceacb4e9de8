//! Session hooks called by the conversational layer

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use triptych_common::time::{now, parse_date_key};

use crate::db::insights;
use crate::error::{ApiError, ApiResult};
use crate::services::SessionEndOutcome;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SessionEndRequest {
    /// `YYYY-MM-DD`; defaults to today (UTC)
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InsightRequest {
    pub content: String,
}

/// POST /users/:user_id/session-end
pub async fn session_end(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Option<Json<SessionEndRequest>>,
) -> ApiResult<Json<SessionEndOutcome>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let today = match request.date.as_deref() {
        Some(raw) => parse_date_key(raw)?,
        None => now().date_naive(),
    };

    let outcome = state.orchestrator.end_session(&user_id, today).await?;
    Ok(Json(outcome))
}

/// POST /users/:user_id/insights
pub async fn record_insight(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<InsightRequest>,
) -> ApiResult<StatusCode> {
    if request.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content must not be empty".to_string()));
    }

    insights::record_insight(&state.db, &user_id, &request.content).await?;
    Ok(StatusCode::CREATED)
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:user_id/session-end", post(session_end))
        .route("/users/:user_id/insights", post(record_insight))
}
