//! Reading link lookup

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReadingLinkQuery {
    pub title: String,
    /// Search query; the title is used when absent
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadingLinkResponse {
    pub title: String,
    pub url: Option<String>,
}

/// GET /reading-link?title=&query=
pub async fn reading_link(
    State(state): State<AppState>,
    Query(params): Query<ReadingLinkQuery>,
) -> ApiResult<Json<ReadingLinkResponse>> {
    if params.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let query = params.query.as_deref().unwrap_or("");
    let url = state.reading_resolver.resolve(&params.title, query).await?;

    Ok(Json(ReadingLinkResponse {
        title: params.title,
        url,
    }))
}

/// Build reading routes
pub fn reading_routes() -> Router<AppState> {
    Router::new().route("/reading-link", get(reading_link))
}
