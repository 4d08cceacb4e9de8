//! Daily bundle endpoints

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use triptych_common::time::parse_date_key;

use crate::db::bundles;
use crate::error::{ApiError, ApiResult, CurationError};
use crate::models::DailyBundle;
use crate::services::DeliveryOutcome;
use crate::AppState;

/// POST /users/:user_id/bundles/:date
///
/// Generates the day's bundle, or returns it unchanged if it exists.
pub async fn generate_bundle(
    State(state): State<AppState>,
    Path((user_id, date)): Path<(String, String)>,
) -> ApiResult<Json<DailyBundle>> {
    let date = parse_date_key(&date)?;

    match state.orchestrator.generate_daily_bundle(&user_id, date).await {
        Ok(bundle) => {
            *state.last_error.write().await = None;
            Ok(Json(bundle))
        }
        Err(e) => {
            // Caller mistakes such as a missing arc do not degrade health
            if matches!(e, CurationError::Generation(_) | CurationError::Store(_)) {
                tracing::error!(user_id = %user_id, date = %date, error = %e, "Curation run failed");
                *state.last_error.write().await = Some(e.to_string());
            } else {
                tracing::warn!(user_id = %user_id, date = %date, error = %e, "Curation run rejected");
            }
            Err(e.into())
        }
    }
}

/// GET /users/:user_id/bundles/:date
pub async fn get_bundle(
    State(state): State<AppState>,
    Path((user_id, date)): Path<(String, String)>,
) -> ApiResult<Json<DailyBundle>> {
    let date = parse_date_key(&date)?;

    bundles::load_bundle(&state.db, &user_id, date)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No bundle for {} on {}", user_id, date)))
}

/// POST /users/:user_id/bundles/:date/deliver
///
/// First genuine interaction with the day's bundle.
pub async fn deliver_bundle(
    State(state): State<AppState>,
    Path((user_id, date)): Path<(String, String)>,
) -> ApiResult<Json<DeliveryOutcome>> {
    let date = parse_date_key(&date)?;
    let outcome = state.orchestrator.deliver_bundle(&user_id, date).await?;
    Ok(Json(outcome))
}

/// Build bundle routes
pub fn bundle_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/:user_id/bundles/:date",
            post(generate_bundle).get(get_bundle),
        )
        .route("/users/:user_id/bundles/:date/deliver", post(deliver_bundle))
}
