//! Administrative handlers.

use axum::Json;
use axum::extract::State;
use tracing::info;
use validator::Validate;

use boxoffice_core::error::AppError;

use crate::dto::request::ResetRateLimitRequest;
use crate::dto::response::ResetResponse;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/v1/admin/rate-limits/reset
///
/// Clears the current window of one identity on one route.
pub async fn reset_rate_limit(
    State(state): State<AppState>,
    Json(body): Json<ResetRateLimitRequest>,
) -> Result<Json<ResetResponse>, ApiError> {
    body.validate()
        .map_err(|e| AppError::validation(format!("Invalid reset request: {e}")))?;
    let identity = body.rate_identity()?;

    let reset = state.coordinator.limiter().reset(&identity, &body.route).await?;
    info!(identity = %identity, route = %body.route, reset, "Rate limit window cleared");

    Ok(Json(ResetResponse {
        identity: identity.to_string(),
        route: body.route,
        reset,
    }))
}
