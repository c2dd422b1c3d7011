//! Health check handlers.

use axum::Json;
use axum::extract::State;

use boxoffice_core::traits::CoordinationStore;

use crate::dto::response::{DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// GET /api/health/detailed
pub async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let store_ok = state.store.health_check().await.unwrap_or(false);

    let (database, database_ok) = match &state.database {
        Some(pool) => match pool.health_check().await {
            Ok(true) => ("connected", true),
            _ => ("unreachable", false),
        },
        None => ("not_configured", true),
    };

    let status = if store_ok && database_ok { "ok" } else { "degraded" };

    Json(DetailedHealthResponse {
        status: status.to_string(),
        store: if store_ok { "connected" } else { "unreachable" }.to_string(),
        database: database.to_string(),
        cache_sync_failures: state.cache_sync.failed_total(),
        last_cache_sync_failure: state.sync_failures.last().await.map(Into::into),
        admission: state.coordinator.metrics().snapshot(),
    })
}
