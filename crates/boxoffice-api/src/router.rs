//! Route definitions for the BoxOffice HTTP API.
//!
//! Versioned routes live under `/api/v1`; health checks under `/api/health`.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let metered = Router::new()
        .merge(ticket_routes())
        .merge(admin_routes())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ));

    // The coordinator meters purchases with the strict profile.
    let v1 = metered.merge(purchase_routes());

    let cors = middleware::cors::build_cors_layer(&state.config.server.cors);

    Router::new()
        .nest("/api/v1", v1)
        .merge(health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Availability, fingerprint and reservation endpoints.
fn ticket_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/tickets/check-availability/{ticket_type_id}",
            get(handlers::tickets::check_availability),
        )
        .route(
            "/tickets/check-fingerprint/{ticket_type_id}",
            get(handlers::tickets::check_fingerprint),
        )
        .route(
            "/tickets/reservations/confirm",
            post(handlers::tickets::confirm_reservation),
        )
        .route(
            "/tickets/reservations/rollback",
            post(handlers::tickets::rollback_reservation),
        )
}

fn purchase_routes() -> Router<AppState> {
    Router::new().route("/tickets/purchase", post(handlers::tickets::purchase))
}

fn admin_routes() -> Router<AppState> {
    Router::new().route(
        "/admin/rate-limits/reset",
        post(handlers::admin::reset_rate_limit),
    )
}

fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/health/detailed", get(handlers::health::health_detailed))
}
