//! CORS layer configuration.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method, header};
use tower_http::cors::{Any, CorsLayer};

use boxoffice_core::config::CorsConfig;

use crate::error::{X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};

/// Builds a CORS tower layer from configuration.
///
/// The rate-limit headers are exposed so browser clients can back off.
pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new();

    if config.allowed_origins.iter().any(|o| o == "*") {
        layer = layer.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer = layer.allow_origin(origins);
    }

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let exposed: [HeaderName; 3] = [X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, header::RETRY_AFTER];

    layer
        .allow_methods(methods)
        .allow_headers(Any)
        .expose_headers(exposed)
        .max_age(Duration::from_secs(config.max_age_seconds))
}
