//! Maps `AppError` and admission rejections to HTTP responses.

use std::time::Duration;

use axum::Json;
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use boxoffice_admission::{RateDecision, Rejection};
use boxoffice_core::error::{AppError, ErrorKind};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Standard API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

/// Error type returned by every handler.
#[derive(Debug)]
pub enum ApiError {
    /// Infrastructure or input failure.
    App(AppError),
    /// An admission gate turned the request away.
    Rejected(Rejection),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

/// Whole seconds until retry, rounded up, never below one.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

/// Write the rate-limit headers for `decision`. Unmetered decisions
/// leave the headers untouched.
pub fn apply_rate_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    match *decision {
        RateDecision::Allowed { limit, remaining } => {
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
        }
        RateDecision::Denied { limit, retry_after } => {
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(0u64));
            headers.insert(RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
        }
        RateDecision::Unmetered => {}
    }
}

fn rejection_status(rejection: &Rejection) -> StatusCode {
    match rejection {
        Rejection::NotFound => StatusCode::NOT_FOUND,
        Rejection::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        Rejection::OutOfStock
        | Rejection::SaleNotStarted
        | Rejection::SaleEnded
        | Rejection::DuplicateClaim
        | Rejection::UnknownReservation => StatusCode::CONFLICT,
    }
}

fn app_error_status(err: &AppError) -> (StatusCode, &'static str) {
    match err.kind {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
        ErrorKind::StoreUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
        ErrorKind::ServiceUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        ErrorKind::Internal
        | ErrorKind::Database
        | ErrorKind::Cache
        | ErrorKind::Configuration
        | ErrorKind::Serialization => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::App(err) => {
                let (status, code) = app_error_status(&err);
                if status.is_server_error() {
                    tracing::error!(kind = %err.kind, error = %err.message, "Request failed");
                }
                // Internal details stay in the log.
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    "Internal server error".to_string()
                } else {
                    err.message
                };
                let body = ApiErrorResponse {
                    error: code.to_string(),
                    message,
                };
                (status, Json(body)).into_response()
            }
            Self::Rejected(rejection) => {
                let body = ApiErrorResponse {
                    error: rejection.code().to_string(),
                    message: rejection.to_string(),
                };
                let mut response = (rejection_status(&rejection), Json(body)).into_response();
                if let Rejection::RateLimitExceeded { limit, retry_after } = rejection {
                    apply_rate_headers(
                        response.headers_mut(),
                        &RateDecision::Denied { limit, retry_after },
                    );
                }
                response
            }
        }
    }
}
