//! Fixed-window rate limiting for metered API routes.
//!
//! The purchase route is metered by the admission coordinator itself and
//! is mounted outside this layer.

use axum::extract::{OriginalUri, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use boxoffice_admission::{RateDecision, Rejection};

use crate::error::{ApiError, apply_rate_headers};
use crate::extractors::{AuthenticatedUser, MaybeUser};
use crate::extractors::client::client_addr;
use crate::state::AppState;

/// Meter the request against the identity's window for its path.
///
/// Denied requests get a 429 with `Retry-After`; allowed ones carry the
/// remaining budget in their response headers.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let addr = client_addr(request.headers(), request.extensions());
    let user = MaybeUser(request.extensions().get::<AuthenticatedUser>().cloned());
    let identity = user.rate_identity(&addr);
    // Nested routers strip their prefix from `uri()`; windows are keyed
    // on the full path.
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().path(), |OriginalUri(uri)| uri.path())
        .to_string();

    let limiter = state.coordinator.limiter();
    let decision = limiter.check(&identity, &path).await;

    if let RateDecision::Denied { limit, retry_after } = decision {
        let rejection = Rejection::RateLimitExceeded { limit, retry_after };
        state.coordinator.metrics().record_rejection(&rejection);
        return ApiError::from(rejection).into_response();
    }

    let mut response = next.run(request).await;
    apply_rate_headers(response.headers_mut(), &decision);
    response
}
