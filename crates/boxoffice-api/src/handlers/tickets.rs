//! Ticket admission handlers.

use axum::Json;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use validator::Validate;

use boxoffice_admission::{AdmissionRequest, ReservationToken};
use boxoffice_core::error::AppError;

use crate::dto::request::{AvailabilityQuery, PurchaseRequest, parse_ticket_type_id};
use crate::dto::response::{
    AvailabilityResponse, ClaimInfo, FingerprintResponse, PurchaseResponse,
    ReservationStateResponse,
};
use crate::error::{ApiError, apply_rate_headers};
use crate::extractors::{ClientAddr, ClientSignals, MaybeUser};
use crate::state::AppState;

/// GET /api/v1/tickets/check-availability/{ticket_type_id}?quantity=N
pub async fn check_availability(
    State(state): State<AppState>,
    Path(ticket_type_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let ticket_type_id = parse_ticket_type_id(&ticket_type_id)?;
    let quantity = query.quantity()?;

    state
        .coordinator
        .ledger()
        .check_availability(ticket_type_id, quantity)
        .await??;

    Ok(Json(AvailabilityResponse {
        ticket_type_id,
        available: true,
        quantity,
    }))
}

/// GET /api/v1/tickets/check-fingerprint/{ticket_type_id}
pub async fn check_fingerprint(
    State(state): State<AppState>,
    Path(ticket_type_id): Path<String>,
    ClientSignals(signals): ClientSignals,
) -> Result<Json<FingerprintResponse>, ApiError> {
    let ticket_type_id = parse_ticket_type_id(&ticket_type_id)?;
    let fingerprint = signals.fingerprint();
    let guard = state.coordinator.guard();

    let already_purchased = guard.check(&fingerprint, ticket_type_id).await?;
    let claim = if already_purchased {
        guard
            .inspect(&fingerprint, ticket_type_id)
            .await?
            .map(|(record, ttl)| ClaimInfo::new(record, ttl))
    } else {
        None
    };

    Ok(Json(FingerprintResponse {
        already_purchased,
        claim,
    }))
}

/// POST /api/v1/tickets/purchase
///
/// Rate limiting for this route happens inside the coordinator, so the
/// response carries the coordinator's rate-limit headers.
pub async fn purchase(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    ClientAddr(client_addr): ClientAddr,
    ClientSignals(signals): ClientSignals,
    user: MaybeUser,
    Json(body): Json<PurchaseRequest>,
) -> Result<Response, ApiError> {
    body.validate()
        .map_err(|e| AppError::validation(format!("Invalid purchase request: {e}")))?;

    let request = AdmissionRequest {
        identity: user.rate_identity(&client_addr),
        route: uri.path().to_string(),
        fingerprint: signals.fingerprint(),
        ticket_type_id: body.ticket_type_id,
        quantity: body.quantity,
        claimant: user.claimant(),
    };

    let admission = state.coordinator.admit(&request).await?;
    let state_reached = admission.state();

    let mut response = match admission.verdict {
        Ok(reservation) => (
            StatusCode::CREATED,
            Json(PurchaseResponse {
                state: state_reached,
                reservation,
            }),
        )
            .into_response(),
        Err(rejection) => ApiError::from(rejection).into_response(),
    };
    apply_rate_headers(response.headers_mut(), &admission.rate);
    Ok(response)
}

/// POST /api/v1/tickets/reservations/confirm
pub async fn confirm_reservation(
    State(state): State<AppState>,
    Json(token): Json<ReservationToken>,
) -> Result<Json<ReservationStateResponse>, ApiError> {
    let confirmed = state.coordinator.confirm(&token).await??;
    Ok(Json(ReservationStateResponse { state: confirmed }))
}

/// POST /api/v1/tickets/reservations/rollback
pub async fn rollback_reservation(
    State(state): State<AppState>,
    Json(token): Json<ReservationToken>,
) -> Result<Json<ReservationStateResponse>, ApiError> {
    let rolled_back = state.coordinator.rollback(&token).await??;
    Ok(Json(ReservationStateResponse { state: rolled_back }))
}
