//! Admission coordinator.
//!
//! One purchase attempt moves through
//! `Start → RateChecked → FingerprintClaimed → Reserved → {Committed | RolledBack}`.
//! A rejection ends the attempt at the gate that produced it. A rejection
//! (or store failure) at the inventory gate releases the claim taken at
//! the fingerprint gate first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use boxoffice_core::result::AppResult;
use boxoffice_core::types::{ReservationId, TicketTypeId};

use crate::fingerprint::{ClaimOutcome, Fingerprint, FingerprintGuard};
use crate::inventory::InventoryLedger;
use crate::limiter::{RateDecision, RateIdentity, RateLimiter};
use crate::metrics::AdmissionMetrics;
use crate::outcome::{Rejection, Verdict};
use crate::reservation::{ReservationRecord, ReservationRegistry};

/// Where an attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Start,
    RateChecked,
    FingerprintClaimed,
    Reserved,
    Committed,
    RolledBack,
    Rejected,
}

impl AttemptState {
    /// Whether `next` may directly follow `self`.
    pub fn can_advance_to(self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Start, RateChecked)
                | (Start, Rejected)
                | (RateChecked, FingerprintClaimed)
                | (RateChecked, Rejected)
                | (FingerprintClaimed, Reserved)
                | (FingerprintClaimed, Rejected)
                | (Reserved, Committed)
                | (Reserved, RolledBack)
        )
    }
}

/// Inputs for one purchase attempt.
#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub identity: RateIdentity,
    pub route: String,
    pub fingerprint: Fingerprint,
    pub ticket_type_id: TicketTypeId,
    pub quantity: u32,
    /// Authenticated claimant recorded with the fingerprint claim.
    pub claimant: Option<String>,
}

/// Handed to the order-creation step after a successful reservation.
///
/// The holder must either confirm it or roll it back. Only
/// `reservation_id` is trusted on the way back in; the other fields are
/// informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationToken {
    pub reservation_id: ReservationId,
    pub ticket_type_id: TicketTypeId,
    pub quantity: u32,
    pub fingerprint: Fingerprint,
    pub claim_key: String,
    pub reserved_at: DateTime<Utc>,
}

impl ReservationToken {
    fn record(&self) -> ReservationRecord {
        ReservationRecord {
            ticket_type_id: self.ticket_type_id,
            quantity: self.quantity,
            fingerprint: self.fingerprint.clone(),
            reserved_at: self.reserved_at,
        }
    }
}

/// Result of [`AdmissionCoordinator::admit`].
#[derive(Debug, Clone)]
pub struct Admission {
    /// Rate-limit evaluation, for response headers.
    pub rate: RateDecision,
    /// The token, or why the attempt was turned away.
    pub verdict: Verdict<ReservationToken>,
    /// States visited, in order.
    pub trail: Vec<AttemptState>,
}

impl Admission {
    /// The state the attempt ended in.
    pub fn state(&self) -> AttemptState {
        self.trail.last().copied().unwrap_or(AttemptState::Start)
    }
}

struct Trail(Vec<AttemptState>);

impl Trail {
    fn start() -> Self {
        Self(vec![AttemptState::Start])
    }

    fn advance(&mut self, next: AttemptState) {
        let current = self.0.last().copied().unwrap_or(AttemptState::Start);
        debug_assert!(current.can_advance_to(next), "{current:?} -> {next:?}");
        self.0.push(next);
    }
}

/// Runs the rate limiter, fingerprint guard and inventory ledger in order,
/// and settles the reservations it issues.
#[derive(Debug, Clone)]
pub struct AdmissionCoordinator {
    limiter: RateLimiter,
    guard: FingerprintGuard,
    ledger: InventoryLedger,
    reservations: ReservationRegistry,
    metrics: Arc<AdmissionMetrics>,
}

impl AdmissionCoordinator {
    pub fn new(
        limiter: RateLimiter,
        guard: FingerprintGuard,
        ledger: InventoryLedger,
        reservations: ReservationRegistry,
        metrics: Arc<AdmissionMetrics>,
    ) -> Self {
        Self {
            limiter,
            guard,
            ledger,
            reservations,
            metrics,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn guard(&self) -> &FingerprintGuard {
        &self.guard
    }

    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    pub fn metrics(&self) -> &AdmissionMetrics {
        &self.metrics
    }

    /// Run one purchase attempt through every gate.
    ///
    /// Store failures at the fingerprint or inventory gate are returned as
    /// errors (fail closed). The rate gate fails open inside the limiter.
    pub async fn admit(&self, request: &AdmissionRequest) -> AppResult<Admission> {
        let mut trail = Trail::start();

        // Quantity problems are caller errors, reported before any gate counts.
        self.ledger.validate_quantity(request.quantity)?;

        let rate = self.limiter.check(&request.identity, &request.route).await;
        if let RateDecision::Denied { limit, retry_after } = rate {
            return Ok(self.reject(
                rate,
                trail,
                Rejection::RateLimitExceeded { limit, retry_after },
                request,
            ));
        }
        trail.advance(AttemptState::RateChecked);

        let claim_key = match self
            .guard
            .claim(
                &request.fingerprint,
                request.ticket_type_id,
                request.claimant.as_deref(),
            )
            .await?
        {
            ClaimOutcome::Claimed { key } => key,
            ClaimOutcome::AlreadyClaimed => {
                return Ok(self.reject(rate, trail, Rejection::DuplicateClaim, request));
            }
        };
        trail.advance(AttemptState::FingerprintClaimed);

        let reserved = match self
            .ledger
            .reserve(request.ticket_type_id, request.quantity)
            .await
        {
            Ok(verdict) => verdict,
            Err(err) => {
                self.release_claim(&request.fingerprint, request.ticket_type_id)
                    .await;
                return Err(err);
            }
        };

        let ticket_type = match reserved {
            Ok(ticket_type) => ticket_type,
            Err(rejection) => {
                self.release_claim(&request.fingerprint, request.ticket_type_id)
                    .await;
                return Ok(self.reject(rate, trail, rejection, request));
            }
        };

        let token = ReservationToken {
            reservation_id: ReservationId::new(),
            ticket_type_id: request.ticket_type_id,
            quantity: request.quantity,
            fingerprint: request.fingerprint.clone(),
            claim_key,
            reserved_at: Utc::now(),
        };
        // An unrecorded reservation could never be settled, so undo it.
        if let Err(err) = self.reservations.record(token.reservation_id, &token.record()).await {
            self.undo_reservation(request).await;
            return Err(err);
        }

        trail.advance(AttemptState::Reserved);
        self.metrics.record_admitted();
        info!(
            identity = %request.identity,
            reservation_id = %token.reservation_id,
            ticket_type_id = %request.ticket_type_id,
            quantity = request.quantity,
            available = ticket_type.available_quantity,
            "Purchase attempt admitted"
        );
        Ok(Admission {
            rate,
            verdict: Ok(token),
            trail: trail.0,
        })
    }

    /// The downstream order succeeded: keep the stock decrement and claim.
    ///
    /// Each reservation settles once; confirming an unknown, expired or
    /// already settled reservation is rejected.
    pub async fn confirm(&self, token: &ReservationToken) -> AppResult<Verdict<AttemptState>> {
        let Some(record) = self.reservations.consume(token.reservation_id).await? else {
            return Ok(Err(self.unknown_reservation(token)));
        };

        self.metrics.record_confirmed();
        info!(
            reservation_id = %token.reservation_id,
            ticket_type_id = %record.ticket_type_id,
            quantity = record.quantity,
            "Reservation committed"
        );
        Ok(Ok(AttemptState::Committed))
    }

    /// The downstream order failed: return the stock and clear the claim.
    ///
    /// Acts on the recorded reservation, so a replayed or altered token can
    /// never return more stock than was taken.
    pub async fn rollback(&self, token: &ReservationToken) -> AppResult<Verdict<AttemptState>> {
        let Some(record) = self.reservations.consume(token.reservation_id).await? else {
            return Ok(Err(self.unknown_reservation(token)));
        };

        let released = match self
            .ledger
            .release(record.ticket_type_id, record.quantity)
            .await
        {
            Ok(verdict) => verdict,
            Err(err) => {
                self.reservations.restore(token.reservation_id, &record).await;
                return Err(err);
            }
        };
        if let Err(rejection) = released {
            return Ok(Err(rejection));
        }
        self.release_claim(&record.fingerprint, record.ticket_type_id)
            .await;

        self.metrics.record_rolled_back();
        info!(
            reservation_id = %token.reservation_id,
            ticket_type_id = %record.ticket_type_id,
            quantity = record.quantity,
            "Reservation rolled back"
        );
        Ok(Ok(AttemptState::RolledBack))
    }

    fn unknown_reservation(&self, token: &ReservationToken) -> Rejection {
        let rejection = Rejection::UnknownReservation;
        self.metrics.record_rejection(&rejection);
        warn!(
            reservation_id = %token.reservation_id,
            ticket_type_id = %token.ticket_type_id,
            "Settlement refused for unknown or already settled reservation"
        );
        rejection
    }

    fn reject(
        &self,
        rate: RateDecision,
        mut trail: Trail,
        rejection: Rejection,
        request: &AdmissionRequest,
    ) -> Admission {
        trail.advance(AttemptState::Rejected);
        self.metrics.record_rejection(&rejection);
        info!(
            identity = %request.identity,
            ticket_type_id = %request.ticket_type_id,
            reason = rejection.code(),
            "Purchase attempt rejected"
        );
        Admission {
            rate,
            verdict: Err(rejection),
            trail: trail.0,
        }
    }

    /// Best effort: if this fails the claim still expires with its TTL.
    async fn release_claim(&self, fingerprint: &Fingerprint, ticket_type_id: TicketTypeId) {
        match self.guard.release(fingerprint, ticket_type_id).await {
            Ok(_) => self.metrics.record_claim_rollback(),
            Err(err) => {
                self.metrics.record_claim_rollback_failure();
                error!(
                    ticket_type_id = %ticket_type_id,
                    error = %err,
                    "Failed to release fingerprint claim"
                );
            }
        }
    }

    /// Return the stock and claim of a reservation that could not be recorded.
    async fn undo_reservation(&self, request: &AdmissionRequest) {
        if let Err(err) = self
            .ledger
            .release(request.ticket_type_id, request.quantity)
            .await
        {
            error!(
                ticket_type_id = %request.ticket_type_id,
                quantity = request.quantity,
                error = %err,
                "Failed to return stock of an unrecorded reservation"
            );
        }
        self.release_claim(&request.fingerprint, request.ticket_type_id)
            .await;
    }
}
