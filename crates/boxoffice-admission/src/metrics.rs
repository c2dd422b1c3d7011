//! Admission counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::outcome::Rejection;

/// Process-wide admission counters.
#[derive(Debug, Default)]
pub struct AdmissionMetrics {
    admitted: AtomicU64,
    confirmed: AtomicU64,
    rolled_back: AtomicU64,
    out_of_stock: AtomicU64,
    sale_not_started: AtomicU64,
    sale_ended: AtomicU64,
    not_found: AtomicU64,
    rate_limited: AtomicU64,
    duplicate_claim: AtomicU64,
    unknown_reservation: AtomicU64,
    rate_limit_fail_open: AtomicU64,
    claim_rollbacks: AtomicU64,
    claim_rollback_failures: AtomicU64,
    store_failures: AtomicU64,
    snapshot_failures: AtomicU64,
}

/// Point-in-time copy of [`AdmissionMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub admitted: u64,
    pub confirmed: u64,
    pub rolled_back: u64,
    pub out_of_stock: u64,
    pub sale_not_started: u64,
    pub sale_ended: u64,
    pub not_found: u64,
    pub rate_limited: u64,
    pub duplicate_claim: u64,
    pub unknown_reservation: u64,
    pub rate_limit_fail_open: u64,
    pub claim_rollbacks: u64,
    pub claim_rollback_failures: u64,
    pub store_failures: u64,
    pub snapshot_failures: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl AdmissionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_admitted(&self) {
        bump(&self.admitted);
    }

    pub fn record_confirmed(&self) {
        bump(&self.confirmed);
    }

    pub fn record_rolled_back(&self) {
        bump(&self.rolled_back);
    }

    /// Count a rejection under its reason.
    pub fn record_rejection(&self, rejection: &Rejection) {
        let counter = match rejection {
            Rejection::OutOfStock => &self.out_of_stock,
            Rejection::SaleNotStarted => &self.sale_not_started,
            Rejection::SaleEnded => &self.sale_ended,
            Rejection::NotFound => &self.not_found,
            Rejection::RateLimitExceeded { .. } => &self.rate_limited,
            Rejection::DuplicateClaim => &self.duplicate_claim,
            Rejection::UnknownReservation => &self.unknown_reservation,
        };
        bump(counter);
    }

    pub fn record_fail_open(&self) {
        bump(&self.rate_limit_fail_open);
    }

    pub fn record_claim_rollback(&self) {
        bump(&self.claim_rollbacks);
    }

    pub fn record_claim_rollback_failure(&self) {
        bump(&self.claim_rollback_failures);
    }

    pub fn record_store_failure(&self) {
        bump(&self.store_failures);
    }

    pub fn record_snapshot_failure(&self) {
        bump(&self.snapshot_failures);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            admitted: load(&self.admitted),
            confirmed: load(&self.confirmed),
            rolled_back: load(&self.rolled_back),
            out_of_stock: load(&self.out_of_stock),
            sale_not_started: load(&self.sale_not_started),
            sale_ended: load(&self.sale_ended),
            not_found: load(&self.not_found),
            rate_limited: load(&self.rate_limited),
            duplicate_claim: load(&self.duplicate_claim),
            unknown_reservation: load(&self.unknown_reservation),
            rate_limit_fail_open: load(&self.rate_limit_fail_open),
            claim_rollbacks: load(&self.claim_rollbacks),
            claim_rollback_failures: load(&self.claim_rollback_failures),
            store_failures: load(&self.store_failures),
            snapshot_failures: load(&self.snapshot_failures),
        }
    }
}
