//! # boxoffice-admission
//!
//! The purchase admission pipeline. A purchase attempt passes three gates
//! in order, all coordinated through the shared store:
//!
//! 1. [`RateLimiter`]: fixed-window request counters per identity and route
//! 2. [`FingerprintGuard`]: at most one claim per client fingerprint and ticket type
//! 3. [`InventoryLedger`]: atomic reserve/release of ticket stock
//!
//! [`AdmissionCoordinator`] sequences the gates and undoes the fingerprint
//! claim when the reservation fails. Every reservation it issues is held
//! in the [`ReservationRegistry`] until it is confirmed or rolled back once.

pub mod coordinator;
pub mod fingerprint;
pub mod inventory;
pub mod limiter;
pub mod metrics;
pub mod outcome;
pub mod reservation;

pub use coordinator::{
    Admission, AdmissionCoordinator, AdmissionRequest, AttemptState, ReservationToken,
};
pub use fingerprint::{ClaimOutcome, ClaimRecord, Fingerprint, FingerprintGuard, RequestSignals};
pub use inventory::{InventoryLedger, InventoryStore, MemoryInventoryStore, PgInventoryStore};
pub use limiter::{RateDecision, RateIdentity, RateLimiter, RateProfile};
pub use metrics::{AdmissionMetrics, MetricsSnapshot};
pub use outcome::{Rejection, Verdict};
pub use reservation::{ReservationRecord, ReservationRegistry};
