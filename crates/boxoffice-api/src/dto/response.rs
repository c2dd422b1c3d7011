//! Response DTOs.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boxoffice_admission::{AttemptState, ClaimRecord, MetricsSnapshot, ReservationToken};
use boxoffice_cache::SyncFailure;
use boxoffice_core::types::TicketTypeId;

/// Availability check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub ticket_type_id: TicketTypeId,
    pub available: bool,
    pub quantity: u32,
}

/// Fingerprint check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintResponse {
    pub already_purchased: bool,
    /// Details of the existing claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<ClaimInfo>,
}

/// When an existing claim was made and when it lapses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimInfo {
    pub claimed_at: DateTime<Utc>,
    pub expires_in_seconds: Option<u64>,
}

impl ClaimInfo {
    pub fn new(record: ClaimRecord, ttl: Option<Duration>) -> Self {
        Self {
            claimed_at: record.claimed_at,
            expires_in_seconds: ttl.map(|ttl| ttl.as_secs()),
        }
    }
}

/// Successful purchase attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub state: AttemptState,
    pub reservation: ReservationToken,
}

/// Result of confirm or rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationStateResponse {
    pub state: AttemptState,
}

/// Result of an administrative rate-limit reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub identity: String,
    pub route: String,
    pub reset: bool,
}

/// Basic health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
}

/// Detailed health response.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedHealthResponse {
    /// Overall status: `ok` or `degraded`.
    pub status: String,
    /// Coordination store status.
    pub store: String,
    /// Database status, or `not_configured`.
    pub database: String,
    /// Cache writes given up on since start.
    pub cache_sync_failures: u64,
    /// The most recent of those, if any.
    pub last_cache_sync_failure: Option<CacheSyncFailure>,
    /// Admission counters.
    pub admission: MetricsSnapshot,
}

/// A cache write the cache-sync worker gave up on.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSyncFailure {
    pub key: String,
    pub operation: &'static str,
    pub attempts: u32,
    pub error: String,
}

impl From<SyncFailure> for CacheSyncFailure {
    fn from(failure: SyncFailure) -> Self {
        Self {
            key: failure.key,
            operation: failure.operation,
            attempts: failure.attempts,
            error: failure.error,
        }
    }
}
