//! Admission gate configuration: rate-limit profiles, fingerprint claims,
//! and inventory checks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{EventId, TicketTypeId};

/// Settings for the purchase admission pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Rate limiter settings.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Fingerprint guard settings.
    #[serde(default)]
    pub fingerprint: FingerprintConfig,
    /// Inventory ledger settings.
    #[serde(default)]
    pub inventory: InventoryConfig,
}

/// A `(limit, window)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitProfileConfig {
    /// Maximum requests per window.
    pub limit: u64,
    /// Window length in seconds.
    #[serde(default = "default_window")]
    pub window_seconds: u64,
}

impl RateLimitProfileConfig {
    /// Window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// Fixed-window rate limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether the rate limiter is active at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Loose profile for general traffic.
    #[serde(default = "default_profile")]
    pub default: RateLimitProfileConfig,
    /// Strict profile for purchase-sensitive routes.
    #[serde(default = "strict_profile")]
    pub strict: RateLimitProfileConfig,
    /// Route patterns that select the strict profile. A trailing `*`
    /// matches any suffix.
    #[serde(default = "default_strict_routes")]
    pub strict_routes: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default: default_profile(),
            strict: strict_profile(),
            strict_routes: default_strict_routes(),
        }
    }
}

/// Fingerprint guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintConfig {
    /// Lifetime of a claim in seconds.
    #[serde(default = "default_claim_ttl")]
    pub claim_ttl_seconds: u64,
    /// Header carrying a client-supplied fingerprint.
    #[serde(default = "default_client_header")]
    pub client_header: String,
}

impl FingerprintConfig {
    /// Claim lifetime as a [`Duration`].
    pub fn claim_ttl(&self) -> Duration {
        Duration::from_secs(self.claim_ttl_seconds)
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            claim_ttl_seconds: default_claim_ttl(),
            client_header: default_client_header(),
        }
    }
}

/// Inventory ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Inventory backend: `"postgres"` or `"memory"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Lifetime of cached ticket-type snapshots in seconds.
    #[serde(default = "default_snapshot_ttl")]
    pub snapshot_ttl_seconds: u64,
    /// Largest quantity accepted in a single attempt.
    #[serde(default = "default_max_quantity")]
    pub max_quantity_per_attempt: u32,
    /// Upper bound for one reserve or release round trip, in milliseconds.
    #[serde(default = "default_inventory_timeout")]
    pub operation_timeout_ms: u64,
    /// How long an issued reservation can still be confirmed or rolled
    /// back, in seconds. Stock of an expired reservation stays sold.
    #[serde(default = "default_reservation_ttl")]
    pub reservation_ttl_seconds: u64,
    /// Ticket types loaded into the memory backend at startup.
    #[serde(default)]
    pub seed: Vec<SeedTicketType>,
}

/// A ticket type declared in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedTicketType {
    /// Fixed id, so the same URLs work across restarts.
    pub id: TicketTypeId,
    /// Owning event; a fresh id is generated when omitted.
    #[serde(default)]
    pub event_id: Option<EventId>,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    pub total_quantity: i32,
    /// Defaults to `total_quantity`.
    #[serde(default)]
    pub available_quantity: Option<i32>,
    /// Sale opens this many minutes after startup (negative: already open).
    #[serde(default)]
    pub opens_in_minutes: i64,
    /// Sale closes this many minutes after startup.
    #[serde(default = "default_closes_in_minutes")]
    pub closes_in_minutes: i64,
}

impl InventoryConfig {
    /// Snapshot lifetime as a [`Duration`].
    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_ttl_seconds)
    }

    /// Reserve/release timeout as a [`Duration`].
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Reservation record lifetime as a [`Duration`].
    pub fn reservation_ttl(&self) -> Duration {
        Duration::from_secs(self.reservation_ttl_seconds)
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            snapshot_ttl_seconds: default_snapshot_ttl(),
            max_quantity_per_attempt: default_max_quantity(),
            operation_timeout_ms: default_inventory_timeout(),
            reservation_ttl_seconds: default_reservation_ttl(),
            seed: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_window() -> u64 {
    60
}

fn default_profile() -> RateLimitProfileConfig {
    RateLimitProfileConfig {
        limit: 100,
        window_seconds: 60,
    }
}

fn strict_profile() -> RateLimitProfileConfig {
    RateLimitProfileConfig {
        limit: 10,
        window_seconds: 60,
    }
}

fn default_strict_routes() -> Vec<String> {
    vec![
        "/api/v1/tickets/purchase".to_string(),
        "/api/v1/orders*".to_string(),
    ]
}

fn default_claim_ttl() -> u64 {
    24 * 60 * 60
}

fn default_client_header() -> String {
    "x-tls-fingerprint".to_string()
}

fn default_backend() -> String {
    "postgres".to_string()
}

fn default_snapshot_ttl() -> u64 {
    15 * 60
}

fn default_max_quantity() -> u32 {
    10
}

fn default_inventory_timeout() -> u64 {
    2000
}

fn default_reservation_ttl() -> u64 {
    60 * 60
}

fn default_closes_in_minutes() -> i64 {
    7 * 24 * 60
}
