//! Key builders for every coordination store entry.
//!
//! Each admission gate owns exactly one namespace below; the global prefix
//! from configuration is applied by the store provider.

use std::fmt::Display;

/// Namespace owned by the rate limiter.
pub const RATE_LIMIT_NAMESPACE: &str = "rate";
/// Namespace owned by the fingerprint guard.
pub const FINGERPRINT_NAMESPACE: &str = "fingerprint";
/// Namespace owned by the inventory ledger's snapshot cache.
pub const SNAPSHOT_NAMESPACE: &str = "snapshot";
/// Namespace owned by the coordinator's reservation registry.
pub const RESERVATION_NAMESPACE: &str = "reservation";

// ── Rate limiting keys ─────────────────────────────────────

/// Key for a fixed-window counter of `identity` on `route`.
pub fn rate_limit(identity: &str, route: &str) -> String {
    format!("{RATE_LIMIT_NAMESPACE}:{identity}:{route}")
}

// ── Fingerprint keys ───────────────────────────────────────

/// Key for a fingerprint claim on a resource.
pub fn fingerprint_claim(fingerprint: &str, resource_id: impl Display) -> String {
    format!("{FINGERPRINT_NAMESPACE}:{fingerprint}:{resource_id}")
}

// ── Inventory snapshot keys ────────────────────────────────

/// Key for the cached snapshot of a ticket type.
pub fn ticket_type_snapshot(ticket_type_id: impl Display) -> String {
    format!("{SNAPSHOT_NAMESPACE}:ticket_type:{ticket_type_id}")
}

// ── Reservation keys ───────────────────────────────────────

/// Key for an outstanding reservation awaiting confirm or rollback.
pub fn reservation(reservation_id: impl Display) -> String {
    format!("{RESERVATION_NAMESPACE}:{reservation_id}")
}
