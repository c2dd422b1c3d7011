//! Fingerprint guard.
//!
//! A fingerprint is a digest of request signals (client address plus a
//! fixed set of browser headers). It is a heuristic for spotting the same
//! client twice, not an authentication mechanism: changing any contributing
//! header yields a different fingerprint.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, warn};

use boxoffice_cache::StoreManager;
use boxoffice_cache::keys;
use boxoffice_core::config::FingerprintConfig;
use boxoffice_core::error::AppError;
use boxoffice_core::result::AppResult;
use boxoffice_core::traits::CoordinationStore;
use boxoffice_core::types::TicketTypeId;

use crate::metrics::AdmissionMetrics;

/// Headers that contribute to a derived fingerprint.
pub const SIGNAL_HEADERS: [&str; 10] = [
    "user-agent",
    "accept",
    "accept-language",
    "accept-encoding",
    "sec-ch-ua",
    "sec-ch-ua-mobile",
    "sec-ch-ua-platform",
    "sec-fetch-dest",
    "sec-fetch-mode",
    "sec-fetch-site",
];

fn digest(input: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(input.as_bytes()))
}

/// A derived client fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already-derived fingerprint.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The request signals a fingerprint is derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSignals {
    /// Client address, already resolved from forwarding headers.
    pub client_addr: String,
    /// Signal header values keyed by lowercase header name.
    pub headers: BTreeMap<String, String>,
    /// Fingerprint supplied by the client or an upstream proxy.
    pub client_fingerprint: Option<String>,
}

impl RequestSignals {
    pub fn new(client_addr: impl Into<String>) -> Self {
        Self {
            client_addr: client_addr.into(),
            ..Self::default()
        }
    }

    /// Record a header if it is one of [`SIGNAL_HEADERS`] and non-empty.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_ascii_lowercase();
        let value = value.trim();
        if !value.is_empty() && SIGNAL_HEADERS.contains(&name.as_str()) {
            self.headers.insert(name, value.to_string());
        }
        self
    }

    pub fn with_client_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        let fingerprint = fingerprint.into();
        if !fingerprint.trim().is_empty() {
            self.client_fingerprint = Some(fingerprint);
        }
        self
    }

    /// Digest of the sorted `name=value` signals and the client address.
    pub fn device_digest(&self) -> String {
        let mut parts: Vec<String> = self
            .headers
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        parts.push(format!("ip={}", self.client_addr));
        parts.sort();
        digest(&parts.join("|"))
    }

    /// Final fingerprint: the client-supplied fingerprint when present,
    /// otherwise the device digest, bound to the client address.
    pub fn fingerprint(&self) -> Fingerprint {
        let client = self
            .client_fingerprint
            .clone()
            .unwrap_or_else(|| self.device_digest());
        Fingerprint(digest(&format!("{}|{client}", self.client_addr)))
    }
}

/// Value stored under a claim key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Authenticated claimant, if any.
    pub claimant: Option<String>,
    /// When the claim was made.
    pub claimed_at: DateTime<Utc>,
}

/// Result of [`FingerprintGuard::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This call created the claim.
    Claimed {
        /// Store key holding the claim.
        key: String,
    },
    /// A claim already exists for this fingerprint and ticket type.
    AlreadyClaimed,
}

/// At most one claim per (fingerprint, ticket type) within the claim TTL.
///
/// Every operation fails closed: a store error is returned, never guessed.
#[derive(Debug, Clone)]
pub struct FingerprintGuard {
    store: StoreManager,
    claim_ttl: Duration,
    metrics: Arc<AdmissionMetrics>,
}

impl FingerprintGuard {
    pub fn new(store: StoreManager, config: &FingerprintConfig, metrics: Arc<AdmissionMetrics>) -> Self {
        Self {
            store,
            claim_ttl: config.claim_ttl(),
            metrics,
        }
    }

    /// Whether a claim exists.
    pub async fn check(&self, fingerprint: &Fingerprint, ticket_type_id: TicketTypeId) -> AppResult<bool> {
        let key = keys::fingerprint_claim(fingerprint.as_str(), ticket_type_id);
        self.store
            .exists(&key)
            .await
            .inspect_err(|err| self.store_failed("check", &key, err))
    }

    /// The stored claim and its remaining lifetime, for diagnostics.
    pub async fn inspect(
        &self,
        fingerprint: &Fingerprint,
        ticket_type_id: TicketTypeId,
    ) -> AppResult<Option<(ClaimRecord, Option<Duration>)>> {
        let key = keys::fingerprint_claim(fingerprint.as_str(), ticket_type_id);
        let Some((raw, ttl)) = self
            .store
            .get_with_ttl(&key)
            .await
            .inspect_err(|err| self.store_failed("inspect", &key, err))?
        else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some((record, ttl))),
            Err(err) => {
                warn!(key = %key, error = %err, "Unreadable claim record");
                Ok(None)
            }
        }
    }

    /// Create the claim if absent. Concurrent callers: exactly one wins.
    pub async fn claim(
        &self,
        fingerprint: &Fingerprint,
        ticket_type_id: TicketTypeId,
        claimant: Option<&str>,
    ) -> AppResult<ClaimOutcome> {
        let key = keys::fingerprint_claim(fingerprint.as_str(), ticket_type_id);
        let record = ClaimRecord {
            claimant: claimant.map(str::to_string),
            claimed_at: Utc::now(),
        };
        let value = serde_json::to_string(&record)?;

        let created = self
            .store
            .set_nx(&key, &value, self.claim_ttl)
            .await
            .inspect_err(|err| self.store_failed("claim", &key, err))?;

        if created {
            debug!(key = %key, "Fingerprint claim created");
            Ok(ClaimOutcome::Claimed { key })
        } else {
            debug!(key = %key, "Fingerprint already claimed");
            Ok(ClaimOutcome::AlreadyClaimed)
        }
    }

    /// Delete a claim. Returns `true` if one was removed.
    pub async fn release(&self, fingerprint: &Fingerprint, ticket_type_id: TicketTypeId) -> AppResult<bool> {
        let key = keys::fingerprint_claim(fingerprint.as_str(), ticket_type_id);
        self.store
            .delete(&key)
            .await
            .inspect_err(|err| self.store_failed("release", &key, err))
    }

    fn store_failed(&self, operation: &'static str, key: &str, err: &AppError) {
        self.metrics.record_store_failure();
        error!(operation, key, error = %err, "Fingerprint guard store call failed");
    }
}
