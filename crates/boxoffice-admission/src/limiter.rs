//! Fixed-window rate limiter.
//!
//! Each (identity, route) pair gets a counter that lives for one window.
//! Fixed windows admit up to twice the limit across a window boundary.
//!
//! When the coordination store is unreachable the limiter fails open: the
//! request is admitted, the event is logged at `warn` and counted.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use boxoffice_cache::StoreManager;
use boxoffice_cache::keys;
use boxoffice_core::config::{RateLimitConfig, RateLimitProfileConfig};
use boxoffice_core::result::AppResult;
use boxoffice_core::traits::CoordinationStore;
use boxoffice_core::types::UserId;

use crate::metrics::AdmissionMetrics;

/// Who a rate-limit window belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateIdentity {
    /// An unauthenticated client address.
    Address(String),
    /// An authenticated user.
    User(UserId),
}

impl fmt::Display for RateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(addr) => write!(f, "ip:{addr}"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// A `(limit, window)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateProfile {
    pub limit: u64,
    pub window: Duration,
}

impl From<RateLimitProfileConfig> for RateProfile {
    fn from(config: RateLimitProfileConfig) -> Self {
        Self {
            limit: config.limit,
            window: config.window(),
        }
    }
}

/// Outcome of one rate-limit evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Counted and within the limit.
    Allowed { limit: u64, remaining: u64 },
    /// Counted and over the limit.
    Denied { limit: u64, retry_after: Duration },
    /// Not counted (limiter disabled or store unreachable); admitted.
    Unmetered,
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied { .. })
    }
}

/// Fixed-window limiter with a default and a strict profile.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: StoreManager,
    enabled: bool,
    default_profile: RateProfile,
    strict_profile: RateProfile,
    strict_routes: Vec<String>,
    metrics: Arc<AdmissionMetrics>,
}

impl RateLimiter {
    pub fn new(store: StoreManager, config: &RateLimitConfig, metrics: Arc<AdmissionMetrics>) -> Self {
        Self {
            store,
            enabled: config.enabled,
            default_profile: config.default.into(),
            strict_profile: config.strict.into(),
            strict_routes: config.strict_routes.clone(),
            metrics,
        }
    }

    /// The profile that applies to `route`.
    pub fn profile_for(&self, route: &str) -> RateProfile {
        let strict = self.strict_routes.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => route.starts_with(prefix),
            None => route == pattern,
        });
        if strict {
            self.strict_profile
        } else {
            self.default_profile
        }
    }

    /// Count a request from `identity` on `route` against its profile.
    pub async fn check(&self, identity: &RateIdentity, route: &str) -> RateDecision {
        if !self.enabled {
            return RateDecision::Unmetered;
        }
        let key = keys::rate_limit(&identity.to_string(), route);
        self.allow(&key, self.profile_for(route)).await
    }

    /// Count one request under `key`.
    pub async fn allow(&self, key: &str, profile: RateProfile) -> RateDecision {
        let window = match self.store.incr_window(key, profile.window).await {
            Ok(window) => window,
            Err(err) => {
                self.metrics.record_fail_open();
                warn!(key, error = %err, "Rate limiter store unavailable, failing open");
                return RateDecision::Unmetered;
            }
        };

        if window.count > profile.limit {
            debug!(key, count = window.count, limit = profile.limit, "Rate limit exceeded");
            RateDecision::Denied {
                limit: profile.limit,
                retry_after: window.ttl,
            }
        } else {
            RateDecision::Allowed {
                limit: profile.limit,
                remaining: profile.limit - window.count,
            }
        }
    }

    /// Delete the window of `identity` on `route`. Returns `true` if one existed.
    pub async fn reset(&self, identity: &RateIdentity, route: &str) -> AppResult<bool> {
        let key = keys::rate_limit(&identity.to_string(), route);
        let removed = self.store.delete(&key).await?;
        debug!(key = %key, removed, "Rate limit window reset");
        Ok(removed)
    }
}
