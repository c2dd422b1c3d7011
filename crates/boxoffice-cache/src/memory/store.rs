//! In-memory coordination store using the moka crate.
//!
//! Values live in a moka cache with per-entry expiry. Keys written with
//! `set_nx` (fingerprint claims, reservation records) live in a second moka
//! cache that has no capacity bound, so size-based eviction can only drop
//! cached values and never an admission decision. Window counters live in
//! a separate `DashMap`; each counter is updated under its shard lock so
//! increment and expiry are one atomic step.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use boxoffice_core::config::MemoryStoreConfig;
use boxoffice_core::result::AppResult;
use boxoffice_core::traits::{CoordinationStore, WindowCount};

/// Expired counters are swept once every this many increments.
const COUNTER_SWEEP_INTERVAL: u64 = 1024;

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    ttl: Duration,
    expires_at: Instant,
}

impl StoredValue {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            ttl,
            expires_at: Instant::now() + ttl,
        }
    }

    fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Gives every entry the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Debug)]
struct WindowCounter {
    count: u64,
    expires_at: Instant,
}

/// In-memory coordination store for single-node deployments and tests.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    /// Plain values with per-entry expiry, bounded by `max_capacity`.
    values: Cache<String, StoredValue>,
    /// `set_nx` entries; never evicted before their TTL.
    claims: Cache<String, StoredValue>,
    /// Fixed-window counters.
    counters: Arc<DashMap<String, WindowCounter>>,
    /// Increments since start, drives the counter sweep.
    increments: Arc<AtomicU64>,
    /// Key prefix for all keys.
    key_prefix: String,
}

impl MemoryStore {
    /// Create a new in-memory store from configuration.
    pub fn new(config: &MemoryStoreConfig, key_prefix: impl Into<String>) -> Self {
        let values = Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        let claims = Cache::builder().expire_after(PerEntryTtl).build();

        Self {
            values,
            claims,
            counters: Arc::new(DashMap::new()),
            increments: Arc::new(AtomicU64::new(0)),
            key_prefix: key_prefix.into(),
        }
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{key}", self.key_prefix)
    }

    async fn lookup(&self, key: &str) -> Option<StoredValue> {
        let full_key = self.prefixed_key(key);
        match self.values.get(&full_key).await {
            Some(stored) => Some(stored),
            None => self.claims.get(&full_key).await,
        }
    }

    fn sweep_counters(&self, now: Instant) {
        let before = self.counters.len();
        self.counters.retain(|_, c| c.expires_at > now);
        let removed = before.saturating_sub(self.counters.len());
        if removed > 0 {
            debug!(removed, "Swept expired window counters");
        }
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.lookup(key).await.map(|stored| stored.value))
    }

    async fn get_with_ttl(&self, key: &str) -> AppResult<Option<(String, Option<Duration>)>> {
        Ok(self.lookup(key).await.map(|stored| {
            let remaining = stored.remaining();
            (stored.value, Some(remaining))
        }))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.values
            .insert(self.prefixed_key(key), StoredValue::new(value, ttl))
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let full_key = self.prefixed_key(key);
        let value = self.values.remove(&full_key).await;
        let claim = self.claims.remove(&full_key).await;
        let counter = self.counters.remove(&full_key);
        Ok(value.is_some() || claim.is_some() || counter.is_some())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        if self.lookup(key).await.is_some() {
            return Ok(true);
        }
        let full_key = self.prefixed_key(key);
        Ok(self
            .counters
            .get(&full_key)
            .is_some_and(|c| c.expires_at > Instant::now()))
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        let stored = StoredValue::new(value, ttl);
        let entry = self
            .claims
            .entry(self.prefixed_key(key))
            .or_insert_with(async move { stored })
            .await;
        Ok(entry.is_fresh())
    }

    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<WindowCount> {
        let now = Instant::now();

        if self.increments.fetch_add(1, Ordering::Relaxed) % COUNTER_SWEEP_INTERVAL
            == COUNTER_SWEEP_INTERVAL - 1
        {
            self.sweep_counters(now);
        }

        let mut counter = self
            .counters
            .entry(self.prefixed_key(key))
            .or_insert_with(|| WindowCounter {
                count: 0,
                expires_at: now + window,
            });

        if counter.expires_at <= now {
            counter.count = 0;
            counter.expires_at = now + window;
        }
        counter.count += 1;

        Ok(WindowCount {
            count: counter.count,
            ttl: counter.expires_at.saturating_duration_since(now),
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
