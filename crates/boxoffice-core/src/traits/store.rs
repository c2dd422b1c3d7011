//! Coordination store trait shared by every admission gate.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// Result of an atomic fixed-window increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Counter value after the increment.
    pub count: u64,
    /// Time until the window key expires.
    pub ttl: Duration,
}

/// Trait for the low-latency store reachable from every request handler
/// (Redis in production, in-memory for single-node and tests).
///
/// Every cross-request invariant is expressed as a single call on this
/// trait. Implementations must make each call atomic per key; a call must
/// never be emulated as a separate read followed by a separate write.
#[async_trait]
pub trait CoordinationStore: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value by key. Returns `None` if the key does not exist or has expired.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Get a value together with its remaining time-to-live.
    async fn get_with_ttl(&self, key: &str) -> AppResult<Option<(String, Option<Duration>)>>;

    /// Set a value with a TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;

    /// Delete a key. Returns `true` if a key was removed.
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// Check whether a key exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Set a value only if the key does not already exist (NX).
    /// Returns `true` if the value was set, `false` if the key already existed.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool>;

    /// Atomically increment a window counter.
    ///
    /// When the key is absent it is created with value 1 and expiry
    /// `window`; otherwise it is incremented and keeps its original expiry.
    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<WindowCount>;

    /// Get a typed value by deserializing from JSON.
    async fn get_json<T: serde::de::DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> AppResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key).await? {
            Some(value) => {
                let parsed = serde_json::from_str(&value)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value by serializing to JSON.
    async fn set_json<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> AppResult<()>
    where
        Self: Sized,
    {
        let json = serde_json::to_string(value)?;
        self.set(key, &json, ttl).await
    }

    /// Check that the store backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
