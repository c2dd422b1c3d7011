//! Coordination store and cache-sync configuration.

use serde::{Deserialize, Serialize};

/// Top-level coordination store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store provider type: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Prefix applied to every key written by BoxOffice.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Upper bound for a single store round trip, in milliseconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_ms: u64,
    /// Redis-specific configuration.
    #[serde(default)]
    pub redis: RedisStoreConfig,
    /// In-memory store configuration.
    #[serde(default)]
    pub memory: MemoryStoreConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            key_prefix: default_key_prefix(),
            operation_timeout_ms: default_operation_timeout(),
            redis: RedisStoreConfig::default(),
            memory: MemoryStoreConfig::default(),
        }
    }
}

/// Redis backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisStoreConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

/// In-memory backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStoreConfig {
    /// Maximum number of cached value entries kept in memory. Entries
    /// written with `set_nx` are not bounded by this.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
        }
    }
}

/// Background cache-sync worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSyncConfig {
    /// Capacity of the command queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Attempts per command before it is reported as failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff step between attempts, in milliseconds (linear).
    #[serde(default = "default_backoff")]
    pub backoff_ms: u64,
}

impl Default for CacheSyncConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_key_prefix() -> String {
    "boxoffice:".to_string()
}

fn default_operation_timeout() -> u64 {
    250
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_max_capacity() -> u64 {
    100_000
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff() -> u64 {
    50
}
