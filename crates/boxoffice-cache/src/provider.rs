//! Store manager that dispatches to the configured provider.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use boxoffice_core::config::StoreConfig;
use boxoffice_core::error::AppError;
use boxoffice_core::result::AppResult;
use boxoffice_core::traits::{CoordinationStore, WindowCount};

/// Store manager that wraps the configured coordination store provider.
///
/// The provider is selected at construction time based on configuration.
/// Every call is bounded by `operation_timeout`; a call that does not
/// finish in time fails with `StoreUnavailable`.
#[derive(Debug, Clone)]
pub struct StoreManager {
    /// The inner store provider.
    inner: Arc<dyn CoordinationStore>,
    /// Upper bound for a single round trip.
    operation_timeout: Duration,
}

impl StoreManager {
    /// Create a new store manager from configuration.
    pub async fn new(config: &StoreConfig) -> AppResult<Self> {
        let inner: Arc<dyn CoordinationStore> = match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis coordination store");
                let client = crate::redis::RedisClient::connect(config).await?;
                Arc::new(crate::redis::RedisStore::new(client))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory coordination store");
                Arc::new(crate::memory::MemoryStore::new(
                    &config.memory,
                    config.key_prefix.clone(),
                ))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown store provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self {
            inner,
            operation_timeout: Duration::from_millis(config.operation_timeout_ms),
        })
    }

    /// Create a store manager from an existing provider (for testing).
    pub fn from_provider(provider: Arc<dyn CoordinationStore>, operation_timeout: Duration) -> Self {
        Self {
            inner: provider,
            operation_timeout,
        }
    }

    /// Get a reference to the inner provider.
    pub fn provider(&self) -> &dyn CoordinationStore {
        self.inner.as_ref()
    }

    /// Configured upper bound for a single round trip.
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        key: &str,
        call: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.operation_timeout.as_millis() as u64;
                warn!(operation, key, timeout_ms, "Coordination store call timed out");
                Err(AppError::store_unavailable(format!(
                    "Store {operation} on '{key}' exceeded {timeout_ms}ms"
                )))
            }
        }
    }
}

#[async_trait]
impl CoordinationStore for StoreManager {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.bounded("get", key, self.inner.get(key)).await
    }

    async fn get_with_ttl(&self, key: &str) -> AppResult<Option<(String, Option<Duration>)>> {
        self.bounded("get_with_ttl", key, self.inner.get_with_ttl(key))
            .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.bounded("set", key, self.inner.set(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        self.bounded("delete", key, self.inner.delete(key)).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.bounded("exists", key, self.inner.exists(key)).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        self.bounded("set_nx", key, self.inner.set_nx(key, value, ttl))
            .await
    }

    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<WindowCount> {
        self.bounded("incr_window", key, self.inner.incr_window(key, window))
            .await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.bounded("health_check", "", self.inner.health_check())
            .await
    }
}
