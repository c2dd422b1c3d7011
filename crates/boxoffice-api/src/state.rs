//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use boxoffice_admission::AdmissionCoordinator;
use boxoffice_cache::{CacheSync, FailureLog, StoreManager};
use boxoffice_core::config::AppConfig;
use boxoffice_database::DatabasePool;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration, loaded once at startup.
    pub config: Arc<AppConfig>,

    // ── Infrastructure ───────────────────────────────────────
    /// Coordination store (Redis or in-memory).
    pub store: StoreManager,
    /// PostgreSQL pool, absent when inventory runs in memory.
    pub database: Option<DatabasePool>,
    /// Background cache-sync worker handle.
    pub cache_sync: CacheSync,
    /// Latest failure reported by the cache-sync worker.
    pub sync_failures: FailureLog,

    // ── Admission ────────────────────────────────────────────
    /// Purchase admission pipeline.
    pub coordinator: Arc<AdmissionCoordinator>,

    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: StoreManager,
        database: Option<DatabasePool>,
        cache_sync: CacheSync,
        sync_failures: FailureLog,
        coordinator: AdmissionCoordinator,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            database,
            cache_sync,
            sync_failures,
            coordinator: Arc::new(coordinator),
            started_at: Instant::now(),
        }
    }
}
