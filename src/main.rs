//! BoxOffice server: purchase admission for ticket sales.
//!
//! Main entry point that wires all crates together and starts the server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use boxoffice_admission::{
    AdmissionCoordinator, AdmissionMetrics, FingerprintGuard, InventoryLedger, InventoryStore,
    MemoryInventoryStore, PgInventoryStore, RateLimiter, ReservationRegistry,
};
use boxoffice_api::AppState;
use boxoffice_cache::{CacheSync, FailureLog, StoreManager};
use boxoffice_core::config::AppConfig;
use boxoffice_database::DatabasePool;
use boxoffice_database::repositories::TicketTypeRepository;

#[tokio::main]
async fn main() {
    let env = std::env::var("BOXOFFICE_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e:#}");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting BoxOffice v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Coordination store ───────────────────────────────
    tracing::info!(provider = %config.store.provider, "Initializing coordination store...");
    let store = StoreManager::new(&config.store)
        .await
        .context("Coordination store init failed")?;

    // ── Step 2: Cache-sync worker ────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (cache_sync, sync_handle) = CacheSync::spawn(store.clone(), &config.cache_sync, shutdown_rx);
    let (sync_failures, _failure_listener) = FailureLog::spawn(&cache_sync);

    // ── Step 3: Inventory backend ────────────────────────────────
    let (inventory, database) = build_inventory(&config).await?;

    // ── Step 4: Admission pipeline ───────────────────────────────
    let metrics = Arc::new(AdmissionMetrics::new());
    let limiter = RateLimiter::new(store.clone(), &config.admission.rate_limit, Arc::clone(&metrics));
    let guard = FingerprintGuard::new(store.clone(), &config.admission.fingerprint, Arc::clone(&metrics));
    let ledger = InventoryLedger::new(
        inventory,
        store.clone(),
        cache_sync.clone(),
        config.admission.inventory.clone(),
        Arc::clone(&metrics),
    );
    let reservations = ReservationRegistry::new(
        store.clone(),
        &config.admission.inventory,
        Arc::clone(&metrics),
    );
    let coordinator = AdmissionCoordinator::new(limiter, guard, ledger, reservations, metrics);

    // ── Step 5: Build and start HTTP server ──────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);

    let state = AppState::new(
        config,
        store,
        database.clone(),
        cache_sync,
        sync_failures,
        coordinator,
    );
    let app = boxoffice_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("BoxOffice server listening on {addr}");

    // ── Step 6: Graceful shutdown ────────────────────────────────
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    })
    .await
    .context("Server error")?;

    // ── Step 7: Drain background tasks ───────────────────────────
    tracing::info!("Waiting for cache-sync worker to drain...");
    if tokio::time::timeout(grace, sync_handle).await.is_err() {
        tracing::warn!(grace_seconds = grace.as_secs(), "Cache-sync worker did not drain in time");
    }
    if let Some(pool) = database {
        pool.close().await;
    }

    tracing::info!("BoxOffice server shut down gracefully");
    Ok(())
}

/// Pick the inventory backend named in configuration.
async fn build_inventory(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn InventoryStore>, Option<DatabasePool>)> {
    match config.admission.inventory.backend.as_str() {
        "postgres" => {
            tracing::info!("Connecting to database...");
            let pool = DatabasePool::connect(&config.database)
                .await
                .context("Database connection failed")?;

            tracing::info!("Running database migrations...");
            boxoffice_database::migration::run_migrations(pool.pool())
                .await
                .context("Migration failed")?;

            if !config.admission.inventory.seed.is_empty() {
                tracing::warn!("Inventory seed is only loaded by the memory backend; ignoring it");
            }

            let repo = TicketTypeRepository::new(pool.pool().clone());
            let store = PgInventoryStore::new(repo, config.admission.inventory.operation_timeout());
            Ok((Arc::new(store), Some(pool)))
        }
        "memory" => {
            let seed = &config.admission.inventory.seed;
            let store = MemoryInventoryStore::seeded(seed).context("Invalid inventory seed")?;
            tracing::warn!(
                ticket_types = seed.len(),
                "Using in-memory inventory; stock is not persisted"
            );
            Ok((Arc::new(store), None))
        }
        other => anyhow::bail!("Unknown inventory backend '{other}'"),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
