//! Cache-sync worker.
//!
//! Write-behind snapshot invalidation runs on a single background task fed
//! by a bounded queue. Commands are applied in submission order and retried
//! with linear backoff; commands that exhaust their attempts are published
//! on a broadcast channel and counted instead of being dropped silently.
//! [`FailureLog`] listens on that channel and keeps the latest failure for
//! health reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{RwLock, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use boxoffice_core::config::CacheSyncConfig;
use boxoffice_core::error::AppError;
use boxoffice_core::result::AppResult;
use boxoffice_core::traits::CoordinationStore;

use crate::provider::StoreManager;

/// Capacity of the failure broadcast channel.
const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// A unit of work for the cache-sync worker.
#[derive(Debug)]
enum SyncCommand {
    /// Delete a cached key.
    Invalidate { key: String },
    /// Signal once every earlier command has been applied.
    Flush(oneshot::Sender<()>),
}

impl SyncCommand {
    fn operation(&self) -> &'static str {
        match self {
            Self::Invalidate { .. } => "invalidate",
            Self::Flush(_) => "flush",
        }
    }
}

/// A cache write that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Affected key.
    pub key: String,
    /// Command that failed, e.g. `"invalidate"`.
    pub operation: &'static str,
    /// Attempts made before giving up (0 when the queue was full).
    pub attempts: u32,
    /// Last error observed.
    pub error: String,
}

/// Handle for submitting work to the cache-sync worker.
#[derive(Debug, Clone)]
pub struct CacheSync {
    tx: mpsc::Sender<SyncCommand>,
    failures: broadcast::Sender<SyncFailure>,
    failed_total: Arc<AtomicU64>,
}

impl CacheSync {
    /// Spawn the worker task.
    ///
    /// The task runs until `cancel` flips to `true` or every handle is
    /// dropped; on cancellation commands already queued are still applied.
    pub fn spawn(
        store: StoreManager,
        config: &CacheSyncConfig,
        cancel: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        let failed_total = Arc::new(AtomicU64::new(0));

        let handle = Self {
            tx,
            failures: failures.clone(),
            failed_total: Arc::clone(&failed_total),
        };

        let worker = SyncWorker {
            store,
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_millis(config.backoff_ms),
            failures,
            failed_total,
        };

        let task = tokio::spawn(worker.run(rx, cancel));
        (handle, task)
    }

    /// Queue deletion of `key`.
    pub fn invalidate(&self, key: impl Into<String>) {
        self.submit(SyncCommand::Invalidate { key: key.into() });
    }

    /// Wait until every command submitted before this call has been applied
    /// or reported as failed.
    pub async fn flush(&self) -> AppResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(SyncCommand::Flush(done_tx))
            .await
            .map_err(|_| AppError::internal("Cache-sync worker has stopped"))?;
        done_rx
            .await
            .map_err(|_| AppError::internal("Cache-sync worker stopped before flush completed"))
    }

    /// Subscribe to failed cache writes.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<SyncFailure> {
        self.failures.subscribe()
    }

    /// Number of cache writes given up on since start.
    pub fn failed_total(&self) -> u64 {
        self.failed_total.load(Ordering::Relaxed)
    }

    fn submit(&self, command: SyncCommand) {
        if let Err(err) = self.tx.try_send(command) {
            let (reason, command) = match err {
                mpsc::error::TrySendError::Full(c) => ("queue full", c),
                mpsc::error::TrySendError::Closed(c) => ("worker stopped", c),
            };
            let key = match &command {
                SyncCommand::Invalidate { key } => key.clone(),
                SyncCommand::Flush(_) => String::new(),
            };
            warn!(key = %key, reason, "Cache-sync command rejected");
            report(
                &self.failures,
                &self.failed_total,
                SyncFailure {
                    key,
                    operation: command.operation(),
                    attempts: 0,
                    error: reason.to_string(),
                },
            );
        }
    }
}

/// Latest cache-sync failure, kept current by a listener task.
#[derive(Debug, Clone, Default)]
pub struct FailureLog {
    last: Arc<RwLock<Option<SyncFailure>>>,
}

impl FailureLog {
    /// Listen on `sync`'s failure channel until every sender is gone.
    pub fn spawn(sync: &CacheSync) -> (Self, JoinHandle<()>) {
        let log = Self::default();
        let last = Arc::clone(&log.last);
        let mut failures = sync.subscribe_failures();

        let task = tokio::spawn(async move {
            loop {
                match failures.recv().await {
                    Ok(failure) => *last.write().await = Some(failure),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Cache-sync failure log fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        (log, task)
    }

    /// The most recent failure, if any.
    pub async fn last(&self) -> Option<SyncFailure> {
        self.last.read().await.clone()
    }
}

fn report(
    failures: &broadcast::Sender<SyncFailure>,
    failed_total: &AtomicU64,
    failure: SyncFailure,
) {
    failed_total.fetch_add(1, Ordering::Relaxed);
    // No subscribers is fine; the counter still records the failure.
    let _ = failures.send(failure);
}

struct SyncWorker {
    store: StoreManager,
    max_attempts: u32,
    backoff: Duration,
    failures: broadcast::Sender<SyncFailure>,
    failed_total: Arc<AtomicU64>,
}

impl SyncWorker {
    async fn run(self, mut rx: mpsc::Receiver<SyncCommand>, mut cancel: watch::Receiver<bool>) {
        info!(
            max_attempts = self.max_attempts,
            backoff_ms = self.backoff.as_millis() as u64,
            "Cache-sync worker started"
        );

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                command = rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => {
                        info!("Cache-sync worker stopped: all handles dropped");
                        return;
                    }
                },
            }
        }

        rx.close();
        let mut drained = 0usize;
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
            drained += 1;
        }
        info!(drained, "Cache-sync worker shut down");
    }

    async fn handle(&self, command: SyncCommand) {
        let operation = command.operation();
        let (key, result) = match command {
            SyncCommand::Flush(done) => {
                let _ = done.send(());
                return;
            }
            SyncCommand::Invalidate { key } => {
                let result = self.with_retry(|| self.store.delete(&key)).await.map(|_| ());
                (key, result)
            }
        };

        match result {
            Ok(()) => debug!(key = %key, operation, "Cache-sync command applied"),
            Err(err) => {
                error!(
                    key = %key,
                    operation,
                    attempts = self.max_attempts,
                    error = %err,
                    "Cache-sync command failed after retries"
                );
                report(
                    &self.failures,
                    &self.failed_total,
                    SyncFailure {
                        key,
                        operation,
                        attempts: self.max_attempts,
                        error: err.to_string(),
                    },
                );
            }
        }
    }

    async fn with_retry<T, F, Fut>(&self, mut call: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = AppResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => return Err(err),
                Err(err) => {
                    debug!(attempt, error = %err, "Cache-sync attempt failed, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;
    use boxoffice_core::config::{MemoryStoreConfig, StoreConfig};
    use boxoffice_core::traits::WindowCount;

    use crate::memory::MemoryStore;

    fn sync_config() -> CacheSyncConfig {
        CacheSyncConfig {
            queue_capacity: 16,
            max_attempts: 3,
            backoff_ms: 1,
        }
    }

    /// Store whose deletes fail a fixed number of times before succeeding.
    #[derive(Debug)]
    struct FlakyStore {
        remaining_failures: AtomicU32,
        delete_calls: AtomicU32,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                remaining_failures: AtomicU32::new(failures),
                delete_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl CoordinationStore for FlakyStore {
        async fn get(&self, _key: &str) -> AppResult<Option<String>> {
            Ok(None)
        }
        async fn get_with_ttl(&self, _key: &str) -> AppResult<Option<(String, Option<Duration>)>> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<()> {
            Err(AppError::store_unavailable("down"))
        }
        async fn delete(&self, _key: &str) -> AppResult<bool> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            let left = self.remaining_failures.load(Ordering::SeqCst);
            if left > 0 {
                self.remaining_failures.store(left - 1, Ordering::SeqCst);
                return Err(AppError::store_unavailable("blip"));
            }
            Ok(true)
        }
        async fn exists(&self, _key: &str) -> AppResult<bool> {
            Ok(false)
        }
        async fn set_nx(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<bool> {
            Ok(true)
        }
        async fn incr_window(&self, _key: &str, window: Duration) -> AppResult<WindowCount> {
            Ok(WindowCount {
                count: 1,
                ttl: window,
            })
        }
        async fn health_check(&self) -> AppResult<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_invalidations_apply_in_order() {
        let memory = Arc::new(MemoryStore::new(
            &MemoryStoreConfig::default(),
            StoreConfig::default().key_prefix,
        ));
        let store = StoreManager::from_provider(memory.clone(), Duration::from_secs(1));
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let (sync, _task) = CacheSync::spawn(store, &sync_config(), cancel_rx);

        memory.set("a", "1", Duration::from_secs(60)).await.unwrap();
        memory.set("b", "2", Duration::from_secs(60)).await.unwrap();
        sync.invalidate("a");
        sync.flush().await.unwrap();

        assert_eq!(memory.get("a").await.unwrap(), None);
        assert_eq!(memory.get("b").await.unwrap(), Some("2".to_string()));
        assert_eq!(sync.failed_total(), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let flaky = Arc::new(FlakyStore::new(2));
        let store = StoreManager::from_provider(flaky.clone(), Duration::from_secs(1));
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let (sync, _task) = CacheSync::spawn(store, &sync_config(), cancel_rx);

        sync.invalidate("snapshot");
        sync.flush().await.unwrap();

        assert_eq!(flaky.delete_calls.load(Ordering::SeqCst), 3);
        assert_eq!(sync.failed_total(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_reported() {
        let flaky = Arc::new(FlakyStore::new(u32::MAX));
        let store = StoreManager::from_provider(flaky, Duration::from_secs(1));
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let (sync, _task) = CacheSync::spawn(store, &sync_config(), cancel_rx);
        let mut failures = sync.subscribe_failures();

        sync.invalidate("snapshot");
        sync.flush().await.unwrap();

        let failure = failures.recv().await.unwrap();
        assert_eq!(failure.key, "snapshot");
        assert_eq!(failure.operation, "invalidate");
        assert_eq!(failure.attempts, 3);
        assert_eq!(sync.failed_total(), 1);
    }

    #[tokio::test]
    async fn test_cancel_drains_queued_commands() {
        let memory = Arc::new(MemoryStore::new(&MemoryStoreConfig::default(), ""));
        let store = StoreManager::from_provider(memory.clone(), Duration::from_secs(1));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (sync, task) = CacheSync::spawn(store, &sync_config(), cancel_rx);

        memory.set("k", "v", Duration::from_secs(60)).await.unwrap();
        sync.invalidate("k");
        cancel_tx.send(true).unwrap();
        task.await.unwrap();

        assert_eq!(memory.get("k").await.unwrap(), None);
        assert!(sync.flush().await.is_err());
    }

    #[tokio::test]
    async fn test_failure_log_keeps_latest_failure() {
        let flaky = Arc::new(FlakyStore::new(u32::MAX));
        let store = StoreManager::from_provider(flaky, Duration::from_secs(1));
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let (sync, _task) = CacheSync::spawn(store, &sync_config(), cancel_rx);
        let (log, _listener) = FailureLog::spawn(&sync);
        assert_eq!(log.last().await, None);

        sync.invalidate("snapshot:first");
        sync.invalidate("snapshot:second");
        sync.flush().await.unwrap();

        let latest = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                match log.last().await {
                    Some(failure) if failure.key == "snapshot:second" => break failure,
                    _ => tokio::task::yield_now().await,
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(latest.operation, "invalidate");
        assert_eq!(latest.attempts, 3);
    }
}
