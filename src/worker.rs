//! Background workers
//!
//! Periodic tasks supervising the cache: the write-back synchronizer
//! drains dirty keys into L2/L3, and the maintenance worker sweeps
//! expired entries. Both observe a cancellation token and leave cache
//! structures consistent on shutdown (the synchronizer runs one final
//! drain before exiting).

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::coordinator::CacheCoordinator;

/// Replicates write-back entries from L1 into L2/L3 on an interval
pub struct WriteBackSynchronizer {
    coordinator: Arc<CacheCoordinator>,
    config: WorkerConfig,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WriteBackSynchronizer {
    pub fn new(coordinator: Arc<CacheCoordinator>) -> Self {
        let config = coordinator.config().worker.clone();
        Self {
            coordinator,
            config,
            shutdown: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the flush loop. Idempotent; a second call is a no-op.
    pub fn start(&self) {
        let mut guard = self.handle.lock();
        if guard.is_some() {
            warn!("write-back synchronizer already running");
            return;
        }

        let coordinator = Arc::clone(&self.coordinator);
        let batch_size = self.config.flush_batch_size;
        let flush_interval = self.config.flush_interval;
        let shutdown = self.shutdown.clone();

        *guard = Some(tokio::spawn(async move {
            info!(interval_ms = flush_interval.as_millis() as u64, "write-back synchronizer started");
            let mut ticker = interval(flush_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let flushed = coordinator.flush_write_back(batch_size).await;
                        if flushed > 0 {
                            debug!(flushed, "write-back flush completed");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        // Final drain so no acknowledged write is left
                        // only in L1 on shutdown
                        let remaining = coordinator.pending_write_back_len();
                        if remaining > 0 {
                            let flushed = coordinator.flush_write_back(remaining).await;
                            info!(flushed, "final write-back drain on shutdown");
                        }
                        break;
                    }
                }
            }
            info!("write-back synchronizer stopped");
        }));
    }

    /// Signal shutdown and wait for the final drain to finish
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "write-back synchronizer task panicked");
            }
        }
    }
}

/// Sweeps expired L1 entries on an interval
pub struct MaintenanceWorker {
    coordinator: Arc<CacheCoordinator>,
    config: WorkerConfig,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MaintenanceWorker {
    pub fn new(coordinator: Arc<CacheCoordinator>) -> Self {
        let config = coordinator.config().worker.clone();
        Self {
            coordinator,
            config,
            shutdown: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the maintenance loop. Idempotent; a second call is a no-op.
    pub fn start(&self) {
        let mut guard = self.handle.lock();
        if guard.is_some() {
            warn!("maintenance worker already running");
            return;
        }

        let coordinator = Arc::clone(&self.coordinator);
        let sweep_interval = self.config.maintenance_interval;
        let history_max_age = coordinator.config().prediction.prediction_window;
        let shutdown = self.shutdown.clone();

        *guard = Some(tokio::spawn(async move {
            info!(interval_secs = sweep_interval.as_secs(), "maintenance worker started");
            let mut ticker = interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = coordinator.sweep_expired().await;
                        if removed > 0 {
                            debug!(removed, "maintenance sweep removed expired entries");
                        }
                        let pruned = coordinator.analyzer().prune_stale_keys(history_max_age);
                        if pruned > 0 {
                            debug!(pruned, "pruned stale access histories");
                        }
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
            info!("maintenance worker stopped");
        }));
    }

    /// Signal shutdown and wait for the loop to exit
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "maintenance worker task panicked");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
