//! Cache coordinator
//!
//! Composes the three tiers behind read-through/write-through/write-back/
//! write-around semantics, promotes entries on lower-tier hits, feeds the
//! access-pattern analyzer, and reports merged statistics.
//!
//! Construction is explicit; the coordinator is owned by the composing
//! application and carries no global state.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::analyzer::{AccessEvent, AccessPatternAnalyzer};
use crate::config::{CacheConfig, WriteStrategy};
use crate::entry::{CacheEntry, Priority};
use crate::error::Result;
use crate::stats::{update_latency_ema, ComprehensiveStatistics};
use crate::tier::{DistributedTier, MemoryTier, PersistentTier, RemoteBackend, Tier, TierLevel};

/// Options applied to a single `set`
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Optional time-to-live
    pub ttl: Option<Duration>,
    /// Relative importance
    pub priority: Priority,
    /// Write the entry only to this tier, overriding the write strategy
    pub tier_preference: Option<TierLevel>,
}

impl SetOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tier_preference(mut self, tier: TierLevel) -> Self {
        self.tier_preference = Some(tier);
        self
    }
}

/// Coordinates the three storage tiers
pub struct CacheCoordinator {
    l1: MemoryTier,
    l2: DistributedTier,
    l3: PersistentTier,
    analyzer: Arc<AccessPatternAnalyzer>,
    config: CacheConfig,

    total_requests: AtomicU64,
    total_hits: AtomicU64,
    total_misses: AtomicU64,
    response_time_us: AtomicU64,

    /// Keys written under write-back that still await replication
    pending_write_back: Mutex<VecDeque<String>>,
}

impl CacheCoordinator {
    /// Create a coordinator with in-memory L2/L3 backends
    pub fn new(config: CacheConfig) -> Result<Self> {
        let l2 = DistributedTier::in_memory(config.capacity.l2_bytes);
        let l3 = PersistentTier::in_memory(config.capacity.l3_bytes);
        Self::assemble(config, l2, l3)
    }

    /// Create a coordinator over real L2/L3 backends
    pub fn with_backends(
        config: CacheConfig,
        l2_backend: Arc<dyn RemoteBackend>,
        l3_backend: Arc<dyn RemoteBackend>,
    ) -> Result<Self> {
        let l2 = DistributedTier::new(config.capacity.l2_bytes, l2_backend);
        let l3 = PersistentTier::new(config.capacity.l3_bytes, l3_backend);
        Self::assemble(config, l2, l3)
    }

    fn assemble(config: CacheConfig, l2: DistributedTier, l3: PersistentTier) -> Result<Self> {
        config.validate()?;
        let analyzer = Arc::new(AccessPatternAnalyzer::new(
            config.history.clone(),
            config.thresholds.clone(),
        ));
        Ok(Self {
            l1: MemoryTier::new(config.capacity.l1_bytes),
            l2,
            l3,
            analyzer,
            config,
            total_requests: AtomicU64::new(0),
            total_hits: AtomicU64::new(0),
            total_misses: AtomicU64::new(0),
            response_time_us: AtomicU64::new(0),
            pending_write_back: Mutex::new(VecDeque::new()),
        })
    }

    /// Read a value, checking tiers in increasing-latency order and
    /// promoting on lower-tier hits. A tier failure is indistinguishable
    /// from a miss; `get` never errors.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let start = Instant::now();
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if let Some(entry) = self.l1.get(key).await {
            return Some(self.finish_hit(key, entry, TierLevel::L1, start).await);
        }

        if let Some(entry) = self.l2.get(key).await {
            self.promote(&entry, TierLevel::L1).await;
            return Some(self.finish_hit(key, entry, TierLevel::L2, start).await);
        }

        if let Some(entry) = self.l3.get(key).await {
            self.promote(&entry, TierLevel::L2).await;
            self.promote(&entry, TierLevel::L1).await;
            return Some(self.finish_hit(key, entry, TierLevel::L3, start).await);
        }

        self.total_misses.fetch_add(1, Ordering::Relaxed);
        let elapsed = start.elapsed();
        update_latency_ema(&self.response_time_us, elapsed);
        self.analyzer.record_access(
            AccessEvent::new(key, false).with_response_time(elapsed.as_secs_f64() * 1000.0),
        );
        None
    }

    async fn finish_hit(
        &self,
        key: &str,
        entry: CacheEntry,
        tier: TierLevel,
        start: Instant,
    ) -> Bytes {
        self.total_hits.fetch_add(1, Ordering::Relaxed);
        let elapsed = start.elapsed();
        update_latency_ema(&self.response_time_us, elapsed);
        self.analyzer.record_access(
            AccessEvent::new(key, true)
                .with_tier(tier)
                .with_response_time(elapsed.as_secs_f64() * 1000.0),
        );
        entry.value
    }

    /// Best-effort promotion into a faster tier. Never fails the caller's
    /// read; a failed promotion is logged and the hit stands.
    async fn promote(&self, entry: &CacheEntry, to: TierLevel) {
        let copy = entry.clone();
        let outcome = match to {
            TierLevel::L1 => self.l1.set(copy).await,
            TierLevel::L2 => self.l2.set(copy).await,
            TierLevel::L3 => self.l3.set(copy).await,
        };
        match outcome {
            Ok(true) => debug!(key = %entry.key, tier = %to, "promoted entry"),
            Ok(false) => warn!(key = %entry.key, tier = %to, "promotion write failed"),
            Err(e) => warn!(key = %entry.key, tier = %to, error = %e, "promotion rejected"),
        }
    }

    /// Store a raw byte payload under the configured write strategy.
    ///
    /// Write-through success is the logical AND across all three tiers;
    /// partial writes are not rolled back. `CapacityExceeded` surfaces to
    /// the caller, backend I/O failures yield `Ok(false)`.
    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: Bytes, options: SetOptions) -> Result<bool> {
        let start = Instant::now();
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut entry = CacheEntry::new(key, value, TierLevel::L1);
        if let Some(ttl) = options.ttl {
            entry = entry.with_ttl(ttl);
        }
        entry = entry.with_priority(options.priority);

        let (ok, tier) = match options.tier_preference {
            Some(tier) => (self.set_to(tier, entry).await?, tier),
            None => match self.config.write_strategy {
                WriteStrategy::WriteThrough => {
                    let ok = self.l1.set(entry.clone()).await?
                        & self.l2.set(entry.clone()).await?
                        & self.l3.set(entry).await?;
                    (ok, TierLevel::L1)
                }
                WriteStrategy::WriteBack => {
                    let ok = self.l1.set(entry).await?;
                    if ok {
                        self.pending_write_back.lock().push_back(key.to_string());
                    }
                    (ok, TierLevel::L1)
                }
                WriteStrategy::WriteAround => (self.l3.set(entry).await?, TierLevel::L3),
            },
        };

        let elapsed = start.elapsed();
        update_latency_ema(&self.response_time_us, elapsed);
        self.analyzer.record_access(
            AccessEvent::new(key, ok)
                .with_tier(tier)
                .with_response_time(elapsed.as_secs_f64() * 1000.0),
        );
        Ok(ok)
    }

    /// Serialize a value with serde_json and store the encoded bytes.
    /// Size is the serialized length (best effort); serialization
    /// failures surface as [`crate::Error::Serialization`].
    pub async fn set_serialized<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<bool> {
        let payload = Bytes::from(serde_json::to_vec(value)?);
        self.set(key, payload, options).await
    }

    async fn set_to(&self, tier: TierLevel, entry: CacheEntry) -> Result<bool> {
        match tier {
            TierLevel::L1 => self.l1.set(entry).await,
            TierLevel::L2 => self.l2.set(entry).await,
            TierLevel::L3 => self.l3.set(entry).await,
        }
    }

    /// Delete from all three tiers; success is the logical AND
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> bool {
        let l1 = self.l1.delete(key).await;
        let l2 = self.l2.delete(key).await;
        let l3 = self.l3.delete(key).await;
        self.pending_write_back.lock().retain(|k| k != key);
        l1 && l2 && l3
    }

    /// Drop all entries in every tier
    pub async fn clear_all(&self) {
        self.l1.clear().await;
        self.l2.clear().await;
        self.l3.clear().await;
        self.pending_write_back.lock().clear();
    }

    /// Issue prefetching reads for the given keys, warming faster tiers
    /// through the usual promotion path. Hits count toward the found
    /// tier's `prefetch_count`.
    pub async fn prefetch(&self, keys: &[String]) -> usize {
        let mut warmed = 0;
        for key in keys {
            // Peek L1 first so an already-hot key is not double counted
            if self.l1.peek(key).is_some() {
                continue;
            }
            if self.get(key).await.is_some() {
                // The promoted copy now lives in L1; attribute it there
                self.l1.record_prefetch();
                warmed += 1;
            }
        }
        warmed
    }

    /// Merged per-tier and global statistics
    pub fn comprehensive_statistics(&self) -> ComprehensiveStatistics {
        let total_hits = self.total_hits.load(Ordering::Relaxed);
        let total_misses = self.total_misses.load(Ordering::Relaxed);
        let lookups = total_hits + total_misses;

        ComprehensiveStatistics {
            l1: self.l1.statistics(),
            l2: self.l2.statistics(),
            l3: self.l3.statistics(),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_hits,
            total_misses,
            average_response_time_ms: self.response_time_us.load(Ordering::Relaxed) as f64
                / 1000.0,
            global_hit_ratio: if lookups == 0 {
                0.0
            } else {
                total_hits as f64 / lookups as f64
            },
        }
    }

    /// Heuristic advice on tier distribution, based on current statistics
    pub fn optimize_distribution(&self) -> Vec<String> {
        let stats = self.comprehensive_statistics();
        let mut actions = Vec::new();

        if stats.l1.hit_ratio < 0.6 && stats.l2.hit_ratio > 0.8 {
            actions.push("promote hot L2 items to L1".to_string());
        }
        if stats.l1.memory_efficiency > 0.9 {
            actions.push("increase L1 eviction rate".to_string());
        }
        if stats.l2.memory_efficiency > 0.9 {
            actions.push("move cold data from L2 to L3".to_string());
        }
        actions
    }

    /// Record an externally observed access event
    pub fn record_access(&self, event: AccessEvent) {
        self.analyzer.record_access(event);
    }

    /// Replicate up to `max` pending write-back keys into L2 and L3.
    /// Called by the background synchronizer; best-effort, a key whose L1
    /// entry was already evicted is skipped with a warning.
    pub async fn flush_write_back(&self, max: usize) -> usize {
        let keys: Vec<String> = {
            let mut pending = self.pending_write_back.lock();
            let take = max.min(pending.len());
            pending.drain(..take).collect()
        };

        let mut replicated = 0;
        for key in keys {
            let Some(entry) = self.l1.peek(&key) else {
                warn!(key = %key, "write-back entry evicted before replication");
                continue;
            };
            let l2_ok = matches!(self.l2.set(entry.clone()).await, Ok(true));
            let l3_ok = matches!(self.l3.set(entry).await, Ok(true));
            if l2_ok && l3_ok {
                replicated += 1;
            } else {
                warn!(key = %key, l2_ok, l3_ok, "write-back replication incomplete");
            }
        }
        replicated
    }

    /// Dirty keys still awaiting write-back replication
    pub fn pending_write_back_len(&self) -> usize {
        self.pending_write_back.lock().len()
    }

    /// Sweep expired L1 entries from a snapshot of the index
    pub async fn sweep_expired(&self) -> usize {
        let expired = self.l1.expired_keys();
        let mut removed = 0;
        for key in expired {
            if self.l1.delete(&key).await {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "swept expired L1 entries");
        }
        removed
    }

    /// The L1 memory tier
    pub fn l1(&self) -> &MemoryTier {
        &self.l1
    }

    /// The L2 distributed tier
    pub fn l2(&self) -> &DistributedTier {
        &self.l2
    }

    /// The L3 persistent tier
    pub fn l3(&self) -> &PersistentTier {
        &self.l3
    }

    /// The access-pattern analyzer fed by this coordinator
    pub fn analyzer(&self) -> &Arc<AccessPatternAnalyzer> {
        &self.analyzer
    }

    /// The configuration this coordinator was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
