//! Cache configuration
//!
//! All tunables are supplied once at construction; there is no hidden
//! global state. Pattern-detection thresholds are heuristic constants
//! carried as named, overridable fields rather than hard-coded literals.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default L1 (memory) capacity (50MB)
pub const DEFAULT_L1_CAPACITY: u64 = 50 * 1024 * 1024;

/// Default L2 (distributed) capacity (500MB)
pub const DEFAULT_L2_CAPACITY: u64 = 500 * 1024 * 1024;

/// Default L3 (persistent) capacity (2000MB)
pub const DEFAULT_L3_CAPACITY: u64 = 2000 * 1024 * 1024;

/// Default global access-history ring buffer capacity
pub const DEFAULT_RING_CAPACITY: usize = 1000;

/// Default per-key event history cap
pub const DEFAULT_KEY_EVENT_CAPACITY: usize = 50;

/// Default per-key timestamp history cap
pub const DEFAULT_KEY_TIMESTAMP_CAPACITY: usize = 100;

/// Write strategy applied by the coordinator on `set`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteStrategy {
    /// Write to L1, L2, L3 synchronously; success is the AND of all three.
    /// Non-transactional: a failure on one tier does not roll back writes
    /// already applied to earlier tiers.
    #[default]
    WriteThrough,
    /// Write only to L1; replication to L2/L3 is deferred to the
    /// background synchronizer.
    WriteBack,
    /// Write only to L3, bypassing L1/L2. Used for cold/bulk writes that
    /// should not evict hot data.
    WriteAround,
}

/// Read strategy applied by the coordinator on `get`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadStrategy {
    /// Check tiers in increasing-latency order (L1, L2, L3), promoting
    /// on lower-tier hits.
    #[default]
    ReadThrough,
}

/// Eviction policy for capacity pressure within a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Evict entries by ascending `last_accessed`
    #[default]
    Lru,
}

/// Heuristic thresholds for access-pattern classification
#[derive(Debug, Clone)]
pub struct PatternThresholds {
    /// Minimum timestamps required before classifying (below: Random)
    pub min_samples: usize,
    /// Coefficient-of-variation bound for Periodic
    pub cv_periodic: f64,
    /// Coefficient-of-variation bound for Temporal
    pub cv_temporal: f64,
    /// Intervals shorter than this count toward the burst-short fraction
    pub burst_short: Duration,
    /// Intervals longer than this count toward the burst-long fraction
    pub burst_long: Duration,
    /// Minimum fraction of short intervals for Burst
    pub burst_short_fraction: f64,
    /// Minimum fraction of long intervals for Burst
    pub burst_long_fraction: f64,
    /// How many recent global events to scan for Sequential neighbors
    pub sequential_window: usize,
    /// Minimum distinct neighbor keys sharing the prefix for Sequential
    pub sequential_min_neighbors: usize,
    /// Recent-half frequency must exceed older-half by this factor for Trending
    pub trending_ratio: f64,
}

impl Default for PatternThresholds {
    fn default() -> Self {
        Self {
            min_samples: 5,
            cv_periodic: 0.1,
            cv_temporal: 0.3,
            burst_short: Duration::from_secs(60),
            burst_long: Duration::from_secs(300),
            burst_short_fraction: 0.3,
            burst_long_fraction: 0.2,
            sequential_window: 20,
            sequential_min_neighbors: 3,
            trending_ratio: 1.5,
        }
    }
}

/// Prediction engine tunables
#[derive(Debug, Clone)]
pub struct PredictionConfig {
    /// Minimum global access count for a key to be considered a hotspot
    pub min_access_frequency: u64,
    /// Minimum confidence for a prefetch recommendation
    pub prefetch_confidence_threshold: f64,
    /// Default prediction window
    pub prediction_window: Duration,
    /// Horizon used when generating prefetch recommendations
    pub prefetch_horizon: Duration,
    /// Prefetch recommendations only cover accesses at least this far out
    pub prefetch_min_lead: Duration,
    /// Prefetch recommendations only cover accesses at most this far out
    pub prefetch_max_lead: Duration,
    /// Cap on predictions returned per batch
    pub max_predictions: usize,
    /// Cap on prefetch recommendations per batch
    pub max_prefetch_keys: usize,
    /// Cap on TTL recommendations per batch
    pub max_ttl_recommendations: usize,
    /// Fraction of the average access interval used as the optimal TTL
    pub ttl_interval_fraction: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            min_access_frequency: 3,
            prefetch_confidence_threshold: 0.7,
            prediction_window: Duration::from_secs(24 * 3600),
            prefetch_horizon: Duration::from_secs(2 * 3600),
            prefetch_min_lead: Duration::from_secs(60),
            prefetch_max_lead: Duration::from_secs(1800),
            max_predictions: 50,
            max_prefetch_keys: 10,
            max_ttl_recommendations: 20,
            ttl_interval_fraction: 0.8,
        }
    }
}

/// Background worker tunables
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often the write-back synchronizer drains dirty keys
    pub flush_interval: Duration,
    /// Maximum dirty keys replicated per flush
    pub flush_batch_size: usize,
    /// How often the maintenance worker sweeps expired entries
    pub maintenance_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_millis(500),
            flush_batch_size: 64,
            maintenance_interval: Duration::from_secs(30),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Tier capacities in bytes
    pub capacity: TierCapacities,
    /// Write strategy
    pub write_strategy: WriteStrategy,
    /// Read strategy
    pub read_strategy: ReadStrategy,
    /// Eviction policy
    pub eviction_policy: EvictionPolicy,
    /// Access history bounds
    pub history: HistoryConfig,
    /// Pattern classification thresholds
    pub thresholds: PatternThresholds,
    /// Prediction engine tunables
    pub prediction: PredictionConfig,
    /// Background worker tunables
    pub worker: WorkerConfig,
}

/// Per-tier capacity in bytes
#[derive(Debug, Clone)]
pub struct TierCapacities {
    pub l1_bytes: u64,
    pub l2_bytes: u64,
    pub l3_bytes: u64,
}

impl Default for TierCapacities {
    fn default() -> Self {
        Self {
            l1_bytes: DEFAULT_L1_CAPACITY,
            l2_bytes: DEFAULT_L2_CAPACITY,
            l3_bytes: DEFAULT_L3_CAPACITY,
        }
    }
}

/// Bounds for recorded access history
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Global access-event ring buffer capacity
    pub ring_capacity: usize,
    /// Most recent events retained per key
    pub key_event_capacity: usize,
    /// Most recent timestamps retained per key
    pub key_timestamp_capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            ring_capacity: DEFAULT_RING_CAPACITY,
            key_event_capacity: DEFAULT_KEY_EVENT_CAPACITY,
            key_timestamp_capacity: DEFAULT_KEY_TIMESTAMP_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.capacity.l1_bytes == 0 || self.capacity.l2_bytes == 0 || self.capacity.l3_bytes == 0
        {
            return Err(Error::Config(
                "tier capacities must be non-zero".to_string(),
            ));
        }
        if self.history.ring_capacity == 0 {
            return Err(Error::Config(
                "access history ring capacity must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.prediction.prefetch_confidence_threshold) {
            return Err(Error::Config(
                "prefetch confidence threshold must be within [0, 1]".to_string(),
            ));
        }
        if self.thresholds.min_samples < 2 {
            return Err(Error::Config(
                "pattern classification needs at least 2 samples".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
