//! StrataCache - Multi-Tier Predictive Cache
//!
//! A three-tier cache with heuristic access-pattern analysis and
//! prefetch/TTL prediction. L1 is in-process memory, L2 and L3 sit
//! behind a pluggable backend trait so a distributed cache and a
//! persistent store slot in without touching the coordinator.
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────────┐
//!   get/set/delete → │ CacheCoordinator │ ← statistics, optimization
//!                    └───────┬──────────┘
//!            ┌───────────────┼────────────────┐
//!            ▼               ▼                ▼
//!      ┌──────────┐   ┌────────────┐  ┌────────────┐
//!      │ L1 memory│   │ L2 distrib.│  │ L3 persist.│
//!      └──────────┘   └────────────┘  └────────────┘
//!                            │                │
//!                      RemoteBackend    RemoteBackend
//!
//!   every access ──→ AccessPatternAnalyzer ──→ PredictionEngine
//!                    (ring buffer, per-key     (predictions, prefetch,
//!                     pattern classification)   TTL advice, efficiency)
//! ```
//!
//! Reads check tiers in increasing-latency order and promote entries on
//! lower-tier hits. Writes follow a configurable strategy: write-through
//! (all tiers synchronously), write-back (L1 now, L2/L3 via the
//! background synchronizer), or write-around (L3 only).
//!
//! # Modules
//!
//! - [`analyzer`] - Access history and pattern classification
//! - [`config`] - Construction-time configuration
//! - [`coordinator`] - Tier orchestration and statistics
//! - [`entry`] - Cache entry and priority types
//! - [`error`] - Error types
//! - [`prediction`] - Predictions, prefetch and TTL advice
//! - [`stats`] - Per-tier and global statistics
//! - [`tier`] - Tier trait and the three implementations
//! - [`worker`] - Cancellable background workers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use stratacache::{CacheConfig, CacheCoordinator, PredictionEngine, SetOptions};
//!
//! # async fn run() -> stratacache::Result<()> {
//! let coordinator = Arc::new(CacheCoordinator::new(CacheConfig::default())?);
//! let engine = PredictionEngine::new(Arc::clone(&coordinator));
//!
//! coordinator
//!     .set("user:42:profile", Bytes::from_static(b"{}"), SetOptions::default())
//!     .await?;
//! let value = coordinator.get("user:42:profile").await;
//! assert!(value.is_some());
//!
//! for key in engine.generate_prefetch_recommendations(None) {
//!     coordinator.prefetch(&[key]).await;
//! }
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod config;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod prediction;
pub mod stats;
pub mod tier;
pub mod worker;

// Re-export commonly used types
pub use analyzer::{AccessEvent, AccessPattern, AccessPatternAnalyzer};
pub use config::{CacheConfig, EvictionPolicy, ReadStrategy, WriteStrategy};
pub use coordinator::{CacheCoordinator, SetOptions};
pub use entry::{CacheEntry, Priority};
pub use error::{Error, Result};
pub use prediction::{
    AccessPrediction, EfficiencyRating, EfficiencyReport, PredictionEngine, TtlRecommendation,
};
pub use stats::{ComprehensiveStatistics, StatisticsSnapshot};
pub use tier::{
    DistributedTier, InMemoryBackend, MemoryTier, PersistentTier, RemoteBackend, Tier, TierLevel,
};
pub use worker::{MaintenanceWorker, WriteBackSynchronizer};
