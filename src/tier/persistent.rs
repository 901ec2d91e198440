//! L3 tier - persistent storage
//!
//! Highest-capacity, highest-latency tier over a durable backend (a
//! database or object store in a real deployment). Like L2 it is
//! specified only at the [`RemoteBackend`] boundary; whatever atomicity
//! the real backend provides is what the tier gets.

use std::sync::Arc;

use async_trait::async_trait;

use super::remote::BackendTier;
use super::{InMemoryBackend, RemoteBackend, Tier, TierLevel};
use crate::entry::CacheEntry;
use crate::error::Result;
use crate::stats::StatisticsSnapshot;

/// L3 cache tier over a persistent backend
pub struct PersistentTier {
    inner: BackendTier,
}

impl PersistentTier {
    /// Create a persistent tier over the given backend
    pub fn new(max_size_bytes: u64, backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            inner: BackendTier::new(TierLevel::L3, max_size_bytes, backend),
        }
    }

    /// Create with an in-memory backend (single-process deployments, tests)
    pub fn in_memory(max_size_bytes: u64) -> Self {
        Self::new(max_size_bytes, Arc::new(InMemoryBackend::new(TierLevel::L3)))
    }
}

#[async_trait]
impl Tier for PersistentTier {
    fn level(&self) -> TierLevel {
        self.inner.level()
    }

    fn max_size_bytes(&self) -> u64 {
        self.inner.max_size_bytes()
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.inner.get(key).await
    }

    async fn set(&self, entry: CacheEntry) -> Result<bool> {
        self.inner.set(entry).await
    }

    async fn delete(&self, key: &str) -> bool {
        self.inner.delete(key).await
    }

    async fn clear(&self) {
        self.inner.clear().await
    }

    fn size_info(&self) -> (u64, u64) {
        self.inner.size_info()
    }

    fn statistics(&self) -> StatisticsSnapshot {
        self.inner.statistics()
    }
}

// =============================================================================
// Tests
// =============================================================================
