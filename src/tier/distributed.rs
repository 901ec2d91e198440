//! L2 tier - distributed cache
//!
//! Mid-latency tier over a networked cache backend (Redis, memcached, or
//! similar in a real deployment). Specified only at the [`RemoteBackend`]
//! boundary; the wire protocol itself is out of scope.

use std::sync::Arc;

use async_trait::async_trait;

use super::remote::BackendTier;
use super::{InMemoryBackend, RemoteBackend, Tier, TierLevel};
use crate::entry::CacheEntry;
use crate::error::Result;
use crate::stats::StatisticsSnapshot;

/// L2 cache tier over a distributed backend
pub struct DistributedTier {
    inner: BackendTier,
}

impl DistributedTier {
    /// Create a distributed tier over the given backend
    pub fn new(max_size_bytes: u64, backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            inner: BackendTier::new(TierLevel::L2, max_size_bytes, backend),
        }
    }

    /// Create with an in-memory backend (single-process deployments, tests)
    pub fn in_memory(max_size_bytes: u64) -> Self {
        Self::new(max_size_bytes, Arc::new(InMemoryBackend::new(TierLevel::L2)))
    }
}

#[async_trait]
impl Tier for DistributedTier {
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

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_distributed_tier_level() {
        let tier = DistributedTier::in_memory(4096);
        assert_eq!(tier.level(), TierLevel::L2);
        assert_eq!(tier.max_size_bytes(), 4096);
    }

    #[tokio::test]
    async fn test_failure_injection_degrades_gracefully() {
        let backend = Arc::new(InMemoryBackend::new(TierLevel::L2));
        let tier = DistributedTier::new(4096, backend.clone() as Arc<dyn RemoteBackend>);

        let entry = CacheEntry::new("k", Bytes::from_static(b"v"), TierLevel::L2);
        assert!(tier.set(entry).await.unwrap());

        backend.set_failing(true);
        assert!(tier.get("k").await.is_none());

        backend.set_failing(false);
        assert!(tier.get("k").await.is_some());
    }
}
