//! L1 tier - in-process memory
//!
//! Lowest-latency tier. A `parking_lot` RwLock guards the index and
//! eviction structures; no operation here ever suspends. Statistics are
//! atomic and safe to read concurrently.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use super::{Tier, TierLevel};
use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::stats::{StatisticsSnapshot, TierStatistics};

/// L1 cache tier backed by an in-process map
pub struct MemoryTier {
    index: RwLock<HashMap<String, CacheEntry>>,
    max_size_bytes: u64,
    stats: TierStatistics,
}

impl MemoryTier {
    /// Create a memory tier with the given capacity in bytes
    pub fn new(max_size_bytes: u64) -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
            max_size_bytes,
            stats: TierStatistics::new(),
        }
    }

    /// Look up an entry without touching access bookkeeping or statistics.
    /// Used by the write-back synchronizer and maintenance sweeps.
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.index.read().get(key).cloned()
    }

    /// Keys whose entries have outlived their TTL, from a snapshot of the
    /// index. Callers delete them afterwards (snapshot-then-swap, so a
    /// background sweep never iterates a map being mutated).
    pub fn expired_keys(&self) -> Vec<String> {
        self.index
            .read()
            .values()
            .filter(|e| e.is_expired())
            .map(|e| e.key.clone())
            .collect()
    }

    /// Count a background prefetch that landed in this tier
    pub fn record_prefetch(&self) {
        self.stats.record_prefetch();
    }

    /// Evict by ascending `last_accessed` until `needed` more bytes fit.
    /// Must be called with the write lock held.
    fn ensure_space(&self, guard: &mut HashMap<String, CacheEntry>, needed: u64) {
        if self.stats.total_size_bytes() + needed <= self.max_size_bytes {
            return;
        }

        let mut candidates: Vec<(String, DateTime<Utc>, u64)> = guard
            .values()
            .map(|e| (e.key.clone(), e.last_accessed, e.size_bytes))
            .collect();
        candidates.sort_by_key(|(_, last_accessed, _)| *last_accessed);

        for (key, _, size) in candidates {
            if self.stats.total_size_bytes() + needed <= self.max_size_bytes {
                break;
            }
            if guard.remove(&key).is_some() {
                self.stats.entry_removed(size);
                self.stats.record_eviction();
                debug!(tier = %TierLevel::L1, key = %key, size, "evicted entry");
            }
        }
    }
}

#[async_trait]
impl Tier for MemoryTier {
    fn level(&self) -> TierLevel {
        TierLevel::L1
    }

    fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let start = Instant::now();
        let mut guard = self.index.write();

        match guard.get_mut(key) {
            Some(entry) if entry.is_expired() => {
                let size = entry.size_bytes;
                guard.remove(key);
                self.stats.entry_removed(size);
                self.stats.record_miss(start.elapsed());
                debug!(tier = %TierLevel::L1, key, "lazy-expired entry");
                None
            }
            Some(entry) => {
                entry.touch();
                let found = entry.clone();
                drop(guard);
                self.stats.record_hit(start.elapsed());
                Some(found)
            }
            None => {
                drop(guard);
                self.stats.record_miss(start.elapsed());
                None
            }
        }
    }

    async fn set(&self, mut entry: CacheEntry) -> Result<bool> {
        if entry.size_bytes > self.max_size_bytes {
            return Err(Error::CapacityExceeded {
                tier: TierLevel::L1,
                size: entry.size_bytes,
                max_size: self.max_size_bytes,
            });
        }

        entry.origin = TierLevel::L1;
        let size = entry.size_bytes;
        let mut guard = self.index.write();

        if let Some(old) = guard.remove(&entry.key) {
            self.stats.entry_removed(old.size_bytes);
        }
        self.ensure_space(&mut guard, size);

        guard.insert(entry.key.clone(), entry);
        self.stats.entry_added(size);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> bool {
        let mut guard = self.index.write();
        match guard.remove(key) {
            Some(entry) => {
                self.stats.entry_removed(entry.size_bytes);
                true
            }
            None => false,
        }
    }

    async fn clear(&self) {
        self.index.write().clear();
        self.stats.contents_cleared();
    }

    fn size_info(&self) -> (u64, u64) {
        (self.stats.entry_count(), self.stats.total_size_bytes())
    }

    fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot(self.max_size_bytes)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn make_entry(key: &str, payload: &[u8]) -> CacheEntry {
        CacheEntry::new(key, Bytes::copy_from_slice(payload), TierLevel::L1)
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let tier = MemoryTier::new(1024);

        assert!(tier.set(make_entry("k", b"value")).await.unwrap());
        let entry = tier.get("k").await.unwrap();
        assert_eq!(entry.value.as_ref(), b"value");
        assert_eq!(tier.size_info(), (1, 5));
    }

    #[tokio::test]
    async fn test_miss_recorded() {
        let tier = MemoryTier::new(1024);
        assert!(tier.get("nope").await.is_none());

        let stats = tier.statistics();
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.hit_count, 0);
    }

    #[tokio::test]
    async fn test_hit_updates_access_bookkeeping() {
        let tier = MemoryTier::new(1024);
        tier.set(make_entry("k", b"v")).await.unwrap();

        tier.get("k").await.unwrap();
        let entry = tier.get("k").await.unwrap();
        assert_eq!(entry.access_count, 3);
        assert_eq!(tier.statistics().hit_count, 2);
    }

    #[tokio::test]
    async fn test_idempotent_set_counts_key_once() {
        let tier = MemoryTier::new(1024);

        tier.set(make_entry("k", b"same")).await.unwrap();
        tier.set(make_entry("k", b"same")).await.unwrap();

        assert_eq!(tier.size_info(), (1, 4));
        assert_eq!(tier.get("k").await.unwrap().value.as_ref(), b"same");
    }

    #[tokio::test]
    async fn test_oversized_entry_rejected() {
        let tier = MemoryTier::new(100);
        let err = tier.set(make_entry("big", &[0u8; 200])).await.unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { size: 200, .. }));
        assert_eq!(tier.size_info(), (0, 0));
    }

    #[tokio::test]
    async fn test_lru_eviction_under_pressure() {
        let tier = MemoryTier::new(1000);

        for i in 0..5 {
            let mut entry = make_entry(&format!("k{}", i), &[0u8; 300]);
            // Strictly increasing recency so eviction order is deterministic
            entry.last_accessed = Utc::now() + ChronoDuration::milliseconds(i);
            tier.set(entry).await.unwrap();
        }

        let (entries, bytes) = tier.size_info();
        assert!(entries <= 3);
        assert!(bytes <= 1000);
        assert!(tier.statistics().eviction_count >= 2);

        // Oldest entries went first
        assert!(tier.get("k0").await.is_none());
        assert!(tier.get("k4").await.is_some());
    }

    #[tokio::test]
    async fn test_lazy_expiry_on_get() {
        let tier = MemoryTier::new(1024);

        let mut entry = make_entry("k", b"v").with_ttl(Duration::from_secs(60));
        entry.created_at = Utc::now() - ChronoDuration::seconds(120);
        tier.set(entry).await.unwrap();
        assert_eq!(tier.size_info().0, 1);

        assert!(tier.get("k").await.is_none());
        assert_eq!(tier.size_info().0, 0);
        assert_eq!(tier.statistics().miss_count, 1);
    }

    #[tokio::test]
    async fn test_expired_keys_snapshot() {
        let tier = MemoryTier::new(1024);

        let mut stale = make_entry("stale", b"v").with_ttl(Duration::from_secs(1));
        stale.created_at = Utc::now() - ChronoDuration::seconds(10);
        tier.set(stale).await.unwrap();
        tier.set(make_entry("fresh", b"v")).await.unwrap();

        let expired = tier.expired_keys();
        assert_eq!(expired, vec!["stale".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let tier = MemoryTier::new(1024);
        tier.set(make_entry("a", b"1")).await.unwrap();
        tier.set(make_entry("b", b"2")).await.unwrap();

        assert!(tier.delete("a").await);
        assert!(!tier.delete("a").await);
        assert_eq!(tier.size_info().0, 1);

        tier.clear().await;
        assert_eq!(tier.size_info(), (0, 0));
    }

    #[tokio::test]
    async fn test_peek_does_not_touch() {
        let tier = MemoryTier::new(1024);
        tier.set(make_entry("k", b"v")).await.unwrap();

        let peeked = tier.peek("k").unwrap();
        assert_eq!(peeked.access_count, 1);
        assert_eq!(tier.statistics().hit_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        use std::sync::Arc;

        let tier = Arc::new(MemoryTier::new(10 * 1024 * 1024));
        let mut handles = Vec::new();

        for t in 0..8 {
            let tier = Arc::clone(&tier);
            handles.push(tokio::spawn(async move {
                for i in 0..100 {
                    let key = format!("k-{}-{}", t, i);
                    tier.set(make_entry(&key, &[0u8; 64])).await.unwrap();
                    tier.get(&key).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(tier.size_info().0, 800);
        assert_eq!(tier.statistics().hit_count, 800);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Whatever the insertion sequence, eviction keeps the tier
            /// within its byte budget
            #[test]
            fn occupancy_never_exceeds_capacity(
                sizes in prop::collection::vec(1u64..=300, 1..50),
            ) {
                let (entries, bytes, evictions) = tokio_test::block_on(async {
                    let tier = MemoryTier::new(1000);
                    for (i, &size) in sizes.iter().enumerate() {
                        let mut entry = CacheEntry::new(
                            format!("k{}", i),
                            Bytes::from(vec![0u8; size as usize]),
                            TierLevel::L1,
                        );
                        entry.last_accessed = Utc::now() + ChronoDuration::milliseconds(i as i64);
                        tier.set(entry).await.unwrap();
                    }
                    let (entries, bytes) = tier.size_info();
                    (entries, bytes, tier.statistics().eviction_count)
                });

                prop_assert!(bytes <= 1000);
                let total: u64 = sizes.iter().sum();
                if total <= 1000 {
                    prop_assert_eq!(entries as usize, sizes.len());
                    prop_assert_eq!(evictions, 0);
                }
            }
        }
    }
}
