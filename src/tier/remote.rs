//! Remote tier plumbing shared by L2 and L3
//!
//! Both lower tiers store serialized entries behind a pluggable async
//! backend. A real deployment implements [`RemoteBackend`] over a network
//! cache or a database; tests use the lock-free [`InMemoryBackend`].
//!
//! The tier keeps a local index of key -> (size, last_accessed) mirroring
//! what it wrote, which drives LRU eviction without requiring the backend
//! to support listing. Backend failures never escape the tier: reads
//! degrade to misses, writes to `false`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

use super::TierLevel;
use crate::entry::CacheEntry;
use crate::error::{Error, Result};
use crate::stats::{StatisticsSnapshot, TierStatistics};

/// Storage backend for a distributed or persistent tier
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Fetch a serialized entry
    async fn fetch(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store a serialized entry
    async fn store(&self, key: &str, payload: Bytes) -> Result<()>;

    /// Remove an entry, returning whether it existed
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Drop all entries
    async fn clear(&self) -> Result<()>;
}

/// In-memory backend for tests and single-process deployments.
///
/// Uses DashMap for lock-free concurrent access. Failure injection via
/// [`InMemoryBackend::set_failing`] exercises the tier's degraded paths.
pub struct InMemoryBackend {
    tier: TierLevel,
    objects: DashMap<String, Bytes>,
    failing: AtomicBool,
}

impl InMemoryBackend {
    pub fn new(tier: TierLevel) -> Self {
        Self {
            tier,
            objects: DashMap::new(),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent operation fail with `TierUnavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(Error::TierUnavailable {
                tier: self.tier,
                reason: "backend failure injected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteBackend for InMemoryBackend {
    async fn fetch(&self, key: &str) -> Result<Option<Bytes>> {
        self.check_available()?;
        Ok(self.objects.get(key).map(|v| v.clone()))
    }

    async fn store(&self, key: &str, payload: Bytes) -> Result<()> {
        self.check_available()?;
        self.objects.insert(key.to_string(), payload);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.objects.remove(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.check_available()?;
        self.objects.clear();
        Ok(())
    }
}

/// Index entry mirroring what the tier wrote to its backend
#[derive(Debug, Clone)]
struct IndexEntry {
    size_bytes: u64,
    last_accessed: DateTime<Utc>,
}

/// Shared implementation of a backend-based tier, parameterized by level
pub(crate) struct BackendTier {
    level: TierLevel,
    max_size_bytes: u64,
    backend: Arc<dyn RemoteBackend>,
    index: RwLock<HashMap<String, IndexEntry>>,
    stats: TierStatistics,
}

impl BackendTier {
    pub(crate) fn new(level: TierLevel, max_size_bytes: u64, backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            level,
            max_size_bytes,
            backend,
            index: RwLock::new(HashMap::new()),
            stats: TierStatistics::new(),
        }
    }

    pub(crate) fn level(&self) -> TierLevel {
        self.level
    }

    pub(crate) fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub(crate) fn size_info(&self) -> (u64, u64) {
        (self.stats.entry_count(), self.stats.total_size_bytes())
    }

    pub(crate) fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot(self.max_size_bytes)
    }

    /// Pick LRU victims until `needed` more bytes fit, removing them from
    /// the index. Backend deletes happen outside the lock.
    fn collect_victims(&self, needed: u64) -> Vec<String> {
        let mut index = self.index.write();
        if self.stats.total_size_bytes() + needed <= self.max_size_bytes {
            return Vec::new();
        }

        let mut candidates: Vec<(String, DateTime<Utc>, u64)> = index
            .iter()
            .map(|(k, e)| (k.clone(), e.last_accessed, e.size_bytes))
            .collect();
        candidates.sort_by_key(|(_, last_accessed, _)| *last_accessed);

        let mut victims = Vec::new();
        for (key, _, size) in candidates {
            if self.stats.total_size_bytes() + needed <= self.max_size_bytes {
                break;
            }
            if index.remove(&key).is_some() {
                self.stats.entry_removed(size);
                self.stats.record_eviction();
                victims.push(key);
            }
        }
        victims
    }

    /// Drop a key from the local index, adjusting content accounting
    fn drop_index_entry(&self, key: &str) {
        if let Some(old) = self.index.write().remove(key) {
            self.stats.entry_removed(old.size_bytes);
        }
    }

    /// Record `key` in the index, treating an unseen key as newly added.
    /// Entries surfacing from a backend populated out-of-band get indexed
    /// on first hit.
    fn upsert_index_entry(&self, key: &str, size_bytes: u64, last_accessed: DateTime<Utc>) {
        let mut index = self.index.write();
        match index.get_mut(key) {
            Some(existing) => existing.last_accessed = last_accessed,
            None => {
                index.insert(
                    key.to_string(),
                    IndexEntry {
                        size_bytes,
                        last_accessed,
                    },
                );
                self.stats.entry_added(size_bytes);
            }
        }
    }

    pub(crate) async fn get(&self, key: &str) -> Option<CacheEntry> {
        let start = Instant::now();

        let payload = match self.backend.fetch(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                self.drop_index_entry(key);
                self.stats.record_miss(start.elapsed());
                return None;
            }
            Err(e) => {
                warn!(tier = %self.level, key, error = %e, "backend read failed, treating as miss");
                self.stats.record_miss(start.elapsed());
                return None;
            }
        };

        let mut entry: CacheEntry = match serde_json::from_slice(&payload) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(tier = %self.level, key, error = %e, "corrupt entry, dropping");
                let _ = self.backend.remove(key).await;
                self.drop_index_entry(key);
                self.stats.record_miss(start.elapsed());
                return None;
            }
        };

        if entry.is_expired() {
            debug!(tier = %self.level, key, "lazy-expired entry");
            let _ = self.backend.remove(key).await;
            self.drop_index_entry(key);
            self.stats.record_miss(start.elapsed());
            return None;
        }

        entry.touch();
        self.upsert_index_entry(key, entry.size_bytes, entry.last_accessed);
        self.stats.record_hit(start.elapsed());
        Some(entry)
    }

    pub(crate) async fn set(&self, mut entry: CacheEntry) -> Result<bool> {
        if entry.size_bytes > self.max_size_bytes {
            return Err(Error::CapacityExceeded {
                tier: self.level,
                size: entry.size_bytes,
                max_size: self.max_size_bytes,
            });
        }

        entry.origin = self.level;
        let payload = Bytes::from(serde_json::to_vec(&entry)?);

        // Replacement of an existing key frees its old accounting first
        self.drop_index_entry(&entry.key);
        for victim in self.collect_victims(entry.size_bytes) {
            if let Err(e) = self.backend.remove(&victim).await {
                warn!(tier = %self.level, key = %victim, error = %e, "evicted entry removal failed");
            }
        }

        match self.backend.store(&entry.key, payload).await {
            Ok(()) => {
                self.upsert_index_entry(&entry.key, entry.size_bytes, entry.last_accessed);
                Ok(true)
            }
            Err(e) => {
                warn!(tier = %self.level, key = %entry.key, error = %e, "backend write failed");
                Ok(false)
            }
        }
    }

    pub(crate) async fn delete(&self, key: &str) -> bool {
        let indexed = {
            let mut index = self.index.write();
            match index.remove(key) {
                Some(old) => {
                    self.stats.entry_removed(old.size_bytes);
                    true
                }
                None => false,
            }
        };

        match self.backend.remove(key).await {
            Ok(existed) => existed || indexed,
            Err(e) => {
                warn!(tier = %self.level, key, error = %e, "backend delete failed");
                indexed
            }
        }
    }

    pub(crate) async fn clear(&self) {
        if let Err(e) = self.backend.clear().await {
            warn!(tier = %self.level, error = %e, "backend clear failed");
        }
        self.index.write().clear();
        self.stats.contents_cleared();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tier(level: TierLevel, capacity: u64) -> (BackendTier, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new(level));
        let tier = BackendTier::new(level, capacity, backend.clone() as Arc<dyn RemoteBackend>);
        (tier, backend)
    }

    fn make_entry(key: &str, payload: &[u8]) -> CacheEntry {
        CacheEntry::new(key, Bytes::copy_from_slice(payload), TierLevel::L2)
    }

    #[tokio::test]
    async fn test_round_trip_through_backend() {
        let (tier, backend) = make_tier(TierLevel::L2, 4096);

        assert!(tier.set(make_entry("k", b"value")).await.unwrap());
        assert_eq!(backend.len(), 1);

        let entry = tier.get("k").await.unwrap();
        assert_eq!(entry.value.as_ref(), b"value");
        assert_eq!(entry.origin, TierLevel::L2);
    }

    #[tokio::test]
    async fn test_backend_failure_is_a_miss() {
        let (tier, backend) = make_tier(TierLevel::L2, 4096);
        tier.set(make_entry("k", b"v")).await.unwrap();

        backend.set_failing(true);
        assert!(tier.get("k").await.is_none());
        assert_eq!(tier.statistics().miss_count, 1);
    }

    #[tokio::test]
    async fn test_backend_failure_on_write_returns_false() {
        let (tier, backend) = make_tier(TierLevel::L3, 4096);
        backend.set_failing(true);

        let stored = tier.set(make_entry("k", b"v")).await.unwrap();
        assert!(!stored);
        assert_eq!(tier.size_info(), (0, 0));
    }

    #[tokio::test]
    async fn test_oversized_entry_rejected() {
        let (tier, _) = make_tier(TierLevel::L2, 64);
        let err = tier.set(make_entry("big", &[0u8; 128])).await.unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { .. }));
    }

    #[tokio::test]
    async fn test_lru_eviction_removes_from_backend() {
        let (tier, backend) = make_tier(TierLevel::L2, 1000);

        for i in 0..5 {
            let mut entry = make_entry(&format!("k{}", i), &[0u8; 300]);
            entry.last_accessed = Utc::now() + chrono::Duration::milliseconds(i);
            tier.set(entry).await.unwrap();
        }

        let (entries, bytes) = tier.size_info();
        assert!(entries <= 3);
        assert!(bytes <= 1000);
        assert!(tier.statistics().eviction_count >= 2);
        assert_eq!(backend.len() as u64, entries);
    }

    #[tokio::test]
    async fn test_lazy_expiry() {
        let (tier, backend) = make_tier(TierLevel::L3, 4096);

        let mut entry = make_entry("k", b"v").with_ttl(std::time::Duration::from_secs(60));
        entry.created_at = Utc::now() - chrono::Duration::seconds(120);
        tier.set(entry).await.unwrap();

        assert!(tier.get("k").await.is_none());
        assert_eq!(tier.size_info().0, 0);
        assert_eq!(backend.len(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_payload_dropped() {
        let (tier, backend) = make_tier(TierLevel::L2, 4096);
        backend
            .store("bad", Bytes::from_static(b"not json"))
            .await
            .unwrap();

        assert!(tier.get("bad").await.is_none());
        assert_eq!(backend.len(), 0);
    }

    #[tokio::test]
    async fn test_delete_clears_index_and_backend() {
        let (tier, backend) = make_tier(TierLevel::L2, 4096);
        tier.set(make_entry("k", b"v")).await.unwrap();

        assert!(tier.delete("k").await);
        assert!(!tier.delete("k").await);
        assert_eq!(backend.len(), 0);
        assert_eq!(tier.size_info(), (0, 0));
    }

    #[tokio::test]
    async fn test_out_of_band_entry_indexed_on_hit() {
        let (tier, backend) = make_tier(TierLevel::L3, 4096);

        let entry = make_entry("external", b"seeded");
        let payload = Bytes::from(serde_json::to_vec(&entry).unwrap());
        backend.store("external", payload).await.unwrap();

        assert!(tier.get("external").await.is_some());
        assert_eq!(tier.size_info().0, 1);
    }
}
