//! Cache entry types
//!
//! Entries are immutable-by-replacement value records. `size_bytes` is
//! computed once at insertion and never recomputed. An entry may legally
//! exist in more than one tier at once (the result of promotion); tiers
//! converge with last-writer-wins semantics.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tier::TierLevel;

/// Relative importance of a cache entry
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// A single cached value with its bookkeeping metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key
    pub key: String,
    /// Opaque value payload
    pub value: Bytes,
    /// Tier this copy of the entry lives in
    pub origin: TierLevel,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last access timestamp (drives LRU eviction)
    pub last_accessed: DateTime<Utc>,
    /// Number of accesses observed on this copy
    pub access_count: u64,
    /// Optional time-to-live; `None` means the entry never expires
    pub ttl: Option<Duration>,
    /// Value size in bytes, fixed at insertion
    pub size_bytes: u64,
    /// Relative importance
    pub priority: Priority,
    /// Open metadata map for callers
    pub metadata: HashMap<String, serde_json::Value>,
}

impl CacheEntry {
    /// Create a new entry from a raw byte payload
    pub fn new(key: impl Into<String>, value: Bytes, origin: TierLevel) -> Self {
        let now = Utc::now();
        let size_bytes = value.len() as u64;
        Self {
            key: key.into(),
            value,
            origin,
            created_at: now,
            last_accessed: now,
            access_count: 1,
            ttl: None,
            size_bytes,
            priority: Priority::default(),
            metadata: HashMap::new(),
        }
    }

    /// Set a time-to-live
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Attach a metadata value
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Record an access, updating recency and frequency bookkeeping
    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
        self.access_count += 1;
    }

    /// Check whether the entry has outlived its TTL
    pub fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => {
                let age = Utc::now().signed_duration_since(self.created_at);
                age.to_std().map(|age| age > ttl).unwrap_or(false)
            }
            None => false,
        }
    }

    /// Age of the entry since creation
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or_default()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn make_entry(key: &str, payload: &[u8]) -> CacheEntry {
        CacheEntry::new(key, Bytes::copy_from_slice(payload), TierLevel::L1)
    }

    #[test]
    fn test_entry_creation() {
        let entry = make_entry("user:1", b"hello");
        assert_eq!(entry.key, "user:1");
        assert_eq!(entry.size_bytes, 5);
        assert_eq!(entry.access_count, 1);
        assert_eq!(entry.priority, Priority::Normal);
        assert!(entry.ttl.is_none());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_touch() {
        let mut entry = make_entry("k", b"v");
        let before = entry.last_accessed;
        entry.touch();
        assert_eq!(entry.access_count, 2);
        assert!(entry.last_accessed >= before);
    }

    #[test]
    fn test_entry_not_expired_within_ttl() {
        let entry = make_entry("k", b"v").with_ttl(Duration::from_secs(3600));
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expired_past_ttl() {
        let mut entry = make_entry("k", b"v").with_ttl(Duration::from_secs(60));
        entry.created_at = Utc::now() - ChronoDuration::seconds(120);
        assert!(entry.is_expired());
    }

    #[test]
    fn test_entry_no_ttl_never_expires() {
        let mut entry = make_entry("k", b"v");
        entry.created_at = Utc::now() - ChronoDuration::days(365);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn test_entry_serde_round_trip() {
        let entry = make_entry("k", b"payload")
            .with_ttl(Duration::from_secs(30))
            .with_metadata("source", serde_json::json!("profile-service"));

        let encoded = serde_json::to_vec(&entry).unwrap();
        let decoded: CacheEntry = serde_json::from_slice(&encoded).unwrap();

        assert_eq!(decoded.key, entry.key);
        assert_eq!(decoded.value, entry.value);
        assert_eq!(decoded.size_bytes, entry.size_bytes);
        assert_eq!(decoded.ttl, entry.ttl);
        assert_eq!(decoded.metadata, entry.metadata);
    }
}
