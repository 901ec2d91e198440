//! Storage tiers
//!
//! Three tiers of increasing latency and capacity behind one contract:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Cache Coordinator                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  L1 (memory)         │ L2 (distributed)    │ L3 (persistent)    │
//! │  ┌───────────────┐   │ ┌────────────────┐  │ ┌───────────────┐  │
//! │  │ In-process    │   │ │ RemoteBackend  │  │ │ RemoteBackend │  │
//! │  │ index, 50MB   │   │ │ 500MB          │  │ │ 2000MB        │  │
//! │  └───────────────┘   │ └────────────────┘  │ └───────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tier owns its own eviction bookkeeping and statistics. I/O
//! failures reaching L2/L3 are absorbed at the tier boundary: a failed
//! read is a miss, a failed write returns `false`. L1 operations never
//! suspend; L2/L3 may await backend I/O.

mod memory;
mod remote;

pub mod distributed;
pub mod persistent;

pub use distributed::DistributedTier;
pub use memory::MemoryTier;
pub use persistent::PersistentTier;
pub use remote::{InMemoryBackend, RemoteBackend};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entry::CacheEntry;
use crate::error::Result;
use crate::stats::StatisticsSnapshot;

/// One storage layer in the cache hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TierLevel {
    /// Fast in-process memory
    L1,
    /// Distributed/networked tier
    L2,
    /// Persistent tier
    L3,
}

impl std::fmt::Display for TierLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TierLevel::L1 => write!(f, "L1 (memory)"),
            TierLevel::L2 => write!(f, "L2 (distributed)"),
            TierLevel::L3 => write!(f, "L3 (persistent)"),
        }
    }
}

/// Contract implemented identically by all three tiers
#[async_trait]
pub trait Tier: Send + Sync {
    /// Which layer this tier occupies
    fn level(&self) -> TierLevel;

    /// Capacity in bytes
    fn max_size_bytes(&self) -> u64;

    /// Look up an entry. Expired entries are removed lazily and reported
    /// as a miss; hits update `last_accessed` and `access_count`.
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Store an entry, evicting by ascending `last_accessed` until it
    /// fits. An entry larger than the tier itself is rejected with
    /// [`crate::Error::CapacityExceeded`]. Backend I/O failure yields
    /// `Ok(false)`.
    async fn set(&self, entry: CacheEntry) -> Result<bool>;

    /// Remove an entry, returning whether it existed
    async fn delete(&self, key: &str) -> bool;

    /// Drop all entries
    async fn clear(&self);

    /// `(entry_count, total_bytes)` currently held
    fn size_info(&self) -> (u64, u64);

    /// Snapshot of this tier's statistics
    fn statistics(&self) -> StatisticsSnapshot;
}

// =============================================================================
// Tests
// =============================================================================
