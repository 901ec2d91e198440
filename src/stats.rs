//! Cache statistics
//!
//! Atomic counters embedded in each tier and aggregated globally. Counters
//! are updated incrementally on every operation and are never silently
//! reset; access latency is tracked with an exponential moving average.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// EMA smoothing factor for latency tracking
const LATENCY_EMA_ALPHA: f64 = 0.1;

/// Update an EMA latency counter (microseconds) in place
pub(crate) fn update_latency_ema(target: &AtomicU64, duration: Duration) {
    let new_us = duration.as_micros() as u64;

    loop {
        let current = target.load(Ordering::Relaxed);
        let updated = if current == 0 {
            new_us
        } else {
            ((1.0 - LATENCY_EMA_ALPHA) * current as f64 + LATENCY_EMA_ALPHA * new_us as f64) as u64
        };

        if target
            .compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            break;
        }
    }
}

/// Live statistics for one tier
#[derive(Debug, Default)]
pub struct TierStatistics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    prefetches: AtomicU64,
    total_size_bytes: AtomicU64,
    entry_count: AtomicU64,
    access_time_us: AtomicU64,
}

impl TierStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self, latency: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        update_latency_ema(&self.access_time_us, latency);
    }

    pub fn record_miss(&self, latency: Duration) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        update_latency_ema(&self.access_time_us, latency);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_prefetch(&self) {
        self.prefetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Account for a newly stored entry
    pub fn entry_added(&self, size_bytes: u64) {
        self.entry_count.fetch_add(1, Ordering::Relaxed);
        self.total_size_bytes.fetch_add(size_bytes, Ordering::Relaxed);
    }

    /// Account for a removed entry (delete, eviction, or lazy expiry)
    pub fn entry_removed(&self, size_bytes: u64) {
        let _ = self
            .entry_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
        let _ = self
            .total_size_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(size_bytes))
            });
    }

    /// Zero the contents accounting after a `clear`. Hit/miss/eviction
    /// counters are cumulative and stay untouched.
    pub fn contents_cleared(&self) {
        self.entry_count.store(0, Ordering::Relaxed);
        self.total_size_bytes.store(0, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.total_size_bytes.load(Ordering::Relaxed)
    }

    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Point-in-time snapshot with derived ratios
    pub fn snapshot(&self, max_size_bytes: u64) -> StatisticsSnapshot {
        let total_size_bytes = self.total_size_bytes();
        StatisticsSnapshot {
            hit_count: self.hits(),
            miss_count: self.misses(),
            eviction_count: self.evictions(),
            prefetch_count: self.prefetches.load(Ordering::Relaxed),
            total_size_bytes,
            entry_count: self.entry_count(),
            average_access_time_ms: self.access_time_us.load(Ordering::Relaxed) as f64 / 1000.0,
            hit_ratio: self.hit_ratio(),
            memory_efficiency: if max_size_bytes == 0 {
                0.0
            } else {
                total_size_bytes as f64 / max_size_bytes as f64
            },
        }
    }
}

/// Point-in-time view of one tier's statistics
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsSnapshot {
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
    pub prefetch_count: u64,
    pub total_size_bytes: u64,
    pub entry_count: u64,
    pub average_access_time_ms: f64,
    pub hit_ratio: f64,
    /// `total_size_bytes / max_size_bytes`
    pub memory_efficiency: f64,
}

/// Merged per-tier and global statistics reported by the coordinator
#[derive(Debug, Clone, Serialize)]
pub struct ComprehensiveStatistics {
    pub l1: StatisticsSnapshot,
    pub l2: StatisticsSnapshot,
    pub l3: StatisticsSnapshot,
    pub total_requests: u64,
    pub total_hits: u64,
    pub total_misses: u64,
    pub average_response_time_ms: f64,
    pub global_hit_ratio: f64,
}

// =============================================================================
// Tests
// =============================================================================
