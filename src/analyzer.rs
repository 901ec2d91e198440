//! Access-pattern analysis
//!
//! Records every cache access into bounded histories and classifies
//! per-key temporal behavior with heuristic, inspectable rules. The
//! classification thresholds live in [`PatternThresholds`] and are
//! configuration, not literals.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::{HistoryConfig, PatternThresholds};
use crate::error::{Error, Result};
use crate::tier::TierLevel;

/// Classified temporal behavior of a key's accesses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessPattern {
    /// Near-constant inter-access intervals
    Periodic,
    /// Regular but looser intervals
    Temporal,
    /// Clusters of rapid accesses separated by long gaps
    Burst,
    /// Accessed alongside sibling keys sharing a common prefix
    Sequential,
    /// Access frequency rising over the observed window
    Trending,
    /// No detectable structure
    Random,
}

impl std::fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AccessPattern::Periodic => "periodic",
            AccessPattern::Temporal => "temporal",
            AccessPattern::Burst => "burst",
            AccessPattern::Sequential => "sequential",
            AccessPattern::Trending => "trending",
            AccessPattern::Random => "random",
        };
        write!(f, "{}", name)
    }
}

/// Immutable record of one cache access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    pub key: String,
    pub timestamp: DateTime<Utc>,
    pub hit: bool,
    pub tier: Option<TierLevel>,
    pub response_time_ms: f64,
    pub user_id: Option<String>,
    pub context: Option<String>,
}

impl AccessEvent {
    pub fn new(key: impl Into<String>, hit: bool) -> Self {
        Self {
            key: key.into(),
            timestamp: Utc::now(),
            hit,
            tier: None,
            response_time_ms: 0.0,
            user_id: None,
            context: None,
        }
    }

    pub fn with_tier(mut self, tier: TierLevel) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn with_response_time(mut self, ms: f64) -> Self {
        self.response_time_ms = ms;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Bounded per-key history
#[derive(Debug, Default)]
struct KeyHistory {
    events: VecDeque<AccessEvent>,
    timestamps: VecDeque<DateTime<Utc>>,
}

/// Records access events and classifies per-key temporal patterns
pub struct AccessPatternAnalyzer {
    ring: RwLock<VecDeque<AccessEvent>>,
    per_key: RwLock<HashMap<String, KeyHistory>>,
    history: HistoryConfig,
    thresholds: PatternThresholds,
}

impl AccessPatternAnalyzer {
    pub fn new(history: HistoryConfig, thresholds: PatternThresholds) -> Self {
        Self {
            ring: RwLock::new(VecDeque::with_capacity(history.ring_capacity)),
            per_key: RwLock::new(HashMap::new()),
            history,
            thresholds,
        }
    }

    /// Append an event to the global ring and the key's bounded history,
    /// dropping the oldest entries once bounds are exceeded.
    pub fn record_access(&self, event: AccessEvent) {
        {
            let mut ring = self.ring.write();
            if ring.len() >= self.history.ring_capacity {
                ring.pop_front();
            }
            ring.push_back(event.clone());
        }

        let mut per_key = self.per_key.write();
        let history = per_key.entry(event.key.clone()).or_default();
        if history.events.len() >= self.history.key_event_capacity {
            history.events.pop_front();
        }
        if history.timestamps.len() >= self.history.key_timestamp_capacity {
            history.timestamps.pop_front();
        }
        history.timestamps.push_back(event.timestamp);
        history.events.push_back(event);
    }

    /// Recorded timestamps for a key, oldest first
    pub fn timestamps(&self, key: &str) -> Vec<DateTime<Utc>> {
        self.per_key
            .read()
            .get(key)
            .map(|h| h.timestamps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Keys with at least `min_samples` recorded timestamps
    pub fn keys_with_min_samples(&self, min_samples: usize) -> Vec<String> {
        self.per_key
            .read()
            .iter()
            .filter(|(_, h)| h.timestamps.len() >= min_samples)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Total events currently in the global ring
    pub fn ring_len(&self) -> usize {
        self.ring.read().len()
    }

    /// Number of keys with recorded history
    pub fn tracked_key_count(&self) -> usize {
        self.per_key.read().len()
    }

    /// Drop per-key histories whose newest timestamp is older than
    /// `max_age`, returning how many keys were removed. The global ring
    /// is bounded at insert; this bounds the key set itself on
    /// long-running, high-cardinality workloads. Pruned keys fall back
    /// to Random until re-observed.
    pub fn prune_stale_keys(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::hours(24));

        let mut per_key = self.per_key.write();
        let before = per_key.len();
        per_key.retain(|_, history| {
            history
                .timestamps
                .back()
                .map_or(false, |newest| *newest >= cutoff)
        });
        before - per_key.len()
    }

    /// The `top_n` most frequently accessed keys across the global ring
    pub fn hotspot_keys(&self, top_n: usize) -> Vec<(String, u64)> {
        self.hotspot_keys_for(top_n, None)
    }

    /// Hotspots, optionally restricted to one user's events
    pub fn hotspot_keys_for(&self, top_n: usize, user_id: Option<&str>) -> Vec<(String, u64)> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for event in self.ring.read().iter() {
            if let Some(user) = user_id {
                if event.user_id.as_deref() != Some(user) {
                    continue;
                }
            }
            *counts.entry(event.key.clone()).or_default() += 1;
        }

        let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(top_n);
        ranked
    }

    /// Classify a key's access pattern.
    ///
    /// Errors on a malformed series (non-monotonic timestamps fed via
    /// external instrumentation); callers isolate the failure per key.
    pub fn analyze_key_pattern(&self, key: &str) -> Result<AccessPattern> {
        let timestamps = self.timestamps(key);
        let t = &self.thresholds;

        if timestamps.len() < t.min_samples {
            return Ok(AccessPattern::Random);
        }

        let mut intervals = Vec::with_capacity(timestamps.len() - 1);
        for pair in timestamps.windows(2) {
            let delta = pair[1].signed_duration_since(pair[0]);
            let secs = delta.num_milliseconds() as f64 / 1000.0;
            if secs < 0.0 {
                return Err(Error::Internal(format!(
                    "non-monotonic timestamp series for key {}",
                    key
                )));
            }
            intervals.push(secs);
        }

        let mean = mean(&intervals);
        if mean <= 0.0 {
            return Ok(AccessPattern::Random);
        }
        let cv = stdev(&intervals, mean) / mean;

        if cv < t.cv_periodic {
            return Ok(AccessPattern::Periodic);
        }
        if cv < t.cv_temporal {
            return Ok(AccessPattern::Temporal);
        }
        if self.is_burst(&intervals) {
            return Ok(AccessPattern::Burst);
        }
        if self.is_sequential(key) {
            return Ok(AccessPattern::Sequential);
        }
        if self.is_trending(&timestamps) {
            return Ok(AccessPattern::Trending);
        }
        Ok(AccessPattern::Random)
    }

    /// Short intervals dominate and long gaps still make up a meaningful
    /// share of the series
    fn is_burst(&self, intervals: &[f64]) -> bool {
        let t = &self.thresholds;
        let total = intervals.len() as f64;
        let short = intervals
            .iter()
            .filter(|&&i| i < t.burst_short.as_secs_f64())
            .count() as f64;
        let long = intervals
            .iter()
            .filter(|&&i| i > t.burst_long.as_secs_f64())
            .count() as f64;

        short / total > t.burst_short_fraction && long / total > t.burst_long_fraction
    }

    /// Enough sibling keys with the same non-digit prefix appear among
    /// the most recent global events
    fn is_sequential(&self, key: &str) -> bool {
        let t = &self.thresholds;
        let prefix = non_digit_prefix(key);
        if prefix.is_empty() {
            return false;
        }

        let ring = self.ring.read();
        let recent = ring.iter().rev().take(t.sequential_window);
        let mut neighbors: Vec<&str> = Vec::new();
        for event in recent {
            if event.key != key
                && non_digit_prefix(&event.key) == prefix
                && !neighbors.contains(&event.key.as_str())
            {
                neighbors.push(&event.key);
            }
        }
        neighbors.len() >= t.sequential_min_neighbors
    }

    /// Recent-half access frequency exceeds the older half by more than
    /// the configured ratio
    fn is_trending(&self, timestamps: &[DateTime<Utc>]) -> bool {
        let t = &self.thresholds;
        // Last 10 vs the prior 10 once enough samples exist, halves otherwise
        let (older, recent) = if timestamps.len() >= 20 {
            let split = timestamps.len() - 10;
            (&timestamps[split - 10..split], &timestamps[split..])
        } else {
            let split = timestamps.len() / 2;
            (&timestamps[..split], &timestamps[split..])
        };
        if older.len() < 2 || recent.len() < 2 {
            return false;
        }

        let older_freq = window_frequency(older);
        let recent_freq = window_frequency(recent);
        recent_freq > older_freq * t.trending_ratio
    }
}

/// Accesses per second within a window of timestamps
fn window_frequency(window: &[DateTime<Utc>]) -> f64 {
    let span = window[window.len() - 1]
        .signed_duration_since(window[0])
        .num_milliseconds() as f64
        / 1000.0;
    window.len() as f64 / span.max(0.001)
}

/// Key prefix up to the first ASCII digit
fn non_digit_prefix(key: &str) -> &str {
    match key.find(|c: char| c.is_ascii_digit()) {
        Some(idx) => &key[..idx],
        None => key,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn stdev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

// =============================================================================
// Tests
// =============================================================================
