//! Prediction engine
//!
//! Consumes the access-pattern analyzer and the coordinator's statistics to
//! emit access predictions, prefetch recommendations, TTL advice, and
//! efficiency reports. Everything here is heuristic and inspectable; the
//! `factors` list on each prediction says how it was derived.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analyzer::AccessPattern;
use crate::config::PredictionConfig;
use crate::coordinator::CacheCoordinator;
use crate::tier::TierLevel;

/// A forecast of the next access to a key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPrediction {
    pub key: String,
    pub pattern_type: AccessPattern,
    pub predicted_access_time: DateTime<Utc>,
    /// Heuristic score, not a calibrated probability
    pub confidence: f64,
    pub access_probability: f64,
    pub recommended_tier: TierLevel,
    pub recommended_ttl: Duration,
    /// Human-readable derivation of this prediction
    pub factors: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// TTL-tuning advice for a single key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtlRecommendation {
    pub key: String,
    pub pattern_type: AccessPattern,
    pub recommended_ttl: Duration,
    /// Heuristic weight used only for ranking recommendations
    pub estimated_improvement: f64,
}

/// Coarse health rating derived from the global hit ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EfficiencyRating {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl EfficiencyRating {
    fn from_hit_ratio(ratio: f64) -> Self {
        if ratio > 0.9 {
            Self::Excellent
        } else if ratio > 0.8 {
            Self::Good
        } else if ratio > 0.7 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

/// Point-in-time assessment of how well the cache is performing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EfficiencyReport {
    pub rating: EfficiencyRating,
    pub hit_ratio: f64,
    pub average_response_time_ms: f64,
    /// How many analyzed keys fall into each pattern class
    pub pattern_distribution: HashMap<AccessPattern, usize>,
    pub hotspot_keys: Vec<String>,
    pub suggestions: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Derives predictions and advice from observed access history
pub struct PredictionEngine {
    coordinator: Arc<CacheCoordinator>,
    config: PredictionConfig,
}

impl PredictionEngine {
    pub fn new(coordinator: Arc<CacheCoordinator>) -> Self {
        let config = coordinator.config().prediction.clone();
        Self {
            coordinator,
            config,
        }
    }

    /// Forecast the next access for each hotspot key seen at least
    /// `min_access_frequency` times. A key whose timestamp series fails
    /// analysis is logged and skipped without aborting the batch. Results
    /// are sorted descending by `confidence * access_probability` and
    /// capped at `max_predictions`.
    pub fn predict_access_patterns(
        &self,
        user_id: Option<&str>,
        horizon: Duration,
    ) -> Vec<AccessPrediction> {
        let analyzer = self.coordinator.analyzer();
        let now = Utc::now();
        let cutoff = now
            + chrono::Duration::from_std(horizon).unwrap_or_else(|_| chrono::Duration::hours(24));

        let hotspots = analyzer.hotspot_keys_for(self.config.max_predictions, user_id);
        let mut predictions = Vec::new();

        for (key, count) in hotspots {
            if count < self.config.min_access_frequency {
                continue;
            }
            let pattern = match analyzer.analyze_key_pattern(&key) {
                Ok(pattern) => pattern,
                Err(e) => {
                    warn!(key = %key, error = %e, "pattern analysis failed, skipping key");
                    continue;
                }
            };
            let Some(prediction) = self.predict_key_access(&key, pattern, now) else {
                continue;
            };
            if prediction.predicted_access_time > cutoff {
                debug!(key = %key, "prediction beyond horizon, discarded");
                continue;
            }
            predictions.push(prediction);
        }

        predictions.sort_by(|a, b| {
            let score_a = a.confidence * a.access_probability;
            let score_b = b.confidence * b.access_probability;
            score_b
                .partial_cmp(&score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        predictions.truncate(self.config.max_predictions);
        predictions
    }

    /// Forecast one key from its classified pattern. Returns `None` when
    /// the key has fewer than two timestamps (no interval to extrapolate).
    pub fn predict_key_access(
        &self,
        key: &str,
        pattern: AccessPattern,
        now: DateTime<Utc>,
    ) -> Option<AccessPrediction> {
        let timestamps = self.coordinator.analyzer().timestamps(key);
        if timestamps.len() < 2 {
            return None;
        }
        let last_access = *timestamps.last()?;
        let avg_interval = mean_interval(&timestamps)?;

        // Sequential keys are forecast like temporal ones: neighbor-driven
        // access implies loose but real time locality.
        let row = match pattern {
            AccessPattern::Periodic => (1.0, 0.90, 0.85, TierLevel::L2, 7200),
            AccessPattern::Temporal | AccessPattern::Sequential => {
                (1.2, 0.80, 0.75, TierLevel::L2, 7200)
            }
            AccessPattern::Trending => (0.8, 0.85, 0.90, TierLevel::L1, 3600),
            AccessPattern::Burst => (0.5, 0.70, 0.80, TierLevel::L1, 3600),
            AccessPattern::Random => (1.0, 0.50, 0.60, TierLevel::L3, 14400),
        };
        let (multiplier, confidence, access_probability, recommended_tier, ttl_secs) = row;

        let offset_secs = avg_interval.as_secs_f64() * multiplier;
        let predicted_access_time =
            last_access + chrono::Duration::milliseconds((offset_secs * 1000.0) as i64);

        Some(AccessPrediction {
            key: key.to_string(),
            pattern_type: pattern,
            predicted_access_time,
            confidence,
            access_probability,
            recommended_tier,
            recommended_ttl: Duration::from_secs(ttl_secs),
            factors: vec![
                format!("pattern={}", pattern),
                format!("avg_interval_secs={:.3}", avg_interval.as_secs_f64()),
                format!("samples={}", timestamps.len()),
            ],
            generated_at: now,
        })
    }

    /// Keys worth prefetching now: confident predictions whose forecast
    /// access lands between `prefetch_min_lead` and `prefetch_max_lead`
    /// from now, capped at `max_prefetch_keys`.
    pub fn generate_prefetch_recommendations(&self, user_id: Option<&str>) -> Vec<String> {
        let now = Utc::now();
        let min_lead = chrono::Duration::from_std(self.config.prefetch_min_lead)
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        let max_lead = chrono::Duration::from_std(self.config.prefetch_max_lead)
            .unwrap_or_else(|_| chrono::Duration::seconds(1800));

        self.predict_access_patterns(user_id, self.config.prefetch_horizon)
            .into_iter()
            .filter(|p| p.confidence >= self.config.prefetch_confidence_threshold)
            .filter(|p| {
                let lead = p.predicted_access_time - now;
                lead >= min_lead && lead <= max_lead
            })
            .map(|p| p.key)
            .take(self.config.max_prefetch_keys)
            .collect()
    }

    /// Per-key TTL advice: `0.8 × avg_interval` for every key with enough
    /// samples, ranked by estimated improvement, capped at
    /// `max_ttl_recommendations`.
    pub fn optimize_ttl_values(&self) -> Vec<TtlRecommendation> {
        let analyzer = self.coordinator.analyzer();
        let keys = analyzer.keys_with_min_samples(5);
        let mut recommendations = Vec::new();

        for key in keys {
            let timestamps = analyzer.timestamps(&key);
            let Some(avg_interval) = mean_interval(&timestamps) else {
                continue;
            };
            let pattern = match analyzer.analyze_key_pattern(&key) {
                Ok(pattern) => pattern,
                Err(e) => {
                    warn!(key = %key, error = %e, "pattern analysis failed, skipping key");
                    continue;
                }
            };
            let recommended_ttl = Duration::from_secs_f64(
                avg_interval.as_secs_f64() * self.config.ttl_interval_fraction,
            );
            // Ranking weight only: busier keys benefit more from a
            // right-sized TTL.
            let estimated_improvement = (timestamps.len() as f64 / 100.0).min(1.0);

            recommendations.push(TtlRecommendation {
                key,
                pattern_type: pattern,
                recommended_ttl,
                estimated_improvement,
            });
        }

        recommendations.sort_by(|a, b| {
            b.estimated_improvement
                .partial_cmp(&a.estimated_improvement)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        recommendations.truncate(self.config.max_ttl_recommendations);
        recommendations
    }

    /// Combine coordinator statistics with pattern distribution into a
    /// single report with actionable suggestions.
    pub fn analyze_cache_efficiency(&self) -> EfficiencyReport {
        let stats = self.coordinator.comprehensive_statistics();
        let analyzer = self.coordinator.analyzer();

        let mut pattern_distribution: HashMap<AccessPattern, usize> = HashMap::new();
        for key in analyzer.keys_with_min_samples(self.config.min_access_frequency as usize) {
            if let Ok(pattern) = analyzer.analyze_key_pattern(&key) {
                *pattern_distribution.entry(pattern).or_insert(0) += 1;
            }
        }

        let hotspot_keys = analyzer
            .hotspot_keys(self.config.max_prefetch_keys)
            .into_iter()
            .map(|(key, _)| key)
            .collect();

        let mut suggestions = Vec::new();
        if stats.global_hit_ratio < 0.8 {
            suggestions.push("improve prefetching to raise the global hit ratio".to_string());
        }
        if stats.average_response_time_ms > 50.0 {
            suggestions.push("optimize L1 sizing to reduce average response time".to_string());
        }
        let random_count = pattern_distribution
            .get(&AccessPattern::Random)
            .copied()
            .unwrap_or(0);
        if !pattern_distribution.is_empty()
            && random_count * 2 > pattern_distribution.values().sum::<usize>()
        {
            suggestions
                .push("access patterns are mostly random; review caching candidates".to_string());
        }

        EfficiencyReport {
            rating: EfficiencyRating::from_hit_ratio(stats.global_hit_ratio),
            hit_ratio: stats.global_hit_ratio,
            average_response_time_ms: stats.average_response_time_ms,
            pattern_distribution,
            hotspot_keys,
            suggestions,
            generated_at: Utc::now(),
        }
    }
}

/// Mean gap between consecutive timestamps; `None` below two samples
fn mean_interval(timestamps: &[DateTime<Utc>]) -> Option<Duration> {
    if timestamps.len() < 2 {
        return None;
    }
    let total: f64 = timestamps
        .windows(2)
        .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0)
        .sum();
    let mean = total / (timestamps.len() - 1) as f64;
    if mean < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(mean))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AccessEvent;
    use crate::config::CacheConfig;

    fn engine() -> PredictionEngine {
        let coordinator = Arc::new(CacheCoordinator::new(CacheConfig::default()).unwrap());
        PredictionEngine::new(coordinator)
    }

    /// Feed `count` evenly spaced accesses ending now
    fn feed_periodic(engine: &PredictionEngine, key: &str, count: usize, interval_secs: i64) {
        let now = Utc::now();
        for i in 0..count {
            let offset = chrono::Duration::seconds(interval_secs * (count - 1 - i) as i64);
            engine.coordinator.record_access(
                AccessEvent::new(key, true)
                    .with_tier(TierLevel::L1)
                    .with_timestamp(now - offset),
            );
        }
    }

    #[test]
    fn test_periodic_prediction_row() {
        let engine = engine();
        feed_periodic(&engine, "metrics:feed", 10, 600);

        let predictions =
            engine.predict_access_patterns(None, Duration::from_secs(24 * 3600));
        assert_eq!(predictions.len(), 1);

        let p = &predictions[0];
        assert_eq!(p.key, "metrics:feed");
        assert_eq!(p.pattern_type, AccessPattern::Periodic);
        assert_eq!(p.confidence, 0.90);
        assert_eq!(p.access_probability, 0.85);
        assert_eq!(p.recommended_tier, TierLevel::L2);
        assert_eq!(p.recommended_ttl, Duration::from_secs(7200));
        assert_eq!(p.factors.len(), 3);

        // Next access extrapolated one interval past the last one
        let lead = (p.predicted_access_time - Utc::now()).num_seconds();
        assert!((590..=610).contains(&lead), "lead was {}s", lead);
    }

    #[test]
    fn test_prediction_beyond_horizon_discarded() {
        let engine = engine();
        feed_periodic(&engine, "slow:report", 10, 7200);

        let predictions = engine.predict_access_patterns(None, Duration::from_secs(3600));
        assert!(predictions.is_empty());
    }

    #[test]
    fn test_infrequent_keys_excluded() {
        let engine = engine();
        // Two accesses, below the min frequency of three
        feed_periodic(&engine, "rare", 2, 60);

        let predictions =
            engine.predict_access_patterns(None, Duration::from_secs(24 * 3600));
        assert!(predictions.is_empty());
    }

    #[test]
    fn test_failed_analysis_skips_key_only() {
        let engine = engine();
        feed_periodic(&engine, "good", 10, 600);

        // Out-of-order timestamps make this key's series unanalyzable
        let now = Utc::now();
        for offset in [0i64, 200, 100, 300, 400] {
            engine.coordinator.record_access(
                AccessEvent::new("bad", true)
                    .with_timestamp(now + chrono::Duration::milliseconds(offset)),
            );
        }

        let predictions =
            engine.predict_access_patterns(None, Duration::from_secs(24 * 3600));
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].key, "good");
    }

    #[test]
    fn test_predictions_ranked_by_score() {
        let engine = engine();
        // Periodic scores 0.90 * 0.85, random scores 0.50 * 0.60
        feed_periodic(&engine, "steady", 10, 600);

        let now = Utc::now();
        for offset in [3600i64, 3599, 3000, 500, 499, 498, 10, 0] {
            engine.coordinator.record_access(
                AccessEvent::new("erratic", true)
                    .with_timestamp(now - chrono::Duration::seconds(offset)),
            );
        }

        let predictions =
            engine.predict_access_patterns(None, Duration::from_secs(24 * 3600));
        assert!(predictions.len() >= 2);
        assert_eq!(predictions[0].key, "steady");
    }

    #[test]
    fn test_prefetch_recommendations_window() {
        let engine = engine();
        // Predicted 600s out, inside the [60s, 1800s] lead window
        feed_periodic(&engine, "warm:me", 10, 600);
        // Predicted ~2s out, before the minimum lead
        feed_periodic(&engine, "too:soon", 10, 2);

        let keys = engine.generate_prefetch_recommendations(None);
        assert_eq!(keys, vec!["warm:me".to_string()]);
    }

    #[test]
    fn test_user_scoped_predictions() {
        let engine = engine();
        let now = Utc::now();
        for i in 0..10i64 {
            engine.coordinator.record_access(
                AccessEvent::new("session:alpha", true)
                    .with_user("alice")
                    .with_timestamp(now - chrono::Duration::seconds(600 * (9 - i))),
            );
        }

        let for_alice = engine.predict_access_patterns(Some("alice"), Duration::from_secs(86400));
        assert_eq!(for_alice.len(), 1);

        let for_bob = engine.predict_access_patterns(Some("bob"), Duration::from_secs(86400));
        assert!(for_bob.is_empty());
    }

    #[test]
    fn test_ttl_recommendation_fraction_of_interval() {
        let engine = engine();
        feed_periodic(&engine, "steady", 10, 100);

        let recommendations = engine.optimize_ttl_values();
        assert_eq!(recommendations.len(), 1);

        let rec = &recommendations[0];
        assert_eq!(rec.key, "steady");
        assert_eq!(rec.pattern_type, AccessPattern::Periodic);
        // 0.8 × 100s
        assert!((rec.recommended_ttl.as_secs_f64() - 80.0).abs() < 1.0);
    }

    #[test]
    fn test_ttl_recommendations_ranked_and_capped() {
        let engine = engine();
        feed_periodic(&engine, "busy", 40, 60);
        feed_periodic(&engine, "quiet", 6, 60);

        let recommendations = engine.optimize_ttl_values();
        assert_eq!(recommendations.len(), 2);
        assert_eq!(recommendations[0].key, "busy");
        assert!(
            recommendations[0].estimated_improvement > recommendations[1].estimated_improvement
        );
    }

    #[test]
    fn test_efficiency_rating_bands() {
        assert_eq!(EfficiencyRating::from_hit_ratio(0.95), EfficiencyRating::Excellent);
        // Band edges are exclusive: exactly 0.9 / 0.8 / 0.7 fall downward
        assert_eq!(EfficiencyRating::from_hit_ratio(0.9), EfficiencyRating::Good);
        assert_eq!(EfficiencyRating::from_hit_ratio(0.85), EfficiencyRating::Good);
        assert_eq!(EfficiencyRating::from_hit_ratio(0.8), EfficiencyRating::Fair);
        assert_eq!(EfficiencyRating::from_hit_ratio(0.75), EfficiencyRating::Fair);
        assert_eq!(EfficiencyRating::from_hit_ratio(0.7), EfficiencyRating::Poor);
        assert_eq!(EfficiencyRating::from_hit_ratio(0.0), EfficiencyRating::Poor);
    }

    #[tokio::test]
    async fn test_efficiency_report_poor_on_cold_cache() {
        let coordinator = Arc::new(CacheCoordinator::new(CacheConfig::default()).unwrap());
        let engine = PredictionEngine::new(Arc::clone(&coordinator));

        coordinator.get("missing").await;

        let report = engine.analyze_cache_efficiency();
        assert_eq!(report.rating, EfficiencyRating::Poor);
        assert!(report
            .suggestions
            .iter()
            .any(|s| s.contains("prefetching")));
    }

    #[tokio::test]
    async fn test_efficiency_report_excellent_when_hot() {
        let coordinator = Arc::new(CacheCoordinator::new(CacheConfig::default()).unwrap());
        let engine = PredictionEngine::new(Arc::clone(&coordinator));

        coordinator
            .set(
                "k",
                bytes::Bytes::from_static(b"v"),
                crate::coordinator::SetOptions::default(),
            )
            .await
            .unwrap();
        for _ in 0..20 {
            coordinator.get("k").await.unwrap();
        }

        let report = engine.analyze_cache_efficiency();
        assert_eq!(report.rating, EfficiencyRating::Excellent);
        assert!(report.hit_ratio > 0.9);
        assert!(report.hotspot_keys.contains(&"k".to_string()));
    }
}
