//! Human-readable performance summary.

use serde::{Deserialize, Serialize};

use super::AggregatedMetrics;

/// Cache effectiveness tier by hit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Effectiveness {
    /// Above 80%.
    Excellent,
    /// Above 60%.
    Good,
    /// Above 40%.
    Fair,
    Poor,
    /// No requests recorded yet.
    Unknown,
}

impl Effectiveness {
    pub fn from_hit_rate(hit_rate: f64) -> Self {
        if hit_rate > 80.0 {
            Self::Excellent
        } else if hit_rate > 60.0 {
            Self::Good
        } else if hit_rate > 40.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

/// Speed-up estimate assuming a cached read is ten times cheaper.
pub fn improvement_factor(hit_rate: f64) -> f64 {
    1.0 + (hit_rate / 100.0) * 9.0
}

/// Key indicators for a diagnostics surface.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PerformanceSummary {
    pub summary: String,
    pub requests: u64,
    pub hit_rate: f64,
    pub effectiveness: Effectiveness,
    /// `None` until at least one request hit the cache.
    pub improvement_factor: Option<f64>,
    pub bandwidth_saved_percentage: f64,
    pub fetches_avoided: u64,
}

impl PerformanceSummary {
    pub fn from_metrics(metrics: &AggregatedMetrics) -> Self {
        if metrics.total == 0 {
            return Self {
                summary: "No requests recorded yet".into(),
                requests: 0,
                hit_rate: 0.0,
                effectiveness: Effectiveness::Unknown,
                improvement_factor: None,
                bandwidth_saved_percentage: 0.0,
                fetches_avoided: metrics.fetches_avoided,
            };
        }

        let hit_rate = metrics.hit_rate();
        Self {
            summary: format!("{} requests, {hit_rate:.1}% cache hit rate", metrics.total),
            requests: metrics.total,
            hit_rate,
            effectiveness: Effectiveness::from_hit_rate(hit_rate),
            improvement_factor: (hit_rate > 0.0).then(|| improvement_factor(hit_rate)),
            bandwidth_saved_percentage: metrics.bandwidth_saved_percentage(),
            fetches_avoided: metrics.fetches_avoided,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers() {
        assert_eq!(Effectiveness::from_hit_rate(95.0), Effectiveness::Excellent);
        assert_eq!(Effectiveness::from_hit_rate(80.0), Effectiveness::Good);
        assert_eq!(Effectiveness::from_hit_rate(60.5), Effectiveness::Good);
        assert_eq!(Effectiveness::from_hit_rate(60.0), Effectiveness::Fair);
        assert_eq!(Effectiveness::from_hit_rate(40.0), Effectiveness::Poor);
        assert_eq!(Effectiveness::from_hit_rate(0.0), Effectiveness::Poor);
    }

    #[test]
    fn test_improvement_factor() {
        assert!((improvement_factor(0.0) - 1.0).abs() < 1e-9);
        assert!((improvement_factor(50.0) - 5.5).abs() < 1e-9);
        assert!((improvement_factor(100.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_empty() {
        let summary = PerformanceSummary::from_metrics(&AggregatedMetrics::default());
        assert_eq!(summary.effectiveness, Effectiveness::Unknown);
        assert!(summary.improvement_factor.is_none());
    }

    #[test]
    fn test_summary_from_counts() {
        let metrics = AggregatedMetrics { total: 10, cache_hits: 9, cache_misses: 1, ..Default::default() };
        let summary = PerformanceSummary::from_metrics(&metrics);
        assert_eq!(summary.summary, "10 requests, 90.0% cache hit rate");
        assert_eq!(summary.effectiveness, Effectiveness::Excellent);
        assert!((summary.improvement_factor.unwrap() - 9.1).abs() < 1e-9);
    }

    #[test]
    fn test_summary_no_hits() {
        let metrics = AggregatedMetrics { total: 3, cache_misses: 3, ..Default::default() };
        let summary = PerformanceSummary::from_metrics(&metrics);
        assert_eq!(summary.effectiveness, Effectiveness::Poor);
        assert!(summary.improvement_factor.is_none());
    }
}
