//! Request and cache metrics.
//!
//! [`MetricsRecorder`] keeps raw counters and sums only. Every ratio
//! (hit rate, averages, bandwidth saved) is computed from a snapshot when
//! read, so counters and derived figures can never drift apart.
//!
//! Two feeds write into it:
//! - the transport, once per served read, through [`MetricsRecorder::record`]
//! - the validation engine, once per tag lookup and entity fetch, through
//!   [`MetricsRecorder::observe`]

pub mod summary;

pub use summary::{Effectiveness, PerformanceSummary};

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Default number of individual requests kept for diagnostics.
pub const DEFAULT_HISTORY: usize = 1000;

/// Discrete events emitted by the validation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Tag found in the tag store.
    TagHit,
    /// Tag not in the tag store.
    TagMiss,
    /// The entity store was read because of a miss.
    EntityFetch,
    /// A conditional read was answered without reading the entity store.
    FetchAvoided,
}

/// One served request.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub response_time_ms: f64,
    pub cache_hit: bool,
    pub status_code: u16,
    pub response_bytes: u64,
}

/// Raw aggregate counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AggregatedMetrics {
    pub total: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub status_200: u64,
    pub status_304: u64,
    /// Conditional reads answered from the tag store alone.
    pub fetches_avoided: u64,
    pub total_response_time_ms: f64,
    pub cached_response_time_ms: f64,
    pub uncached_response_time_ms: f64,
    /// Body bytes sent with 200 responses.
    pub total_response_bytes: u64,
    pub tag_hits: u64,
    pub tag_misses: u64,
    pub entity_fetches: u64,
}

fn ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 { 0.0 } else { numerator / denominator as f64 }
}

impl AggregatedMetrics {
    /// Hit rate in percent.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.cache_hits as f64, self.total) * 100.0
    }

    pub fn avg_response_time_ms(&self) -> f64 {
        ratio(self.total_response_time_ms, self.total)
    }

    pub fn avg_cached_response_time_ms(&self) -> f64 {
        ratio(self.cached_response_time_ms, self.cache_hits)
    }

    pub fn avg_uncached_response_time_ms(&self) -> f64 {
        ratio(self.uncached_response_time_ms, self.cache_misses)
    }

    pub fn avg_response_bytes_200(&self) -> f64 {
        ratio(self.total_response_bytes as f64, self.status_200)
    }

    /// Estimated bytes not sent thanks to 304 responses.
    pub fn bandwidth_saved_bytes(&self) -> u64 {
        (self.avg_response_bytes_200() * self.status_304 as f64) as u64
    }

    /// Saved bytes as a percentage of what would have been sent without 304s.
    pub fn bandwidth_saved_percentage(&self) -> f64 {
        let saved = self.bandwidth_saved_bytes();
        let potential = self.total_response_bytes + saved;
        ratio(saved as f64 * 100.0, potential)
    }
}

/// A point-in-time copy of the recorder, with uptime.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct MetricsSnapshot {
    pub aggregated: AggregatedMetrics,
    pub uptime_secs: f64,
}

impl MetricsSnapshot {
    pub fn requests_per_second(&self) -> f64 {
        self.aggregated.total as f64 / self.uptime_secs.max(1.0)
    }
}

struct State {
    aggregated: AggregatedMetrics,
    history: VecDeque<RequestRecord>,
    started_at: Instant,
}

impl State {
    fn new(capacity: usize) -> Self {
        Self { aggregated: AggregatedMetrics::default(), history: VecDeque::with_capacity(capacity), started_at: Instant::now() }
    }
}

/// Thread-safe metrics aggregator.
///
/// Every mutation and every read takes the same lock, so snapshots are
/// consistent across all counters.
pub struct MetricsRecorder {
    capacity: usize,
    state: Mutex<State>,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder").field("capacity", &self.capacity).finish_non_exhaustive()
    }
}

impl MetricsRecorder {
    /// Create a recorder keeping at most `capacity` recent requests.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, state: Mutex::new(State::new(capacity)) }
    }

    /// Record one served request.
    pub fn record(&self, endpoint: &str, response_time: Duration, cache_hit: bool, status_code: u16, response_bytes: u64) {
        let response_time_ms = response_time.as_secs_f64() * 1000.0;
        let record = RequestRecord {
            timestamp: Utc::now(),
            endpoint: endpoint.to_string(),
            response_time_ms,
            cache_hit,
            status_code,
            response_bytes,
        };

        let mut state = self.state.lock();

        if self.capacity > 0 {
            if state.history.len() >= self.capacity {
                state.history.pop_front();
            }
            state.history.push_back(record);
        }

        let agg = &mut state.aggregated;
        agg.total += 1;
        agg.total_response_time_ms += response_time_ms;

        if cache_hit {
            agg.cache_hits += 1;
            agg.cached_response_time_ms += response_time_ms;
        } else {
            agg.cache_misses += 1;
            agg.uncached_response_time_ms += response_time_ms;
        }

        match status_code {
            304 => agg.status_304 += 1,
            200 => {
                agg.status_200 += 1;
                agg.total_response_bytes += response_bytes;
            }
            _ => {}
        }
    }

    /// Count an engine event.
    pub fn observe(&self, event: EngineEvent) {
        let mut state = self.state.lock();
        let agg = &mut state.aggregated;
        match event {
            EngineEvent::TagHit => agg.tag_hits += 1,
            EngineEvent::TagMiss => agg.tag_misses += 1,
            EngineEvent::EntityFetch => agg.entity_fetches += 1,
            EngineEvent::FetchAvoided => agg.fetches_avoided += 1,
        }
    }

    /// Consistent copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.lock();
        MetricsSnapshot { aggregated: state.aggregated.clone(), uptime_secs: state.started_at.elapsed().as_secs_f64() }
    }

    /// Most recent requests, newest first.
    pub fn recent(&self, limit: usize) -> Vec<RequestRecord> {
        let state = self.state.lock();
        state.history.iter().rev().take(limit).cloned().collect()
    }

    /// Human-readable summary of the current counters.
    pub fn summary(&self) -> PerformanceSummary {
        PerformanceSummary::from_metrics(&self.snapshot().aggregated)
    }

    /// Clear counters, history, and the uptime clock.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = State::new(self.capacity);
        tracing::info!("metrics reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_empty_metrics() {
        let recorder = MetricsRecorder::default();
        let agg = recorder.snapshot().aggregated;
        assert_eq!(agg.total, 0);
        assert_eq!(agg.hit_rate(), 0.0);
        assert_eq!(agg.avg_response_time_ms(), 0.0);
        assert_eq!(agg.bandwidth_saved_bytes(), 0);
        assert_eq!(agg.bandwidth_saved_percentage(), 0.0);
    }

    #[test]
    fn test_record_aggregates() {
        let recorder = MetricsRecorder::default();
        recorder.record("/users/1", ms(15), false, 200, 150);
        recorder.record("/users/1", ms(2), true, 304, 0);
        recorder.record("/users/2", ms(13), false, 200, 250);
        recorder.record("/users/1", ms(2), true, 304, 0);

        let agg = recorder.snapshot().aggregated;
        assert_eq!(agg.total, 4);
        assert_eq!(agg.cache_hits, 2);
        assert_eq!(agg.cache_misses, 2);
        assert_eq!(agg.status_200, 2);
        assert_eq!(agg.status_304, 2);
        assert_eq!(agg.total_response_bytes, 400);

        assert!((agg.hit_rate() - 50.0).abs() < 1e-9);
        assert!((agg.avg_cached_response_time_ms() - 2.0).abs() < 1e-6);
        assert!((agg.avg_uncached_response_time_ms() - 14.0).abs() < 1e-6);
        assert!((agg.avg_response_bytes_200() - 200.0).abs() < 1e-9);
        assert_eq!(agg.bandwidth_saved_bytes(), 400);
        assert!((agg.bandwidth_saved_percentage() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_other_status_counts_only_totals() {
        let recorder = MetricsRecorder::default();
        recorder.record("/users/9999", ms(5), false, 404, 30);
        let agg = recorder.snapshot().aggregated;
        assert_eq!(agg.total, 1);
        assert_eq!(agg.status_200 + agg.status_304, 0);
        assert_eq!(agg.total_response_bytes, 0);
    }

    #[test]
    fn test_history_ring_buffer() {
        let recorder = MetricsRecorder::new(3);
        for i in 0..5 {
            recorder.record(&format!("/users/{i}"), ms(1), false, 200, 10);
        }

        let recent = recorder.recent(10);
        let endpoints: Vec<_> = recent.iter().map(|r| r.endpoint.as_str()).collect();
        assert_eq!(endpoints, ["/users/4", "/users/3", "/users/2"]);
        assert_eq!(recorder.recent(1).len(), 1);
        assert_eq!(recorder.snapshot().aggregated.total, 5);
    }

    #[test]
    fn test_engine_events() {
        let recorder = MetricsRecorder::default();
        recorder.observe(EngineEvent::TagMiss);
        recorder.observe(EngineEvent::EntityFetch);
        recorder.observe(EngineEvent::TagHit);
        recorder.observe(EngineEvent::FetchAvoided);

        let agg = recorder.snapshot().aggregated;
        assert_eq!((agg.tag_hits, agg.tag_misses, agg.entity_fetches, agg.fetches_avoided), (1, 1, 1, 1));
        assert_eq!(agg.total, 0);
    }

    #[test]
    fn test_reset() {
        let recorder = MetricsRecorder::default();
        recorder.record("/users/1", ms(1), true, 304, 0);
        recorder.reset();
        assert_eq!(recorder.snapshot().aggregated, AggregatedMetrics::default());
        assert!(recorder.recent(10).is_empty());
    }

    #[test]
    fn test_concurrent_records() {
        let recorder = Arc::new(MetricsRecorder::new(100));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let recorder = recorder.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        recorder.record("/users/1", ms(1), (t + i) % 2 == 0, 304, 0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let agg = recorder.snapshot().aggregated;
        assert_eq!(agg.total, 2000);
        assert_eq!(agg.cache_hits + agg.cache_misses, 2000);
        assert_eq!(recorder.recent(1000).len(), 100);
    }
}
