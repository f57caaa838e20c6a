//! metrics_get and metrics_reset tool implementations.

use freshtag_core::metrics::{AggregatedMetrics, RequestRecord};
use freshtag_core::{Error, PerformanceSummary};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

const DEFAULT_RECENT: usize = 10;

/// Parameters for the metrics_get tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MetricsGetParams {
    /// Number of recent requests to include, newest first. Defaults to 10.
    #[serde(default)]
    pub recent: Option<usize>,
}

/// Figures computed from the raw counters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DerivedMetrics {
    pub hit_rate: f64,
    pub avg_response_time_ms: f64,
    pub avg_cached_response_time_ms: f64,
    pub avg_uncached_response_time_ms: f64,
    pub avg_response_bytes_200: f64,
    pub bandwidth_saved_bytes: u64,
    pub bandwidth_saved_percentage: f64,
    pub requests_per_second: f64,
}

/// Output from the metrics_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MetricsGetOutput {
    pub counters: AggregatedMetrics,
    pub derived: DerivedMetrics,
    pub uptime_secs: f64,
    pub summary: PerformanceSummary,
    pub recent: Vec<RequestRecord>,
}

/// Output from the metrics_reset tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MetricsResetOutput {
    pub reset: bool,
}

/// Implementation of the metrics_get tool.
pub async fn get_impl(state: &AppState, params: MetricsGetParams) -> Result<CallToolResult, McpError> {
    let metrics = state.metrics();
    let snapshot = metrics.snapshot();
    let counters = snapshot.aggregated.clone();

    let output = MetricsGetOutput {
        derived: DerivedMetrics {
            hit_rate: counters.hit_rate(),
            avg_response_time_ms: counters.avg_response_time_ms(),
            avg_cached_response_time_ms: counters.avg_cached_response_time_ms(),
            avg_uncached_response_time_ms: counters.avg_uncached_response_time_ms(),
            avg_response_bytes_200: counters.avg_response_bytes_200(),
            bandwidth_saved_bytes: counters.bandwidth_saved_bytes(),
            bandwidth_saved_percentage: counters.bandwidth_saved_percentage(),
            requests_per_second: snapshot.requests_per_second(),
        },
        summary: PerformanceSummary::from_metrics(&counters),
        uptime_secs: snapshot.uptime_secs,
        recent: metrics.recent(params.recent.unwrap_or(DEFAULT_RECENT)),
        counters,
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Implementation of the metrics_reset tool.
pub async fn reset_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    state.metrics().reset();

    let json = serde_json::to_string_pretty(&MetricsResetOutput { reset: true })
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
