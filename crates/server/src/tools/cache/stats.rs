//! tag_store_stats tool implementation.

use freshtag_core::{Error, TagStoreStats};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Output from the tag_store_stats tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TagStoreStatsOutput {
    #[serde(flatten)]
    pub stats: TagStoreStats,
    pub namespace: String,
    pub strategy: String,
    pub timeout_ms: u64,
}

/// Implementation of the tag_store_stats tool.
pub async fn stats_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let tags = state.engine.tags();
    let options = tags.options();

    let output = TagStoreStatsOutput {
        stats: tags.stats().await,
        namespace: options.namespace.clone(),
        strategy: state.engine.generator().strategy().as_str().to_string(),
        timeout_ms: options.timeout.as_millis() as u64,
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
