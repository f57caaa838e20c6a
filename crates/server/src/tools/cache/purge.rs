//! tag_store_purge tool implementation.
//!
//! Removes expired tags, or every tag in the namespace. Clearing everything
//! is always safe: the next read of each entity goes to the entity store
//! once and re-caches its tag.

use freshtag_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Parameters for the tag_store_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TagStorePurgeParams {
    /// Only drop entries whose TTL has passed (default). When false, every
    /// tag in the namespace is removed.
    #[serde(default = "default_true")]
    pub expired_only: bool,
}

fn default_true() -> bool {
    true
}

/// Output from the tag_store_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TagStorePurgeOutput {
    /// Number of entries removed.
    pub removed: u64,
}

/// Implementation of the tag_store_purge tool.
pub async fn purge_impl(state: &AppState, params: TagStorePurgeParams) -> Result<CallToolResult, McpError> {
    let tags = state.engine.tags();
    let removed = if params.expired_only { tags.purge_expired().await } else { tags.clear_all().await };

    let removed = removed.ok_or_else(|| {
        Error::CacheUnavailable(format!("tag store backend '{}' did not respond", tags.backend_name()))
    })?;

    let json = serde_json::to_string_pretty(&TagStorePurgeOutput { removed })
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
