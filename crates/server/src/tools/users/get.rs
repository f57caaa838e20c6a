//! user_get tool implementation.
//!
//! Conditional read of one user. The client sends the tag it holds in
//! `if_none_match`; when that tag is still current the response carries no
//! user and `status` is 304.

use std::time::Instant;

use freshtag_core::metrics::EngineEvent;
use freshtag_core::{Disposition, Error, IfNoneMatch, User, ValidationOutcome, ValidationTag};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Parameters for the user_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserGetParams {
    /// User id.
    pub id: i64,

    /// Tag(s) held by the client, in `If-None-Match` syntax: `"t1"`,
    /// `W/"t1", "t2"`, or `*`.
    #[serde(default)]
    pub if_none_match: Option<String>,
}

/// Output from the user_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserGetOutput {
    /// 200 with a user, or 304 without one.
    pub status: u16,
    /// Current tag of the user.
    pub etag: ValidationTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Whether the tag came from the tag store.
    pub served_from_cache: bool,
}

impl UserGetOutput {
    fn not_modified(etag: ValidationTag, served_from_cache: bool) -> Self {
        Self { status: 304, etag, user: None, served_from_cache }
    }

    fn modified(etag: ValidationTag, user: User, served_from_cache: bool) -> Self {
        Self { status: 200, etag, user: Some(user), served_from_cache }
    }

    /// A cache hit is a response built without reading the entity store:
    /// a 304 decided from the cached tag alone.
    fn is_cache_hit(&self) -> bool {
        self.status == 304 && self.served_from_cache
    }
}

fn status_for(err: &Error) -> u16 {
    match err {
        Error::NotFound { .. } => 404,
        Error::InvalidInput(_) => 400,
        _ => 500,
    }
}

/// Implementation of the user_get tool.
pub async fn get_impl(state: &AppState, params: UserGetParams) -> Result<CallToolResult, McpError> {
    let started = Instant::now();
    let endpoint = format!("/users/{}", params.id);
    let condition = IfNoneMatch::parse(params.if_none_match.as_deref());

    let result = match state
        .engine
        .validate_conditional(&state.users, params.id, &condition)
        .await
    {
        Ok(outcome) => respond(state, params.id, &condition, outcome).await,
        Err(e) => Err(e),
    };

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            state.metrics().record(&endpoint, started.elapsed(), false, status_for(&e), 0);
            return Err(e.into());
        }
    };

    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;

    let body_bytes = if output.user.is_some() { json.len() as u64 } else { 0 };
    state
        .metrics()
        .record(&endpoint, started.elapsed(), output.is_cache_hit(), output.status, body_bytes);

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Turn an engine outcome into a response, fetching the user when the
/// engine answered from the tag store alone.
async fn respond(
    state: &AppState, id: i64, condition: &IfNoneMatch, outcome: ValidationOutcome<User>,
) -> Result<UserGetOutput, Error> {
    let served_from_cache = outcome.served_from_cache;

    match outcome.disposition() {
        Disposition::NotModified => Ok(UserGetOutput::not_modified(outcome.current_tag, served_from_cache)),
        Disposition::Modified => {
            let user = outcome.entity.ok_or(Error::NotFound { entity_type: "user", entity_id: id })?;
            Ok(UserGetOutput::modified(outcome.current_tag, user, served_from_cache))
        }
        Disposition::ModifiedStaleTag => {
            state.metrics().observe(EngineEvent::EntityFetch);
            let Some(user) = state.users.get(id).await? else {
                state.engine.invalidate("user", id).await;
                return Err(Error::NotFound { entity_type: "user", entity_id: id });
            };

            let tag = state.engine.tag_for(&user)?;
            if tag != outcome.current_tag {
                tracing::warn!(user_id = id, cached = %outcome.current_tag, actual = %tag, "cached tag was stale");
                state.engine.refresh(&user).await?;
                if condition.matches(&tag) {
                    return Ok(UserGetOutput::not_modified(tag, false));
                }
            }

            Ok(UserGetOutput::modified(tag, user, served_from_cache))
        }
    }
}
