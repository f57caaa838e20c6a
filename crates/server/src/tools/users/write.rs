//! user_create, user_update, and user_delete tool implementations.
//!
//! Each write drops the user's cached tag before returning, then caches the
//! new tag so the next read is served from the tag store.

use freshtag_core::{Error, User, UserPatch, ValidationTag};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Parameters for the user_create tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserCreateParams {
    pub name: String,
    pub email: String,
}

/// Parameters for the user_update tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserUpdateParams {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Parameters for the user_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserDeleteParams {
    pub id: i64,
}

/// Output from user_create and user_update.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserWriteOutput {
    pub user: User,
    /// Tag of the user as written.
    pub etag: ValidationTag,
}

/// Output from the user_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserDeleteOutput {
    pub deleted: bool,
}

fn to_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Implementation of the user_create tool.
pub async fn create_impl(state: &AppState, params: UserCreateParams) -> Result<CallToolResult, McpError> {
    let user = state.users.create(&params.name, &params.email).await?;
    let etag = state.engine.refresh(&user).await?;

    tracing::info!(user_id = user.id, %etag, "user created");
    to_result(&UserWriteOutput { user, etag })
}

/// Implementation of the user_update tool.
pub async fn update_impl(state: &AppState, params: UserUpdateParams) -> Result<CallToolResult, McpError> {
    if params.name.is_none() && params.email.is_none() {
        return Err(Error::InvalidInput("At least one of name or email must be specified".to_string()).into());
    }

    let id = params.id;
    let patch = UserPatch { name: params.name, email: params.email };
    let user = state
        .users
        .update(id, patch)
        .await?
        .ok_or(Error::NotFound { entity_type: "user", entity_id: id })?;

    state.engine.invalidate("user", id).await;
    let etag = state.engine.refresh(&user).await?;

    tracing::info!(user_id = id, version = user.version, %etag, "user updated");
    to_result(&UserWriteOutput { user, etag })
}

/// Implementation of the user_delete tool.
pub async fn delete_impl(state: &AppState, params: UserDeleteParams) -> Result<CallToolResult, McpError> {
    if !state.users.delete(params.id).await? {
        return Err(Error::NotFound { entity_type: "user", entity_id: params.id }.into());
    }

    state.engine.invalidate("user", params.id).await;

    tracing::info!(user_id = params.id, "user deleted");
    to_result(&UserDeleteOutput { deleted: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::parse_output;
    use crate::tools::users::get::{UserGetOutput, UserGetParams, get_impl};

    async fn create(state: &AppState, name: &str, email: &str) -> UserWriteOutput {
        let params = UserCreateParams { name: name.into(), email: email.into() };
        parse_output(&create_impl(state, params).await.unwrap())
    }

    #[tokio::test]
    async fn test_create_caches_tag() {
        let state = AppState::in_memory().await;
        let created = create(&state, "Ada", "ada@example.com").await;

        assert_eq!(state.engine.tags().get("user", created.user.id).await, Some(created.etag.clone()));

        let params = UserGetParams { id: created.user.id, if_none_match: Some(created.etag.to_string()) };
        let output: UserGetOutput = parse_output(&get_impl(&state, params).await.unwrap());
        assert_eq!(output.status, 304);
        assert!(output.served_from_cache);
    }

    #[tokio::test]
    async fn test_create_invalid_and_duplicate() {
        let state = AppState::in_memory().await;
        let params = UserCreateParams { name: "Ada".into(), email: "nope".into() };
        assert_eq!(create_impl(&state, params).await.unwrap_err().code.0, -32602);

        create(&state, "Ada", "ada@example.com").await;
        let params = UserCreateParams { name: "Ada".into(), email: "ada@example.com".into() };
        assert_eq!(create_impl(&state, params).await.unwrap_err().code.0, -32005);
    }

    #[tokio::test]
    async fn test_update_replaces_tag() {
        let state = AppState::in_memory().await;
        let created = create(&state, "Ada", "ada@example.com").await;

        let params = UserUpdateParams { id: created.user.id, name: Some("Ada L.".into()), email: None };
        let updated: UserWriteOutput = parse_output(&update_impl(&state, params).await.unwrap());
        assert_eq!(updated.user.version, 2);
        assert_eq!(state.engine.tags().get("user", created.user.id).await, Some(updated.etag.clone()));

        let params = UserGetParams { id: created.user.id, if_none_match: Some(updated.etag.to_string()) };
        let output: UserGetOutput = parse_output(&get_impl(&state, params).await.unwrap());
        assert_eq!(output.status, 304);
    }

    #[tokio::test]
    async fn test_update_requires_a_field() {
        let state = AppState::in_memory().await;
        let params = UserUpdateParams { id: 1, name: None, email: None };
        assert!(update_impl(&state, params).await.is_err());
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let state = AppState::in_memory().await;
        let params = UserUpdateParams { id: 42, name: Some("X".into()), email: None };
        assert_eq!(update_impl(&state, params).await.unwrap_err().code.0, -32001);
    }

    #[tokio::test]
    async fn test_delete_invalidates() {
        let state = AppState::in_memory().await;
        let created = create(&state, "Ada", "ada@example.com").await;

        let output: UserDeleteOutput =
            parse_output(&delete_impl(&state, UserDeleteParams { id: created.user.id }).await.unwrap());
        assert!(output.deleted);
        assert!(state.engine.tags().get("user", created.user.id).await.is_none());

        let params = UserGetParams { id: created.user.id, if_none_match: Some(created.etag.to_string()) };
        assert_eq!(get_impl(&state, params).await.unwrap_err().code.0, -32001);

        let again = delete_impl(&state, UserDeleteParams { id: created.user.id }).await;
        assert_eq!(again.unwrap_err().code.0, -32001);
    }
}
