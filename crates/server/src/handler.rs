//! MCP server handler implementation.
//!
//! Routes tool calls to the implementations in [`crate::tools`].

use crate::state::AppState;
use crate::tools::cache::{TagStorePurgeParams, purge_impl, stats_impl};
use crate::tools::metrics::{self, MetricsGetParams};
use crate::tools::users::{
    UserCreateParams, UserDeleteParams, UserGetParams, UserUpdateParams, create_impl, delete_impl, get_impl,
    update_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The MCP server handler for freshtag.
#[derive(Clone)]
pub struct FreshtagServer {
    state: AppState,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl FreshtagServer {
    pub fn new(state: AppState) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Get a user by id. Pass the tag you hold in if_none_match; status 304 with no user means your copy is current."
    )]
    async fn user_get(&self, params: Parameters<UserGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.state, params.0).await
    }

    #[tool(description = "Create a user. Returns the user and its tag.")]
    async fn user_create(&self, params: Parameters<UserCreateParams>) -> Result<CallToolResult, McpError> {
        create_impl(&self.state, params.0).await
    }

    #[tool(description = "Update a user's name and/or email. Returns the user and its new tag.")]
    async fn user_update(&self, params: Parameters<UserUpdateParams>) -> Result<CallToolResult, McpError> {
        update_impl(&self.state, params.0).await
    }

    #[tool(description = "Delete a user.")]
    async fn user_delete(&self, params: Parameters<UserDeleteParams>) -> Result<CallToolResult, McpError> {
        delete_impl(&self.state, params.0).await
    }

    #[tool(description = "Request and cache metrics: counters, hit rate, bandwidth saved, recent requests.")]
    async fn metrics_get(&self, params: Parameters<MetricsGetParams>) -> Result<CallToolResult, McpError> {
        metrics::get_impl(&self.state, params.0).await
    }

    #[tool(description = "Reset all metrics counters and history.")]
    async fn metrics_reset(&self) -> Result<CallToolResult, McpError> {
        metrics::reset_impl(&self.state).await
    }

    #[tool(description = "Tag store backend, connectivity, and live entry count.")]
    async fn tag_store_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.state).await
    }

    #[tool(description = "Remove expired tags, or every tag when expired_only is false.")]
    async fn tag_store_purge(&self, params: Parameters<TagStorePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.state, params.0).await
    }
}

impl ServerHandler for FreshtagServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "freshtag".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Conditional reads of users. Keep the etag from user_get and send it back as if_none_match.".into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
