//! MCP server handler implementation.
//!
//! This module defines the main server handler that routes tool calls to
//! the worker. Each tool is one host hook.

use harbor_client::Worker;
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

use crate::tools::cache::{CacheGetParams, get_impl, stores_impl};
use crate::tools::control::{ControlParams, control_impl};
use crate::tools::fetch::{FetchParams, fetch_impl};
use crate::tools::lifecycle::{ActivateParams, activate_impl, install_impl};
use crate::tools::notify::{ClickParams, PushParams, click_impl, push_impl};
use crate::tools::status::status_impl;
use crate::tools::tasks::{PeriodicSyncParams, SyncParams, periodic_sync_impl, register_sync_impl, sync_impl};

/// The main MCP server handler for harbor.
#[derive(Clone)]
pub struct HarborServer {
    worker: Worker,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl HarborServer {
    /// Create a new server handler around a worker.
    pub fn new(worker: Worker) -> Self {
        Self { worker, tool_router: Self::tool_router() }
    }

    #[tool(description = "Precache the configured version's manifest. All-or-nothing; failure is terminal.")]
    async fn install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    #[tool(description = "Activate the installed version: prune stale stores and start intercepting.")]
    async fn activate(&self, params: Parameters<ActivateParams>) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker, params.0).await
    }

    /// Intercept a request.
    ///
    /// API paths are network-first, static assets cache-first, everything else network-first.
    #[tool(description = "Deliver an intercepted request. The response reports where it came from.")]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Post a fire-and-forget control message: SKIP_WAITING, CACHE_URLS or CLEAR_CACHE.")]
    async fn control(&self, params: Parameters<ControlParams>) -> Result<CallToolResult, McpError> {
        control_impl(&self.worker, params.0).await
    }

    #[tool(description = "Register a deferred task tag to run once connectivity returns.")]
    async fn register_sync(&self, params: Parameters<SyncParams>) -> Result<CallToolResult, McpError> {
        register_sync_impl(&self.worker, params.0).await
    }

    #[tool(description = "Fire a pending deferred task tag. Failures report the retry back-off.")]
    async fn sync(&self, params: Parameters<SyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.worker, params.0).await
    }

    #[tool(description = "Fire a periodic task tag. Failures are logged, never retried.")]
    async fn periodic_sync(&self, params: Parameters<PeriodicSyncParams>) -> Result<CallToolResult, McpError> {
        periodic_sync_impl(&self.worker, params.0).await
    }

    #[tool(description = "Deliver a push message and render it as a notification.")]
    async fn push(&self, params: Parameters<PushParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.worker, params.0).await
    }

    #[tool(description = "Deliver a notification click; the explore action opens the application root.")]
    async fn notification_click(&self, params: Parameters<ClickParams>) -> Result<CallToolResult, McpError> {
        click_impl(&self.worker, params.0).await
    }

    #[tool(description = "Look a request up in the current stores without touching the network.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.worker, params.0).await
    }

    #[tool(description = "List every cache store with its entries and whether it belongs to the current version.")]
    async fn cache_stores(&self) -> Result<CallToolResult, McpError> {
        stores_impl(&self.worker).await
    }

    #[tool(description = "Report the lifecycle state, current store names and pending deferred tasks.")]
    async fn status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker).await
    }
}

impl ServerHandler for HarborServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "harbor".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
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
