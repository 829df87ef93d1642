//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the worker.
use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, get_impl};
use crate::tools::events::{SwPushParams, SwSyncParams, push_impl, sync_impl};
use crate::tools::fetch::{SwFetchParams, fetch_impl};
use crate::tools::lifecycle::{activate_impl, install_impl};
use crate::tools::message::{SwMessageParams, message_impl};

use itinera_core::ServiceWorker;
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
use url::Url;

/// The main MCP server handler for itinera.
#[derive(Clone)]
pub struct ItineraServer {
    worker: Arc<ServiceWorker>,
    origin: Arc<Url>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ItineraServer {
    /// Create a new server handler around an already installed worker.
    pub fn new(worker: Arc<ServiceWorker>, origin: Url) -> Self {
        Self { worker, origin: Arc::new(origin), tool_router: Self::tool_router() }
    }

    #[tool(description = "Deliver the install event: fetch every precache asset into the current cache generation, then skip waiting and take control. Fails without writing anything if any asset cannot be fetched.")]
    async fn sw_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    #[tool(description = "Deliver the activate event: delete every cache generation except the current one and start controlling fetches. Refused unless install succeeded.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    /// Intercept a request.
    ///
    /// Static assets are cache-first, API calls network-first with a TTL-bounded fallback,
    /// everything else network-first with a cache fallback.
    #[tool(description = "Intercept a request from the travel page. Returns the response plus the lane that handled it and whether it came from network, cache, the offline page or a synthesized 503.")]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, &self.origin, params.0).await
    }

    #[tool(description = "Post a page message: SKIP_WAITING (activate now, no reply), GET_VERSION (reply with generation name) or CLEAR_CACHE (delete current generation).")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.worker, params.0).await
    }

    #[tool(description = "Deliver a background-sync trigger. Offline writes are not queued; the trigger is acknowledged.")]
    async fn sw_sync(&self, params: Parameters<SwSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.worker, params.0).await
    }

    #[tool(description = "Deliver a push message and return the notification that would be shown.")]
    async fn sw_push(&self, params: Parameters<SwPushParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.worker, params.0).await
    }

    #[tool(description = "Inspect the stored entry a request would be answered from, with its freshness metadata. Never touches the network.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.worker, &self.origin, params.0).await
    }
}

impl ServerHandler for ItineraServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "itinera".into(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::support::{origin, worker};

    #[tokio::test]
    async fn test_lists_every_tool() {
        let (worker, _network) = worker().await;
        let server = ItineraServer::new(worker, origin());

        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();

        assert_eq!(
            names,
            vec!["cache_get", "sw_activate", "sw_fetch", "sw_install", "sw_message", "sw_push", "sw_sync"]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let (worker, _network) = worker().await;
        let info = ItineraServer::new(worker, origin()).get_info();
        assert_eq!(info.server_info.name, "itinera");
    }
}
