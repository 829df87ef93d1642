//! sw_sync and sw_push tool implementations.

use itinera_core::ServiceWorker;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the sw_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncParams {
    /// Background-sync registration tag.
    pub tag: String,
}

/// Parameters for the sw_push tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwPushParams {
    /// Push payload: a JSON object with optional `title` and `body`, or
    /// plain text used as the body.
    #[serde(default)]
    pub payload: Option<String>,
}

/// Implementation of the sw_sync tool.
pub async fn sync_impl(worker: &ServiceWorker, params: SwSyncParams) -> Result<CallToolResult, McpError> {
    let report = worker.sync(&params.tag)?;
    json_result(&report)
}

/// Implementation of the sw_push tool.
pub async fn push_impl(worker: &ServiceWorker, params: SwPushParams) -> Result<CallToolResult, McpError> {
    let notification = worker.push(params.payload.as_deref());
    json_result(&notification)
}
