//! sw_message tool implementation.
//!
//! Posts a structured page message (`SKIP_WAITING`, `GET_VERSION`,
//! `CLEAR_CACHE`) to the worker.

use itinera_core::{ClientMessage, MessageReply, ServiceWorker, WorkerState};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message type: "SKIP_WAITING", "GET_VERSION" or "CLEAR_CACHE".
    #[serde(rename = "type")]
    pub kind: String,
}

/// Output from the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    /// Reply posted back to the page; absent for `SKIP_WAITING`.
    pub reply: Option<MessageReply>,
    pub state: WorkerState,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(worker: &ServiceWorker, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let message: ClientMessage = params.kind.parse()?;
    let reply = worker.handle_message(message).await?;
    json_result(&SwMessageOutput { reply, state: worker.state() })
}
