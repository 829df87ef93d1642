//! MCP tool implementations.
//!
//! This module contains all tools exposed by the itinera server. Each tool
//! delivers one kind of host event to the worker.

pub mod cache;
pub mod events;
pub mod fetch;
pub mod lifecycle;
pub mod message;

use http::Method;
use itinera_client::resolve;
use itinera_core::{Error, Request, RequestMode};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use url::Url;

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Build a worker request from tool parameters.
pub(crate) fn parse_request(
    origin: &Url, url: &str, method: Option<&str>, mode: Option<&str>,
) -> Result<Request, Error> {
    let url = resolve(url, origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let method = match method.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {m}")))?,
        None => Method::GET,
    };

    let mode = match mode {
        Some(m) => m.parse::<RequestMode>()?,
        None => RequestMode::default(),
    };

    Ok(Request::new(method, url).with_mode(mode))
}
