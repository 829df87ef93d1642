//! cache_get tool implementation.
//!
//! Retrieves the stored entry a request would be answered from, without
//! touching the network.

use itinera_core::{Error, Lane, ServiceWorker};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::tools::{json_result, parse_request};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Request URL. Paths resolve against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub generation: String,
    pub key: String,
    pub url: String,
    pub lane: Lane,
    pub status: u16,
    pub content_type: Option<String>,
    /// SHA-256 of the body.
    pub digest: String,
    /// Milliseconds since epoch; API entries only.
    pub cached_at: Option<i64>,
    /// Milliseconds; API entries only.
    pub ttl: Option<i64>,
    /// Whether an API entry is still inside its TTL. Absent for entries
    /// without freshness metadata.
    pub fresh: Option<bool>,
    pub body: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(worker: &ServiceWorker, origin: &Url, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let request = parse_request(origin, &params.url, params.method.as_deref(), None)?;
    let entry = worker
        .lookup(&request)
        .await?
        .ok_or_else(|| Error::CacheMiss(request.url.to_string()))?;

    let response = entry.to_response();
    let fresh = entry.ttl.map(|_| entry.is_fresh(worker.now_ms()));

    let output = CacheGetOutput {
        generation: worker.version().to_string(),
        content_type: response.content_type().map(str::to_string),
        body: response.text().into_owned(),
        fresh,
        key: entry.key,
        url: entry.url,
        lane: entry.lane,
        status: entry.status,
        digest: entry.digest,
        cached_at: entry.cached_at,
        ttl: entry.ttl,
    };

    json_result(&output)
}
