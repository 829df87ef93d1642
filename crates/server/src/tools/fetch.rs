//! sw_fetch tool implementation.
//!
//! Delivers an intercepted request to the worker and reports which lane
//! handled it and where the response came from.

use std::collections::BTreeMap;

use itinera_core::{Lane, ResponseSource, ServiceWorker};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{json_result, parse_request};

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Request URL. Paths resolve against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Request mode: "navigate", "same-origin" (default), "no-cors" or "cors".
    #[serde(default)]
    pub mode: Option<String>,
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// The resolved request URL.
    pub url: String,
    pub lane: Lane,
    pub source: ResponseSource,
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(worker: &ServiceWorker, origin: &Url, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let request = parse_request(origin, &params.url, params.method.as_deref(), params.mode.as_deref())?;
    let outcome = worker.handle_fetch(&request).await?;

    let headers = outcome
        .response
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();

    let output = SwFetchOutput {
        url: request.url.to_string(),
        lane: outcome.lane,
        source: outcome.source,
        status: outcome.response.status.as_u16(),
        content_type: outcome.response.content_type().map(str::to_string),
        headers,
        body: outcome.response.text().into_owned(),
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::support::{INDEX, WEATHER, active_worker, origin, output, worker};

    fn params(url: &str) -> SwFetchParams {
        SwFetchParams { url: url.to_string(), method: None, mode: None }
    }

    #[tokio::test]
    async fn test_fetch_static_from_cache() {
        let (worker, network) = active_worker().await;
        network.go_offline_everywhere();

        let out: SwFetchOutput = output(&fetch_impl(&worker, &origin(), params("/index.html")).await.unwrap());
        assert_eq!(out.url, INDEX);
        assert_eq!(out.lane, Lane::StaticAsset);
        assert_eq!(out.source, ResponseSource::Cache);
        assert_eq!(out.body, "<h1>Planner</h1>");
    }

    #[tokio::test]
    async fn test_fetch_api_offline_is_503() {
        let (worker, _network) = active_worker().await;

        let out: SwFetchOutput = output(&fetch_impl(&worker, &origin(), params(WEATHER)).await.unwrap());
        assert_eq!(out.lane, Lane::DynamicApi);
        assert_eq!(out.source, ResponseSource::Synthesized);
        assert_eq!(out.status, 503);
        assert_eq!(out.content_type.as_deref(), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(&out.body).unwrap();
        assert_eq!(body["cached"], false);
    }

    #[tokio::test]
    async fn test_fetch_api_stores_freshness_headers() {
        let (worker, network) = active_worker().await;
        network.respond(WEATHER, 200, "application/json", r#"{"temp":19}"#);
        fetch_impl(&worker, &origin(), params(WEATHER)).await.unwrap();
        network.go_offline_everywhere();

        let out: SwFetchOutput = output(&fetch_impl(&worker, &origin(), params(WEATHER)).await.unwrap());
        assert_eq!(out.source, ResponseSource::Cache);
        assert_eq!(out.headers.get("sw-ttl").map(String::as_str), Some("600000"));
    }

    #[tokio::test]
    async fn test_fetch_offline_navigation() {
        let (worker, network) = active_worker().await;
        network.go_offline_everywhere();

        let p = SwFetchParams { url: "/trips/osaka.html".into(), method: None, mode: Some("navigate".into()) };
        let out: SwFetchOutput = output(&fetch_impl(&worker, &origin(), p).await.unwrap());
        assert_eq!(out.source, ResponseSource::OfflinePage);
        assert_eq!(out.status, 200);
    }

    #[tokio::test]
    async fn test_fetch_before_activation_is_uncontrolled() {
        let (worker, _network) = worker().await;

        let out: SwFetchOutput = output(&fetch_impl(&worker, &origin(), params("/index.html")).await.unwrap());
        assert_eq!(out.source, ResponseSource::Network);
        assert_eq!(worker.store().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_passthrough_miss_is_error() {
        let (worker, _network) = active_worker().await;
        let err = fetch_impl(&worker, &origin(), params("https://fonts.gstatic.com/s/inter/v1/font"))
            .await
            .unwrap_err();
        assert_eq!(err.code.0, -32004);
    }
}
