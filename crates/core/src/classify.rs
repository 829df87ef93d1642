//! Request classification into lanes.

use http::Method;
use serde::{Deserialize, Serialize};

use crate::exchange::Request;

/// File extensions served from the static-asset lane.
const STATIC_EXTENSIONS: &[&str] = &["html", "htm", "css", "js", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico"];

/// Coarse category a request is routed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Page shell, styles, scripts and images: cache-first.
    StaticAsset,
    /// Third-party or `/api/` data: network-first with a TTL-bounded fallback.
    DynamicApi,
    /// Everything else: network-first, store only as a last resort.
    Passthrough,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::StaticAsset => "static_asset",
            Lane::DynamicApi => "dynamic_api",
            Lane::Passthrough => "passthrough",
        }
    }

    /// Inverse of [`Lane::as_str`].
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "static_asset" => Some(Lane::StaticAsset),
            "dynamic_api" => Some(Lane::DynamicApi),
            "passthrough" => Some(Lane::Passthrough),
            _ => None,
        }
    }
}

/// Assigns incoming requests to a [`Lane`].
#[derive(Debug, Clone)]
pub struct Classifier {
    api_hosts: Vec<String>,
}

impl Classifier {
    /// `api_hosts` are host substrings that identify API providers.
    pub fn new(api_hosts: &[String]) -> Self {
        Self { api_hosts: api_hosts.iter().map(|h| h.to_ascii_lowercase()).collect() }
    }

    /// Classify a request. Static-asset wins over API when both match.
    pub fn classify(&self, request: &Request) -> Lane {
        if is_static_asset(request) {
            Lane::StaticAsset
        } else if self.is_api(request) {
            Lane::DynamicApi
        } else {
            Lane::Passthrough
        }
    }

    fn is_api(&self, request: &Request) -> bool {
        let host = request.url.host_str().unwrap_or("").to_ascii_lowercase();
        self.api_hosts.iter().any(|h| host.contains(h.as_str()))
            || host.contains("weather")
            || request.url.path().to_ascii_lowercase().contains("/api/")
    }
}

fn is_static_asset(request: &Request) -> bool {
    if request.method != Method::GET {
        return false;
    }

    let path = request.url.path();
    if path == "/" {
        return true;
    }

    let file_name = path.rsplit('/').next().unwrap_or("");
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| STATIC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
