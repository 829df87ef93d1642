//! Retrieval strategies.
//!
//! Each lane has exactly one strategy:
//!
//! - static asset: cache-first, with a detached background refresh on hit
//! - dynamic API: network-first, falling back to a cache entry still inside
//!   its TTL, else a synthesized 503
//! - passthrough: network-first, falling back to any cache entry

use std::sync::Arc;

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::hash::{api_key, request_key};
use crate::cache::{CacheEntry, GenerationStore};
use crate::classify::Lane;
use crate::clock::Clock;
use crate::exchange::{Request, Response};
use crate::fallback::offline_page;
use crate::network::Network;
use crate::policy::PolicyTable;
use crate::refresh::{RefreshJob, Refresher};

/// Where a returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflinePage,
    Synthesized,
}

/// A handled request.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub lane: Lane,
    pub source: ResponseSource,
    pub response: Response,
}

impl Outcome {
    pub(crate) fn new(lane: Lane, source: ResponseSource, response: Response) -> Self {
        Self { lane, source, response }
    }
}

/// Runs the per-lane strategies against one store generation.
#[derive(Clone)]
pub struct StrategyEngine {
    store: GenerationStore,
    policy: Arc<PolicyTable>,
    network: Arc<dyn Network>,
    clock: Arc<dyn Clock>,
    refresher: Refresher,
}

impl StrategyEngine {
    pub fn new(
        store: GenerationStore, policy: Arc<PolicyTable>, network: Arc<dyn Network>, clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, policy, network, clock, refresher: Refresher::new() }
    }

    pub fn store(&self) -> &GenerationStore {
        &self.store
    }

    pub fn refresher(&self) -> &Refresher {
        &self.refresher
    }

    /// Run the strategy owned by `lane`.
    pub async fn execute(&self, lane: Lane, request: &Request) -> Result<Outcome, Error> {
        match lane {
            Lane::StaticAsset => self.cache_first(request).await,
            Lane::DynamicApi => Ok(self.network_first_api(request).await),
            Lane::Passthrough => self.network_first_passthrough(request).await,
        }
    }

    /// Cache-first with background refresh.
    ///
    /// A hit is returned at once while a detached task revalidates it. A miss
    /// goes to the network and stores 2xx responses. A failed navigation
    /// miss yields the offline page; any other failed miss is an error.
    pub async fn cache_first(&self, request: &Request) -> Result<Outcome, Error> {
        let key = request_key(&request.method, &request.url);

        if let Some(entry) = self.lookup(&key).await {
            tracing::debug!(%key, "static cache hit");
            let response = entry.to_response();
            self.refresher.spawn(RefreshJob {
                store: self.store.clone(),
                network: Arc::clone(&self.network),
                request: request.clone(),
                stale: entry,
            });
            return Ok(Outcome::new(Lane::StaticAsset, ResponseSource::Cache, response));
        }

        tracing::debug!(%key, "static cache miss");
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    let entry = CacheEntry::from_response(key, &request.url, Lane::StaticAsset, &response);
                    self.store_quietly(&entry).await;
                }
                Ok(Outcome::new(Lane::StaticAsset, ResponseSource::Network, response))
            }
            Err(e) if request.is_navigation() => {
                tracing::debug!(url = %request.url, error = %e, "navigation failed offline, serving offline page");
                Ok(Outcome::new(Lane::StaticAsset, ResponseSource::OfflinePage, offline_page()))
            }
            Err(e) => Err(e),
        }
    }

    /// Network-first with a TTL-bounded cache fallback.
    ///
    /// Always produces exactly one of: the live network response, a cache
    /// entry still inside its TTL, or a synthesized 503.
    pub async fn network_first_api(&self, request: &Request) -> Outcome {
        let key = api_key(&request.url);

        match self.network.fetch(request).await {
            Ok(response) if response.is_success() => {
                let policy = self.policy.resolve(&request.url);
                let entry = CacheEntry::from_response(&key, &request.url, Lane::DynamicApi, &response)
                    .with_freshness(self.clock.now_ms(), policy.ttl_ms());
                tracing::debug!(%key, category = policy.category.as_str(), ttl_ms = policy.ttl_ms(), "api response stored");
                self.store_quietly(&entry).await;
                return Outcome::new(Lane::DynamicApi, ResponseSource::Network, response);
            }
            Ok(response) => tracing::debug!(%key, status = response.status.as_u16(), "api responded without success"),
            Err(e) => tracing::debug!(%key, error = %e, "api fetch failed"),
        }

        let now = self.clock.now_ms();
        match self.lookup(&key).await {
            Some(entry) if entry.is_fresh(now) => {
                tracing::debug!(%key, age_ms = entry.age_ms(now), "serving api response from cache");
                Outcome::new(Lane::DynamicApi, ResponseSource::Cache, entry.to_response())
            }
            Some(entry) => {
                tracing::debug!(%key, age_ms = entry.age_ms(now), "cached api response expired");
                Outcome::new(Lane::DynamicApi, ResponseSource::Synthesized, offline_error())
            }
            None => Outcome::new(Lane::DynamicApi, ResponseSource::Synthesized, offline_error()),
        }
    }

    /// Network-first, falling back to whatever is stored under the request
    /// key. A miss propagates the network error.
    pub async fn network_first_passthrough(&self, request: &Request) -> Result<Outcome, Error> {
        match self.network.fetch(request).await {
            Ok(response) => Ok(Outcome::new(Lane::Passthrough, ResponseSource::Network, response)),
            Err(e) => {
                let key = request_key(&request.method, &request.url);
                match self.lookup(&key).await {
                    Some(entry) => {
                        tracing::debug!(%key, "network failed, serving stored copy");
                        Ok(Outcome::new(Lane::Passthrough, ResponseSource::Cache, entry.to_response()))
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Store read; failures count as a miss.
    async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        match self.store.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Opportunistic write; failures are logged and otherwise ignored.
    async fn store_quietly(&self, entry: &CacheEntry) {
        if let Err(e) = self.store.put(entry).await {
            tracing::warn!(key = %entry.key, error = %e, "cache write failed");
        }
    }
}

/// The 503 returned when an API request can be answered neither by the
/// network nor by a fresh cache entry. Never stored.
pub fn offline_error() -> Response {
    Response::json(
        StatusCode::SERVICE_UNAVAILABLE,
        &serde_json::json!({
            "error": "Network unavailable",
            "message": "You appear to be offline and no recent data is cached for this request.",
            "cached": false,
        }),
    )
}
