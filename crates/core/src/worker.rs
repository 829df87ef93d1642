//! The worker: one object receiving every inbound event from the host.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::hash::{api_key, request_key};
use crate::cache::{CacheDb, CacheEntry, GenerationStore};
use crate::classify::{Classifier, Lane};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::exchange::Request;
use crate::lifecycle::{ActivateReport, InstallReport, Lifecycle, WorkerState};
use crate::messages::{ClientMessage, MessageReply, Notification};
use crate::network::Network;
use crate::policy::PolicyTable;
use crate::refresh::Refresher;
use crate::strategy::{Outcome, ResponseSource, StrategyEngine};

/// Result of a background-sync trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SyncReport {
    pub tag: String,
    pub accepted: bool,
}

pub struct ServiceWorker {
    lifecycle: Lifecycle,
    classifier: Classifier,
    engine: StrategyEngine,
    network: Arc<dyn Network>,
    clock: Arc<dyn Clock>,
}

impl ServiceWorker {
    pub fn new(db: CacheDb, config: &AppConfig, network: Arc<dyn Network>, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        let lifecycle = Lifecycle::new(
            db,
            config.cache_name.clone(),
            &config.origin,
            config.precache.clone(),
            Arc::clone(&network),
        )?;
        let engine = StrategyEngine::new(
            lifecycle.store(),
            Arc::new(PolicyTable::from_config(&config.policy)),
            Arc::clone(&network),
            Arc::clone(&clock),
        );

        Ok(Self { lifecycle, classifier: Classifier::new(&config.api_hosts), engine, network, clock })
    }

    /// Current generation name.
    pub fn version(&self) -> &str {
        self.lifecycle.generation()
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.state()
    }

    pub fn is_controlling(&self) -> bool {
        self.lifecycle.is_controlling()
    }

    pub fn store(&self) -> &GenerationStore {
        self.engine.store()
    }

    pub fn refresher(&self) -> &Refresher {
        self.engine.refresher()
    }

    pub fn classify(&self, request: &Request) -> Lane {
        self.classifier.classify(request)
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// The stored entry a request would be answered from, keyed the way its
    /// lane keys it. Read-only: no network, no refresh.
    pub async fn lookup(&self, request: &Request) -> Result<Option<CacheEntry>, Error> {
        let key = match self.classify(request) {
            Lane::DynamicApi => api_key(&request.url),
            Lane::StaticAsset | Lane::Passthrough => request_key(&request.method, &request.url),
        };
        self.store().get(&key).await
    }

    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.lifecycle.install().await
    }

    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        self.lifecycle.activate().await
    }

    /// Activate now if installed and waiting. `None` when there was nothing to do.
    pub async fn skip_waiting(&self) -> Result<Option<ActivateReport>, Error> {
        self.lifecycle.skip_waiting().await
    }

    /// Intercept a request.
    ///
    /// Until clients are claimed the request goes straight to the network;
    /// afterwards it is classified and handed to its lane's strategy.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Outcome, Error> {
        let lane = self.classify(request);

        if !self.is_controlling() {
            tracing::debug!(url = %request.url, state = %self.state(), "not controlling, fetching directly");
            let response = self.network.fetch(request).await?;
            return Ok(Outcome::new(lane, ResponseSource::Network, response));
        }

        tracing::debug!(url = %request.url, lane = lane.as_str(), "intercepted");
        self.engine.execute(lane, request).await
    }

    /// Handle a page message. `SKIP_WAITING` has no reply.
    pub async fn handle_message(&self, message: ClientMessage) -> Result<Option<MessageReply>, Error> {
        tracing::debug!(message = message.as_str(), "message received");
        match message {
            ClientMessage::SkipWaiting => {
                self.skip_waiting().await?;
                Ok(None)
            }
            ClientMessage::GetVersion => Ok(Some(MessageReply::Version { version: self.version().to_string() })),
            ClientMessage::ClearCache => {
                self.lifecycle.clear().await?;
                Ok(Some(MessageReply::Cleared { success: true }))
            }
        }
    }

    /// Background-sync trigger. Offline writes are not queued, so there is
    /// nothing to replay; the trigger is logged and accepted.
    pub fn sync(&self, tag: &str) -> Result<SyncReport, Error> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::InvalidInput("sync tag must not be empty".into()));
        }
        tracing::info!(tag, "background sync triggered");
        Ok(SyncReport { tag: tag.to_string(), accepted: true })
    }

    /// Push delivery: build the notification to show.
    pub fn push(&self, payload: Option<&str>) -> Notification {
        let notification = Notification::from_push(payload);
        tracing::info!(title = %notification.title, "push received");
        notification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;
    use crate::testing::ScriptedNetwork;
    use http::StatusCode;
    use url::Url;

    const INDEX: &str = "http://localhost:8080/index.html";
    const WEATHER: &str = "https://api.openweathermap.org/data/2.5/weather?city=Yokohama";

    fn config() -> AppConfig {
        AppConfig {
            precache: vec!["/".into(), "/index.html".into()],
            ..AppConfig::default()
        }
    }

    async fn worker() -> (ServiceWorker, Arc<ScriptedNetwork>, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(ScriptedNetwork::new());
        network.respond("http://localhost:8080/", 200, "text/html", "<h1>Home</h1>");
        network.respond(INDEX, 200, "text/html", "<h1>Planner</h1>");
        let clock = Arc::new(ManualClock::new(1_760_000_000_000));
        let worker = ServiceWorker::new(db.clone(), &config(), network.clone(), clock).unwrap();
        (worker, network, db)
    }

    async fn active_worker() -> (ServiceWorker, Arc<ScriptedNetwork>, CacheDb) {
        let (worker, network, db) = worker().await;
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        (worker, network, db)
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_uncontrolled_fetch_goes_to_network() {
        let (worker, network, _db) = worker().await;

        let outcome = worker.handle_fetch(&get(WEATHER)).await;
        assert!(matches!(outcome, Err(Error::NetworkUnavailable(_))));
        assert_eq!(network.call_count(WEATHER), 1);
        assert_eq!(worker.store().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_controlled_fetch_uses_strategies() {
        let (worker, network, _db) = active_worker().await;
        network.go_offline_everywhere();

        let page = worker.handle_fetch(&get(INDEX)).await.unwrap();
        assert_eq!(page.lane, Lane::StaticAsset);
        assert_eq!(page.source, ResponseSource::Cache);
        assert_eq!(page.response.text(), "<h1>Planner</h1>");

        let api = worker.handle_fetch(&get(WEATHER)).await.unwrap();
        assert_eq!(api.lane, Lane::DynamicApi);
        assert_eq!(api.response.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_offline_navigation_to_unknown_page() {
        let (worker, network, _db) = active_worker().await;
        network.go_offline_everywhere();

        let request = Request::navigate(Url::parse("http://localhost:8080/trips/kyoto.html").unwrap());
        let outcome = worker.handle_fetch(&request).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::OfflinePage);
    }

    #[tokio::test]
    async fn test_restart_offline_serves_stored_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let clock = Arc::new(ManualClock::new(1_760_000_000_000));

        let online = Arc::new(ScriptedNetwork::new());
        online.respond("http://localhost:8080/", 200, "text/html", "<h1>Home</h1>");
        online.respond(INDEX, 200, "text/html", "<h1>Planner</h1>");
        let db = CacheDb::open(&path).await.unwrap();
        let before = ServiceWorker::new(db, &config(), online, clock.clone()).unwrap();
        before.install().await.unwrap();
        before.activate().await.unwrap();
        drop(before);

        let offline = Arc::new(ScriptedNetwork::new());
        let db = CacheDb::open(&path).await.unwrap();
        let worker = ServiceWorker::new(db, &config(), offline, clock).unwrap();
        assert!(worker.install().await.is_err());
        assert!(worker.is_controlling());

        let page = worker.handle_fetch(&Request::navigate(Url::parse(INDEX).unwrap())).await.unwrap();
        assert_eq!(page.source, ResponseSource::Cache);
        assert_eq!(page.response.text(), "<h1>Planner</h1>");

        let unknown = Request::navigate(Url::parse("http://localhost:8080/trips/kyoto.html").unwrap());
        assert_eq!(worker.handle_fetch(&unknown).await.unwrap().source, ResponseSource::OfflinePage);
    }

    #[tokio::test]
    async fn test_get_version_is_idempotent() {
        let (worker, _network, _db) = active_worker().await;
        let expected = Some(MessageReply::Version { version: "travel-planner-v1".into() });

        assert_eq!(worker.handle_message(ClientMessage::GetVersion).await.unwrap(), expected);
        assert_eq!(worker.handle_message(ClientMessage::GetVersion).await.unwrap(), expected);
        assert_eq!(worker.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates() {
        let (worker, _network, _db) = worker().await;
        worker.install().await.unwrap();
        assert!(!worker.is_controlling());

        let reply = worker.handle_message(ClientMessage::SkipWaiting).await.unwrap();
        assert_eq!(reply, None);
        assert!(worker.is_controlling());
    }

    #[tokio::test]
    async fn test_clear_cache_message() {
        let (worker, network, db) = active_worker().await;

        let reply = worker.handle_message(ClientMessage::ClearCache).await.unwrap();
        assert_eq!(reply, Some(MessageReply::Cleared { success: true }));
        assert!(!db.has_generation("travel-planner-v1").await.unwrap());

        worker.handle_fetch(&get(INDEX)).await.unwrap();
        assert_eq!(network.call_count(INDEX), 2);
        assert_eq!(worker.store().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lookup_uses_lane_key() {
        let (worker, network, _db) = active_worker().await;
        network.respond(WEATHER, 200, "application/json", r#"{"temp":21}"#);
        worker.handle_fetch(&get(WEATHER)).await.unwrap();

        let api = worker.lookup(&get(WEATHER)).await.unwrap().unwrap();
        assert_eq!(api.key, "/data/2.5/weather?city=Yokohama");
        assert!(api.is_fresh(worker.now_ms()));

        let page = worker.lookup(&get(INDEX)).await.unwrap().unwrap();
        assert_eq!(page.key, format!("GET {INDEX}"));
        assert!(worker.lookup(&get("http://localhost:8080/missing.css")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sync_stub() {
        let (worker, _network, _db) = worker().await;
        let report = worker.sync("sync-itinerary").unwrap();
        assert!(report.accepted);
        assert!(matches!(worker.sync("  "), Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_push_builds_notification() {
        let (worker, _network, _db) = worker().await;
        let n = worker.push(Some(r#"{"title":"Flight delayed"}"#));
        assert_eq!(n.title, "Flight delayed");
    }
}
