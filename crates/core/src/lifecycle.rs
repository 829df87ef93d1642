//! Versioned store lifecycle: install seeds the current generation, activate
//! garbage-collects every other one and claims clients.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::try_join_all;
use http::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::hash::request_key;
use crate::cache::{CacheDb, CacheEntry, GenerationStore};
use crate::classify::Lane;
use crate::exchange::Request;
use crate::network::Network;

/// Where the worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed. A new install attempt may be made.
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub generation: String,
    /// Number of precached assets written.
    pub cached: usize,
    /// Install asks to be activated without waiting for old clients.
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct ActivateReport {
    pub generation: String,
    /// Generations removed, oldest first.
    pub deleted: Vec<String>,
}

/// Drives install and activate for one generation name.
pub struct Lifecycle {
    db: CacheDb,
    generation: String,
    origin: Url,
    precache: Vec<String>,
    network: Arc<dyn Network>,
    state: Mutex<WorkerState>,
    claimed: AtomicBool,
    /// Held for the whole of install or activate so transitions never overlap.
    transition: tokio::sync::Mutex<()>,
}

impl Lifecycle {
    pub fn new(
        db: CacheDb, generation: impl Into<String>, origin: &str, precache: Vec<String>, network: Arc<dyn Network>,
    ) -> Result<Self, Error> {
        let origin = Url::parse(origin).map_err(|e| Error::InvalidUrl(format!("origin {origin}: {e}")))?;
        Ok(Self {
            db,
            generation: generation.into(),
            origin,
            precache,
            network,
            state: Mutex::new(WorkerState::Parsed),
            claimed: AtomicBool::new(false),
            transition: tokio::sync::Mutex::new(()),
        })
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Handle to the current generation.
    pub fn store(&self) -> GenerationStore {
        self.db.generation(&self.generation)
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        tracing::info!(generation = %self.generation, from = %*state, to = %next, "worker state changed");
        *state = next;
    }

    /// Whether fetches are routed through the strategies.
    pub fn is_controlling(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    /// Install: fetch every precache asset and write them all to the current
    /// generation in one transaction.
    ///
    /// Any fetch error or non-2xx response aborts with
    /// [`Error::InstallFailed`]; nothing is written and a generation created
    /// by this attempt is removed. A first install that fails leaves the
    /// worker redundant, unless the current generation survives from an
    /// earlier run: that generation stays in control. Installing an already
    /// installed or active worker re-seeds the precache without changing state.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let _guard = self.transition.lock().await;

        let first = match self.state() {
            WorkerState::Parsed | WorkerState::Redundant => true,
            WorkerState::Installed | WorkerState::Activated => false,
            other => return Err(Error::InvalidState(format!("cannot install while {other}"))),
        };
        // Only a completed install leaves the current generation behind.
        let inherited = first && self.db.has_generation(&self.generation).await?;
        if first {
            self.set_state(WorkerState::Installing);
        }

        match self.seed().await {
            Ok(cached) => {
                if first {
                    self.set_state(WorkerState::Installed);
                }
                tracing::info!(generation = %self.generation, cached, "precache complete");
                Ok(InstallReport { generation: self.generation.clone(), cached, skip_waiting: true })
            }
            Err(e) => {
                tracing::warn!(generation = %self.generation, error = %e, "install failed");
                if inherited {
                    tracing::info!(generation = %self.generation, "keeping stored generation in control");
                    self.claimed.store(true, Ordering::SeqCst);
                    self.set_state(WorkerState::Activated);
                } else if first {
                    self.set_state(WorkerState::Redundant);
                }
                Err(e)
            }
        }
    }

    async fn seed(&self) -> Result<usize, Error> {
        let urls = self.precache_urls()?;
        let (store, created) = self.db.open_generation(&self.generation).await?;

        let fetched = try_join_all(urls.iter().map(|url| self.fetch_asset(url))).await;
        let written = match fetched {
            Ok(entries) => store.put_all(&entries).await.map(|()| entries.len()),
            Err(e) => Err(e),
        };

        if written.is_err()
            && created
            && let Err(e) = self.db.delete_generation(&self.generation).await
        {
            tracing::warn!(generation = %self.generation, error = %e, "failed to remove partial generation");
        }
        written
    }

    async fn fetch_asset(&self, url: &Url) -> Result<CacheEntry, Error> {
        let request = Request::get(url.clone());
        let response = self
            .network
            .fetch(&request)
            .await
            .map_err(|e| Error::InstallFailed(format!("{url}: {e}")))?;

        if !response.is_success() {
            return Err(Error::InstallFailed(format!("{url}: status {}", response.status.as_u16())));
        }

        Ok(CacheEntry::from_response(request_key(&Method::GET, url), url, Lane::StaticAsset, &response))
    }

    fn precache_urls(&self) -> Result<Vec<Url>, Error> {
        self.precache
            .iter()
            .map(|asset| {
                self.origin
                    .join(asset)
                    .map_err(|e| Error::InstallFailed(format!("bad precache entry {asset}: {e}")))
            })
            .collect()
    }

    /// Activate: delete every generation other than the current one, then
    /// claim clients. Refused unless install succeeded. Activating an active
    /// worker only collects generations again.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let _guard = self.transition.lock().await;

        let previous = self.state();
        match previous {
            WorkerState::Installed => self.set_state(WorkerState::Activating),
            WorkerState::Activated => {}
            other => return Err(Error::InvalidState(format!("cannot activate a worker that is {other}"))),
        }

        let deleted = match self.collect_stale().await {
            Ok(deleted) => deleted,
            Err(e) => {
                if previous == WorkerState::Installed {
                    self.set_state(WorkerState::Installed);
                }
                return Err(e);
            }
        };

        self.claimed.store(true, Ordering::SeqCst);
        if previous == WorkerState::Installed {
            self.set_state(WorkerState::Activated);
        }

        Ok(ActivateReport { generation: self.generation.clone(), deleted })
    }

    async fn collect_stale(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.db.generation_names().await? {
            if name == self.generation {
                continue;
            }
            if self.db.delete_generation(&name).await? {
                tracing::info!(generation = %name, "deleted stale generation");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Activate now if installed and waiting; otherwise nothing to do.
    pub async fn skip_waiting(&self) -> Result<Option<ActivateReport>, Error> {
        if self.state() == WorkerState::Installed {
            return self.activate().await.map(Some);
        }
        tracing::debug!(state = %self.state(), "skip waiting ignored");
        Ok(None)
    }

    /// Delete the current generation. Later writes recreate it.
    pub async fn clear(&self) -> Result<bool, Error> {
        let removed = self.db.delete_generation(&self.generation).await?;
        tracing::info!(generation = %self.generation, removed, "current generation cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::Response;
    use crate::testing::ScriptedNetwork;

    const ORIGIN: &str = "http://localhost:8080";
    const FONT: &str = "https://fonts.googleapis.com/css2?family=Inter";

    fn precache() -> Vec<String> {
        vec!["/".into(), "/index.html".into(), "/manifest.json".into(), FONT.into()]
    }

    fn serve_all(network: &ScriptedNetwork) {
        network.respond("http://localhost:8080/", 200, "text/html", "<h1>Planner</h1>");
        network.respond("http://localhost:8080/index.html", 200, "text/html", "<h1>Planner</h1>");
        network.respond("http://localhost:8080/manifest.json", 200, "application/json", "{}");
        network.respond(FONT, 200, "text/css", "@font-face {}");
    }

    async fn lifecycle(generation: &str) -> (Lifecycle, CacheDb, Arc<ScriptedNetwork>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(ScriptedNetwork::new());
        let lifecycle = Lifecycle::new(db.clone(), generation, ORIGIN, precache(), network.clone()).unwrap();
        (lifecycle, db, network)
    }

    #[tokio::test]
    async fn test_install_seeds_precache() {
        let (lifecycle, db, network) = lifecycle("travel-planner-v1").await;
        serve_all(&network);

        let report = lifecycle.install().await.unwrap();
        assert_eq!(report.cached, 4);
        assert!(report.skip_waiting);
        assert_eq!(lifecycle.state(), WorkerState::Installed);
        assert!(!lifecycle.is_controlling());

        let store = db.generation("travel-planner-v1");
        assert_eq!(store.len().await.unwrap(), 4);
        let index = Url::parse("http://localhost:8080/index.html").unwrap();
        assert!(store.get(&request_key(&Method::GET, &index)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_install_failure_leaves_nothing() {
        let (lifecycle, db, network) = lifecycle("travel-planner-v1").await;
        serve_all(&network);
        network.respond("http://localhost:8080/manifest.json", 404, "text/plain", "missing");

        let result = lifecycle.install().await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(lifecycle.state(), WorkerState::Redundant);
        assert!(!db.has_generation("travel-planner-v1").await.unwrap());

        let activated = lifecycle.activate().await;
        assert!(matches!(activated, Err(Error::InvalidState(_))));
        assert!(!lifecycle.is_controlling());
    }

    #[tokio::test]
    async fn test_install_offline_asset_fails() {
        let (lifecycle, db, network) = lifecycle("travel-planner-v1").await;
        serve_all(&network);
        network.go_offline(FONT);

        assert!(matches!(lifecycle.install().await, Err(Error::InstallFailed(_))));
        assert!(!db.has_generation("travel-planner-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_install_keeps_existing_generation() {
        let (lifecycle, db, _network) = lifecycle("travel-planner-v1").await;
        let store = db.generation("travel-planner-v1");
        let url = Url::parse("http://localhost:8080/app.js").unwrap();
        let entry = CacheEntry::from_response(
            request_key(&Method::GET, &url),
            &url,
            Lane::StaticAsset,
            &Response::new(http::StatusCode::OK, "run()"),
        );
        store.put(&entry).await.unwrap();

        assert!(lifecycle.install().await.is_err());
        assert!(db.has_generation("travel-planner-v1").await.unwrap());
        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(lifecycle.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_failed_install_after_restart_keeps_control() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");

        let db = CacheDb::open(&path).await.unwrap();
        let network = Arc::new(ScriptedNetwork::new());
        serve_all(&network);
        let first = Lifecycle::new(db, "travel-planner-v1", ORIGIN, precache(), network).unwrap();
        first.install().await.unwrap();
        first.activate().await.unwrap();
        drop(first);

        let db = CacheDb::open(&path).await.unwrap();
        let offline = Arc::new(ScriptedNetwork::new());
        let restarted = Lifecycle::new(db.clone(), "travel-planner-v1", ORIGIN, precache(), offline).unwrap();

        assert!(matches!(restarted.install().await, Err(Error::InstallFailed(_))));
        assert_eq!(restarted.state(), WorkerState::Activated);
        assert!(restarted.is_controlling());
        assert_eq!(db.generation("travel-planner-v1").len().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_retry_after_redundant() {
        let (lifecycle, _db, network) = lifecycle("travel-planner-v1").await;
        assert!(lifecycle.install().await.is_err());

        serve_all(&network);
        lifecycle.install().await.unwrap();
        assert_eq!(lifecycle.state(), WorkerState::Installed);
    }

    #[tokio::test]
    async fn test_activate_before_install_refused() {
        let (lifecycle, _db, _network) = lifecycle("travel-planner-v1").await;
        assert!(matches!(lifecycle.activate().await, Err(Error::InvalidState(_))));
        assert_eq!(lifecycle.state(), WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_activate_deletes_only_stale_generations() {
        let (lifecycle, db, network) = lifecycle("v1-current").await;
        serve_all(&network);
        db.open_generation("v0").await.unwrap();

        lifecycle.install().await.unwrap();
        let report = lifecycle.activate().await.unwrap();

        assert_eq!(report.deleted, vec!["v0".to_string()]);
        assert_eq!(db.generation_names().await.unwrap(), vec!["v1-current".to_string()]);
        assert_eq!(lifecycle.state(), WorkerState::Activated);
        assert!(lifecycle.is_controlling());
    }

    #[tokio::test]
    async fn test_skip_waiting_activates_installed_worker() {
        let (lifecycle, _db, network) = lifecycle("travel-planner-v1").await;
        assert_eq!(lifecycle.skip_waiting().await.unwrap(), None);

        serve_all(&network);
        lifecycle.install().await.unwrap();
        let report = lifecycle.skip_waiting().await.unwrap();
        assert!(report.is_some());
        assert_eq!(lifecycle.state(), WorkerState::Activated);

        assert_eq!(lifecycle.skip_waiting().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reinstall_active_worker_keeps_state() {
        let (lifecycle, _db, network) = lifecycle("travel-planner-v1").await;
        serve_all(&network);
        lifecycle.install().await.unwrap();
        lifecycle.activate().await.unwrap();

        network.go_offline_everywhere();
        assert!(lifecycle.install().await.is_err());
        assert_eq!(lifecycle.state(), WorkerState::Activated);
        assert!(lifecycle.is_controlling());
    }

    #[tokio::test]
    async fn test_clear_removes_current_generation() {
        let (lifecycle, db, network) = lifecycle("travel-planner-v1").await;
        serve_all(&network);
        lifecycle.install().await.unwrap();

        assert!(lifecycle.clear().await.unwrap());
        assert!(!db.has_generation("travel-planner-v1").await.unwrap());
        assert!(!lifecycle.clear().await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_origin_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = Lifecycle::new(db, "v1", "not a url", precache(), Arc::new(ScriptedNetwork::new()));
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }
}
