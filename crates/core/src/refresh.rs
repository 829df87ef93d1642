//! Detached background revalidation.
//!
//! A cache-first hit returns the stored response at once and hands the
//! revalidation to a [`Refresher`]. The refresher spawns one task per job and
//! never hands the join handle back: callers cannot await it. Completion is
//! announced on a broadcast channel that nothing is required to listen to.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::broadcast;

use crate::cache::{CacheEntry, GenerationStore};
use crate::exchange::Request;
use crate::network::Network;

const EVENT_CAPACITY: usize = 64;

/// How one revalidation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The network answered 2xx and the entry was overwritten.
    Updated { changed: bool },
    /// The network answered, but not with 2xx; the entry was left alone.
    Skipped { status: u16 },
    /// The fetch or the store write failed; swallowed.
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct RefreshEvent {
    pub key: String,
    pub outcome: RefreshOutcome,
}

/// One revalidation: refetch `request` and overwrite `stale` on success.
pub struct RefreshJob {
    pub store: GenerationStore,
    pub network: Arc<dyn Network>,
    pub request: Request,
    pub stale: CacheEntry,
}

impl RefreshJob {
    async fn run(self) -> RefreshOutcome {
        let response = match self.network.fetch(&self.request).await {
            Ok(response) => response,
            Err(e) => return RefreshOutcome::Failed { reason: e.to_string() },
        };

        if !response.is_success() {
            return RefreshOutcome::Skipped { status: response.status.as_u16() };
        }

        let fresh = CacheEntry::from_response(&self.stale.key, &self.request.url, self.stale.lane, &response);
        let changed = fresh.digest != self.stale.digest;
        match self.store.put(&fresh).await {
            Ok(()) => RefreshOutcome::Updated { changed },
            Err(e) => RefreshOutcome::Failed { reason: e.to_string() },
        }
    }
}

/// Spawns revalidations and reports their completion.
#[derive(Clone)]
pub struct Refresher {
    in_flight: Arc<AtomicUsize>,
    events: broadcast::Sender<RefreshEvent>,
}

impl Refresher {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { in_flight: Arc::new(AtomicUsize::new(0)), events }
    }

    /// Receive an event for every job that completes after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.events.subscribe()
    }

    /// Jobs spawned but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Start `job` and return immediately. Must be called inside a tokio
    /// runtime.
    pub fn spawn(&self, job: RefreshJob) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let in_flight = Arc::clone(&self.in_flight);
        let events = self.events.clone();

        tokio::spawn(async move {
            let key = job.stale.key.clone();
            let outcome = job.run().await;

            match &outcome {
                RefreshOutcome::Updated { changed } => tracing::debug!(%key, changed, "background refresh stored"),
                RefreshOutcome::Skipped { status } => tracing::debug!(%key, status, "background refresh skipped"),
                RefreshOutcome::Failed { reason } => tracing::debug!(%key, %reason, "background refresh failed"),
            }

            in_flight.fetch_sub(1, Ordering::SeqCst);
            // No subscribers is the normal case.
            let _ = events.send(RefreshEvent { key, outcome });
        });
    }
}

impl Default for Refresher {
    fn default() -> Self {
        Self::new()
    }
}
