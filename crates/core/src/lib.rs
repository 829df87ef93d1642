//! Core of the itinera offline caching worker.
//!
//! This crate provides:
//! - Freshness policy table and request classifier
//! - Per-lane retrieval strategies with background refresh
//! - Versioned SQLite store with install/activate lifecycle
//! - Offline fallback page, page messages and push notifications
//! - Unified error types and layered configuration

pub mod cache;
pub mod classify;
pub mod clock;
pub mod config;
pub mod error;
pub mod exchange;
pub mod fallback;
pub mod lifecycle;
pub mod messages;
pub mod network;
pub mod policy;
pub mod refresh;
pub mod strategy;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod worker;

pub use cache::{CacheDb, CacheEntry, GenerationStore};
pub use classify::{Classifier, Lane};
pub use clock::{Clock, SystemClock};
pub use config::AppConfig;
pub use error::Error;
pub use exchange::{Request, RequestMode, Response};
pub use lifecycle::WorkerState;
pub use messages::{ClientMessage, MessageReply, Notification};
pub use network::Network;
pub use strategy::{Outcome, ResponseSource};
pub use worker::ServiceWorker;
