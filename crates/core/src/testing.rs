//! Scripted network and manual clock for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderValue, StatusCode, header};
use tokio::sync::Semaphore;
use url::Url;

use crate::Error;
use crate::clock::Clock;
use crate::exchange::{Request, Response};
use crate::network::Network;

#[derive(Clone)]
struct Reply {
    status: StatusCode,
    content_type: &'static str,
    body: Bytes,
}

/// A [`Network`] that answers from a URL → reply table.
///
/// Unknown URLs behave as if the device were offline. Every fetch is
/// recorded, including ones that fail.
#[derive(Default)]
pub struct ScriptedNetwork {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with the given status and body from now on.
    pub fn respond(&self, url: &str, status: u16, content_type: &'static str, body: &str) {
        let reply = Reply {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            content_type,
            body: Bytes::copy_from_slice(body.as_bytes()),
        };
        self.replies.lock().unwrap().insert(normalize(url), reply);
    }

    /// Make `url` unreachable.
    pub fn go_offline(&self, url: &str) {
        self.replies.lock().unwrap().remove(&normalize(url));
    }

    /// Make every URL unreachable.
    pub fn go_offline_everywhere(&self) {
        self.replies.lock().unwrap().clear();
    }

    /// Block every later fetch until the returned semaphore gets permits.
    pub fn hold(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn call_count(&self, url: &str) -> usize {
        let url = normalize(url);
        self.calls.lock().unwrap().iter().filter(|c| **c == url).count()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate
            && let Ok(permit) = gate.acquire().await
        {
            permit.forget();
        }

        let reply = self.replies.lock().unwrap().get(&url).cloned();
        match reply {
            Some(reply) => {
                let mut response = Response::new(reply.status, reply.body);
                response
                    .headers
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static(reply.content_type));
                Ok(response)
            }
            None => Err(Error::NetworkUnavailable(format!("no route to {url}"))),
        }
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string())
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self { now: AtomicI64::new(now_ms) }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by_ms: i64) {
        self.now.fetch_add(by_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        clock.advance(61_000);
        assert_eq!(clock.now_ms(), 62_000);
        clock.set(5);
        assert_eq!(clock.now_ms(), 5);
    }

    #[tokio::test]
    async fn test_unknown_url_is_offline() {
        let network = ScriptedNetwork::new();
        let request = Request::get(Url::parse("http://localhost:8080/trips.html").unwrap());
        assert!(matches!(network.fetch(&request).await, Err(Error::NetworkUnavailable(_))));
        assert_eq!(network.call_count("http://localhost:8080/trips.html"), 1);
    }
}
