//! The network seam used by strategies and the lifecycle manager.

use async_trait::async_trait;

use crate::Error;
use crate::exchange::{Request, Response};

/// Fetches a request over the network.
///
/// Any response the server sends, including 4xx/5xx, is `Ok`. `Err` means
/// no response arrived at all (offline, DNS, timeout, oversized body).
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
