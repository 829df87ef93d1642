//! Cache key derivation and body digests.

use http::Method;
use sha2::{Digest, Sha256};
use url::Url;

/// Key for static-asset and passthrough entries: method plus the URL with
/// its fragment removed.
///
/// `Url` parsing already lowercases the host and normalizes the path.
pub fn request_key(method: &Method, url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    format!("{method} {normalized}")
}

/// Key for dynamic-API entries: path plus query string.
///
/// The same endpoint with different query parameters gets independent
/// entries. The host is not part of the key.
pub fn api_key(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// SHA-256 hex digest of a response body.
pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}
