//! Cache entries and per-generation CRUD.
//!
//! A [`GenerationStore`] is the equivalent of one opened `Cache` object:
//! every read and write is scoped to its generation name.

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, types::ValueRef};
use url::Url;

use super::connection::CacheDb;
use super::hash::body_digest;
use crate::Error;
use crate::classify::Lane;
use crate::exchange::Response;

pub const CACHED_AT_HEADER: &str = "sw-cached-at";
pub const TTL_HEADER: &str = "sw-ttl";

/// A stored response plus freshness metadata.
///
/// `cached_at` and `ttl` are only set for API-lane entries; static entries
/// stay valid until replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub url: String,
    pub lane: Lane,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub digest: String,
    /// Milliseconds since epoch.
    pub cached_at: Option<i64>,
    /// Milliseconds.
    pub ttl: Option<i64>,
}

impl CacheEntry {
    /// Capture a response for storage under `key`.
    pub fn from_response(key: impl Into<String>, url: &Url, lane: Lane, response: &Response) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        Self {
            key: key.into(),
            url: url.to_string(),
            lane,
            status: response.status.as_u16(),
            headers,
            digest: body_digest(&response.body),
            body: response.body.clone(),
            cached_at: None,
            ttl: None,
        }
    }

    /// Stamp freshness metadata. The values are also mirrored into the
    /// `sw-cached-at` and `sw-ttl` headers of the served copy; the columns
    /// stay authoritative.
    pub fn with_freshness(mut self, cached_at: i64, ttl: i64) -> Self {
        self.cached_at = Some(cached_at);
        self.ttl = Some(ttl);
        self.headers
            .retain(|(name, _)| name != CACHED_AT_HEADER && name != TTL_HEADER);
        self.headers.push((CACHED_AT_HEADER.to_string(), cached_at.to_string()));
        self.headers.push((TTL_HEADER.to_string(), ttl.to_string()));
        self
    }

    /// `now - cached_at < ttl`. Missing metadata counts as 0, so such an
    /// entry is always expired.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        self.age_ms(now_ms) < self.ttl.unwrap_or(0)
    }

    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.cached_at.unwrap_or(0))
    }

    /// Rebuild the stored response. Headers that no longer parse are dropped.
    pub fn to_response(&self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                headers.append(name, value);
            }
        }

        Response {
            status: StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK),
            headers,
            body: self.body.clone(),
        }
    }
}

/// Handle to one store generation.
#[derive(Clone, Debug)]
pub struct GenerationStore {
    db: CacheDb,
    name: Arc<str>,
}

impl GenerationStore {
    pub(crate) fn new(db: CacheDb, name: &str) -> Self {
        Self { db, name: Arc::from(name) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up an entry by key.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let generation = self.name.to_string();
        let key = key.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, url, lane, status, headers_json, body, digest, cached_at, ttl
                     FROM entries WHERE generation = ?1 AND key = ?2",
                )?;
                let entry = stmt.query_row(params![generation, key], row_to_entry).optional()?;
                Ok(entry)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace an entry, recreating the generation if it was
    /// deleted in the meantime.
    pub async fn put(&self, entry: &CacheEntry) -> Result<(), Error> {
        self.put_all(std::slice::from_ref(entry)).await
    }

    /// Insert or replace several entries in one transaction.
    pub async fn put_all(&self, entries: &[CacheEntry]) -> Result<(), Error> {
        let generation = self.name.to_string();
        let entries = entries.to_vec();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let stored_at = chrono::Utc::now().to_rfc3339();
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![generation, stored_at],
                )?;
                for entry in &entries {
                    let headers_json = serde_json::to_string(&entry.headers)
                        .map_err(|e| Error::InvalidInput(format!("failed to encode headers: {e}")))?;
                    tx.execute(
                        "INSERT INTO entries (
                            generation, key, url, lane, status, headers_json, body, digest, cached_at, ttl, stored_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                        ON CONFLICT(generation, key) DO UPDATE SET
                            url = excluded.url,
                            lane = excluded.lane,
                            status = excluded.status,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            digest = excluded.digest,
                            cached_at = excluded.cached_at,
                            ttl = excluded.ttl,
                            stored_at = excluded.stored_at",
                        params![
                            &generation,
                            &entry.key,
                            &entry.url,
                            entry.lane.as_str(),
                            entry.status,
                            headers_json,
                            entry.body.as_ref(),
                            &entry.digest,
                            entry.cached_at,
                            entry.ttl,
                            &stored_at,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn len(&self) -> Result<usize, Error> {
        let generation = self.name.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheEntry> {
    let lane: String = row.get(2)?;
    let headers_json: String = row.get(4)?;
    let body: Vec<u8> = row.get(5)?;

    Ok(CacheEntry {
        key: row.get(0)?,
        url: row.get(1)?,
        lane: Lane::from_str_opt(&lane).unwrap_or(Lane::Passthrough),
        status: row.get(3)?,
        headers: serde_json::from_str(&headers_json).unwrap_or_default(),
        body: Bytes::from(body),
        digest: row.get(6)?,
        cached_at: read_millis(row.get_ref(7)?),
        ttl: read_millis(row.get_ref(8)?),
    })
}

/// Lenient integer read for freshness columns.
///
/// Text that doesn't parse reads as 0 rather than failing the lookup.
fn read_millis(value: ValueRef<'_>) -> Option<i64> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(n) => Some(n),
        ValueRef::Real(f) => Some(f as i64),
        ValueRef::Text(t) => Some(std::str::from_utf8(t).ok().and_then(|s| s.trim().parse().ok()).unwrap_or(0)),
        ValueRef::Blob(_) => Some(0),
    }
}
