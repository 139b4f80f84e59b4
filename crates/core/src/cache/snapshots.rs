//! Cached response snapshots.
//!
//! Provides the captured response type and the SQLite operations for
//! storing and reading it.

use super::connection::CacheDb;
use super::check_generation;
use super::hash::compute_cache_key;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

/// A captured HTTP response.
///
/// `url` is the normalized absolute locator the response is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub fetched_at: String,
}

impl Snapshot {
    /// Capture a response now.
    pub fn new(url: impl Into<String>, status: u16, headers: Vec<(String, String)>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status,
            headers,
            body: body.into(),
            fetched_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether this response may be written to the cache.
    ///
    /// Any 2xx except `206 Partial Content`, which only holds a slice of the
    /// resource stored under its full URL.
    pub fn is_cacheable(&self) -> bool {
        self.is_success() && self.status != 206
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Copy of this snapshot stored under a different key.
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self { url: url.into(), ..self.clone() }
    }
}

impl CacheDb {
    /// Insert or replace the entry for `snapshot.url` in `generation`.
    ///
    /// Creates the generation if needed. Both writes commit together.
    pub async fn upsert_snapshot(&self, generation: &str, snapshot: &Snapshot) -> Result<(), Error> {
        check_generation(generation)?;
        let generation = generation.to_string();
        let snapshot = snapshot.clone();
        let headers_json = serde_json::to_string(&snapshot.headers)?;
        let hash = compute_cache_key(&generation, &snapshot.url);
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO cache_storage (cache_name, created_at) VALUES (?1, ?2)",
                    params![&generation, &now],
                )?;
                tx.execute(
                    "INSERT INTO cache_entries (
                        hash, cache_id, request_url, status_code, headers_json, body, fetched_at
                    ) VALUES (
                        ?1, (SELECT id FROM cache_storage WHERE cache_name = ?2), ?3, ?4, ?5, ?6, ?7
                    )
                    ON CONFLICT(hash) DO UPDATE SET
                        status_code = excluded.status_code,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        fetched_at = excluded.fetched_at",
                    params![
                        &hash,
                        &generation,
                        &snapshot.url,
                        snapshot.status,
                        &headers_json,
                        &snapshot.body,
                        &snapshot.fetched_at,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry stored under `url` in `generation`.
    ///
    /// Returns None if either the generation or the entry doesn't exist.
    pub async fn get_snapshot(&self, generation: &str, url: &str) -> Result<Option<Snapshot>, Error> {
        let hash = compute_cache_key(generation, url);
        let row = self
            .conn
            .call(move |conn| -> Result<Option<(String, u16, String, Vec<u8>, String)>, Error> {
                let row = conn
                    .query_row(
                        "SELECT request_url, status_code, headers_json, body, fetched_at
                         FROM cache_entries WHERE hash = ?1",
                        params![hash],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?;

        let Some((url, status, headers_json, body, fetched_at)) = row else {
            return Ok(None);
        };
        let headers = serde_json::from_str(&headers_json)?;
        Ok(Some(Snapshot { url, status, headers, body, fetched_at }))
    }

    /// List the URLs stored in `generation`, sorted.
    pub async fn list_snapshot_urls(&self, generation: &str) -> Result<Vec<String>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.request_url FROM cache_entries e
                     JOIN cache_storage s ON s.id = e.cache_id
                     WHERE s.cache_name = ?1
                     ORDER BY e.request_url",
                )?;
                let urls = stmt
                    .query_map(params![generation], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
