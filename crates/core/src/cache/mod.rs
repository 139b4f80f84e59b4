//! Persistent byte cache partitioned into named generations.
//!
//! This module provides the storage side of the offline cache:
//!
//! - A `CacheStore` trait modelled on browser cache storage (open, has,
//!   delete, put, match, keys) plus an install marker per generation
//! - A SQLite backend with async access via tokio-rusqlite
//! - An in-memory backend for tests and throwaway sessions
//!
//! Entries are keyed by normalized absolute URL. A generation holds at most
//! one entry per key; a later put replaces the earlier one.

pub mod connection;
pub mod generations;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod snapshots;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::MemoryStore;
pub use snapshots::Snapshot;

/// Reject blank generation names before they reach a backend.
pub(crate) fn check_generation(generation: &str) -> Result<(), Error> {
    if generation.trim().is_empty() {
        return Err(Error::InvalidInput("generation name must not be empty".into()));
    }
    Ok(())
}

/// Storage boundary for cached responses.
///
/// Implementations must tolerate concurrent independent reads and writes
/// without external locking. Writes to the same key are last-write-wins and
/// each `put` is all-or-nothing.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the generation if it does not exist yet.
    async fn open(&self, generation: &str) -> Result<(), Error>;

    /// Whether a generation with this name exists.
    async fn has(&self, generation: &str) -> Result<bool, Error>;

    /// Discard a generation and every entry in it.
    ///
    /// Returns false if the generation did not exist.
    async fn delete(&self, generation: &str) -> Result<bool, Error>;

    /// Names of all generations, sorted.
    async fn generations(&self) -> Result<Vec<String>, Error>;

    /// Record that an install finished populating the generation.
    async fn mark_installed(&self, generation: &str) -> Result<(), Error>;

    /// Whether a finished install was recorded for the generation.
    ///
    /// A generation can exist without this: install opens it before fetching.
    async fn is_installed(&self, generation: &str) -> Result<bool, Error>;

    /// Store a snapshot under its URL, opening the generation if needed.
    async fn put(&self, generation: &str, snapshot: &Snapshot) -> Result<(), Error>;

    /// Look up the snapshot stored under `key`.
    async fn match_key(&self, generation: &str, key: &str) -> Result<Option<Snapshot>, Error>;

    /// Keys stored in a generation, sorted.
    async fn keys(&self, generation: &str) -> Result<Vec<String>, Error>;
}
