//! In-memory cache storage.
//!
//! Same semantics as the SQLite backend, nothing survives the process.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{CacheStore, check_generation};
use super::snapshots::Snapshot;
use crate::Error;

/// Entries of one generation plus its install marker.
#[derive(Debug, Default)]
struct Partition {
    entries: BTreeMap<String, Snapshot>,
    installed: bool,
}

/// Cache storage held in process memory.
///
/// Uses nested BTreeMaps behind a tokio RwLock so that keys and
/// generations list in sorted order. Cloning shares the same storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    generations: Arc<RwLock<BTreeMap<String, Partition>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all generations.
    pub async fn len(&self) -> usize {
        self.generations.read().await.values().map(|p| p.entries.len()).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        check_generation(generation)?;
        self.generations
            .write()
            .await
            .entry(generation.to_string())
            .or_default();
        Ok(())
    }

    async fn has(&self, generation: &str) -> Result<bool, Error> {
        Ok(self.generations.read().await.contains_key(generation))
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        Ok(self.generations.write().await.remove(generation).is_some())
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        Ok(self.generations.read().await.keys().cloned().collect())
    }

    async fn mark_installed(&self, generation: &str) -> Result<(), Error> {
        check_generation(generation)?;
        self.generations
            .write()
            .await
            .entry(generation.to_string())
            .or_default()
            .installed = true;
        Ok(())
    }

    async fn is_installed(&self, generation: &str) -> Result<bool, Error> {
        Ok(self
            .generations
            .read()
            .await
            .get(generation)
            .is_some_and(|p| p.installed))
    }

    async fn put(&self, generation: &str, snapshot: &Snapshot) -> Result<(), Error> {
        check_generation(generation)?;
        let mut generations = self.generations.write().await;
        generations
            .entry(generation.to_string())
            .or_default()
            .entries
            .insert(snapshot.url.clone(), snapshot.clone());
        Ok(())
    }

    async fn match_key(&self, generation: &str, key: &str) -> Result<Option<Snapshot>, Error> {
        let generations = self.generations.read().await;
        Ok(generations.get(generation).and_then(|p| p.entries.get(key)).cloned())
    }

    async fn keys(&self, generation: &str) -> Result<Vec<String>, Error> {
        let generations = self.generations.read().await;
        Ok(generations
            .get(generation)
            .map(|p| p.entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}
