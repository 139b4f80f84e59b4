//! Cache generation bookkeeping.
//!
//! A generation is a row in `cache_storage`; its entries cascade away when
//! the row is deleted.

use super::connection::CacheDb;
use super::snapshots::Snapshot;
use super::{CacheStore, check_generation};
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl CacheDb {
    /// Create the generation row if it does not exist.
    pub async fn open_generation(&self, generation: &str) -> Result<(), Error> {
        check_generation(generation)?;
        let generation = generation.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_storage (cache_name, created_at) VALUES (?1, ?2)",
                    params![generation, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_generation(&self, generation: &str) -> Result<bool, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_storage WHERE cache_name = ?1)",
                    params![generation],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation together with its entries.
    ///
    /// Returns whether a generation was removed.
    pub async fn delete_generation(&self, generation: &str) -> Result<bool, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_storage WHERE cache_name = ?1", params![generation])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Stamp `installed_at`, creating the generation if needed.
    pub async fn mark_generation_installed(&self, generation: &str) -> Result<(), Error> {
        check_generation(generation)?;
        let generation = generation.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_storage (cache_name, created_at, installed_at) VALUES (?1, ?2, ?2)
                     ON CONFLICT(cache_name) DO UPDATE SET installed_at = excluded.installed_at",
                    params![generation, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn is_generation_installed(&self, generation: &str) -> Result<bool, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let installed: bool = conn.query_row(
                    "SELECT EXISTS(
                        SELECT 1 FROM cache_storage WHERE cache_name = ?1 AND installed_at IS NOT NULL
                    )",
                    params![generation],
                    |row| row.get(0),
                )?;
                Ok(installed)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn list_generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT cache_name FROM cache_storage ORDER BY cache_name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait::async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        self.open_generation(generation).await
    }

    async fn has(&self, generation: &str) -> Result<bool, Error> {
        self.has_generation(generation).await
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        self.delete_generation(generation).await
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        self.list_generations().await
    }

    async fn mark_installed(&self, generation: &str) -> Result<(), Error> {
        self.mark_generation_installed(generation).await
    }

    async fn is_installed(&self, generation: &str) -> Result<bool, Error> {
        self.is_generation_installed(generation).await
    }

    async fn put(&self, generation: &str, snapshot: &Snapshot) -> Result<(), Error> {
        self.upsert_snapshot(generation, snapshot).await
    }

    async fn match_key(&self, generation: &str, key: &str) -> Result<Option<Snapshot>, Error> {
        self.get_snapshot(generation, key).await
    }

    async fn keys(&self, generation: &str) -> Result<Vec<String>, Error> {
        self.list_snapshot_urls(generation).await
    }
}
