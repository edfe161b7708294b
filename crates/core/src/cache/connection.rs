//! Opening the SQLite cache store.
//!
//! Every handle gets the same pragmas (WAL journal, foreign keys on so that
//! deleting a generation cascades) and is migrated before it is returned.

use std::path::{Path, PathBuf};

use tokio_rusqlite::Connection;

use super::migrations;
use crate::Error;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
                       PRAGMA synchronous=NORMAL;
                       PRAGMA temp_store=MEMORY;
                       PRAGMA busy_timeout=5000;
                       PRAGMA foreign_keys=ON;";

/// SQLite-backed cache storage handle.
///
/// Cloning is cheap: all clones share one background connection thread, which
/// serializes statements from concurrent interceptions.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
    location: Option<PathBuf>,
}

impl CacheDb {
    /// Open (or create) the store at `path`, creating missing parent
    /// directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("cannot create {}: {e}", parent.display())))?;
        }

        let conn = Connection::open(&path).await.map_err(|e| Error::Database(e.into()))?;
        tracing::debug!(path = %path.display(), "opened cache store");
        Self::prepare(conn, Some(path)).await
    }

    /// Open a private in-memory store. Contents vanish with the last clone.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn, None).await
    }

    /// File backing this store, `None` when in memory.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Highest applied schema migration.
    pub async fn schema_version(&self) -> Result<i64, Error> {
        migrations::current_version(&self.conn).await
    }

    async fn prepare(conn: Connection, location: Option<PathBuf>) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS)).await.map_err(Error::from)?;

        migrations::run(&conn).await?;
        Ok(Self { conn, location })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStorage;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("shelter-{}-{name}", std::process::id()))
            .join("cache.sqlite")
    }

    #[tokio::test]
    async fn test_open_in_memory_enforces_foreign_keys() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.location().is_none());

        let foreign_keys = db
            .conn
            .call(|conn| conn.query_row("PRAGMA foreign_keys", [], |row| row.get::<_, i64>(0)))
            .await
            .unwrap();
        assert_eq!(foreign_keys, 1);
        assert_eq!(db.schema_version().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let path = scratch_path("reopen");

        let db = CacheDb::open(&path).await.unwrap();
        assert_eq!(db.location(), Some(path.as_path()));
        CacheStorage::open(&db, "site-v1").await.unwrap();
        drop(db);

        let reopened = CacheDb::open(&path).await.unwrap();
        assert_eq!(reopened.keys().await.unwrap(), vec!["site-v1".to_string()]);

        drop(reopened);
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
