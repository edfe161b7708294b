//! Versioned schema for the cache store.
//!
//! Applied versions are recorded in `schema_migrations`; each pending
//! migration runs in its own transaction together with its bookkeeping row.

use tokio_rusqlite::{Connection, params, rusqlite};

use super::Error;

/// `(version, description, SQL)` in application order.
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (1, "generations", include_str!("../../migrations/001_generations.sql")),
    (2, "entries", include_str!("../../migrations/002_entries.sql")),
];

fn applied_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| row.get(0))?)
}

/// Bring the schema up to the latest version.
///
/// # Errors
///
/// `Error::MigrationFailed` naming the version whose SQL was rejected; that
/// version and everything after it stay unapplied.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current = applied_version(conn)?;

        for &(version, description, sql) in MIGRATIONS.iter().filter(|m| m.0 > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("{version} ({description}): {e}")))?;
            tx.execute(
                "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                params![version, description, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, description, "applied cache migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}

/// Highest applied schema version, 0 for a fresh database.
pub async fn current_version(conn: &Connection) -> Result<i64, Error> {
    conn.call(|conn| applied_version(conn)).await.map_err(Error::from)
}
