//! Generation and entry operations for the SQLite store.
//!
//! Entries are keyed by `(generation, key_hash)`; deleting a generation row
//! cascades to its entries.

use super::connection::CacheDb;
use super::hash::compute_entry_hash;
use super::CacheStorage;
use crate::Error;
use crate::http::{RequestKey, Response};
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

/// Raw entry columns as read from the database.
struct EntryRow {
    status: i64,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    response_url: Option<String>,
}

impl EntryRow {
    fn into_response(self) -> Result<Response, Error> {
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;
        let status = u16::try_from(self.status)
            .map_err(|_| Error::Storage(format!("stored status out of range: {}", self.status)))?;
        let url = self.response_url.as_deref().and_then(|u| Url::parse(u).ok());

        Ok(Response { status, status_text: self.status_text, headers, body: Bytes::from(self.body), url })
    }
}

impl CacheDb {
    /// Number of entries stored in a generation.
    pub async fn entry_count(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait::async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        let generation = generation.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![generation, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn match_request(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let generation = generation.to_string();
        let key_hash = compute_entry_hash(key);
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status, status_text, headers_json, body, response_url
                     FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![generation, key_hash], |row| {
                    Ok(EntryRow {
                        status: row.get(0)?,
                        status_text: row.get(1)?,
                        headers_json: row.get(2)?,
                        body: row.get(3)?,
                        response_url: row.get(4)?,
                    })
                });

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(EntryRow::into_response).transpose()
    }

    async fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let generation = generation.to_string();
        let key_hash = compute_entry_hash(key);
        let method = key.method().as_str();
        let url = key.url().to_string();
        let status = i64::from(response.status);
        let status_text = response.status_text.clone();
        let headers_json = serde_json::to_string(&response.headers)?;
        let body = response.body.to_vec();
        let response_url = response.url.as_ref().map(|u| u.to_string());
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![generation, now],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                        generation, key_hash, method, url, status, status_text,
                        headers_json, body, response_url, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(generation, key_hash) DO UPDATE SET
                        status = excluded.status,
                        status_text = excluded.status_text,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        response_url = excluded.response_url,
                        stored_at = excluded.stored_at",
                    params![
                        generation,
                        key_hash,
                        method,
                        url,
                        status,
                        status_text,
                        headers_json,
                        body,
                        response_url,
                        now,
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM generations WHERE name = ?1", params![generation])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY seq ASC")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }
}
