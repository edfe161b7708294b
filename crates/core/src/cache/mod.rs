//! Versioned cache storage for intercepted responses.
//!
//! A store holds any number of named *generations*; each generation maps a
//! request identity to a response snapshot. The interceptor only ever reads
//! and writes the generation named by its current version tag.
//!
//! Two backends implement [`CacheStorage`]:
//!
//! - [`MemoryCacheStorage`]: process-local maps behind a tokio `RwLock`
//! - [`CacheDb`]: SQLite via tokio-rusqlite, persistent across restarts

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;

pub use crate::Error;

use crate::http::{RequestKey, Response};

pub use connection::CacheDb;
pub use memory::MemoryCacheStorage;

/// Named-generation key-value store keyed by request identity.
///
/// Concurrent writers to the same key are allowed; the last write wins.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a generation, creating it if absent.
    async fn open(&self, generation: &str) -> Result<(), Error>;

    /// Exact-match lookup of `key` in `generation`.
    ///
    /// A generation that does not exist behaves like an empty one.
    async fn match_request(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>, Error>;

    /// Store `response` under `key`, creating the generation if needed.
    async fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<(), Error>;

    /// Delete a whole generation. Returns whether it existed.
    async fn delete(&self, generation: &str) -> Result<bool, Error>;

    /// Names of all existing generations, in creation order.
    async fn keys(&self) -> Result<Vec<String>, Error>;
}
