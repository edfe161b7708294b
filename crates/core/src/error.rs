//! Unified error types for shelter.
//!
//! Every variant carries a stable upper-case code prefix so that log lines and
//! host protocol errors can be matched without parsing free text.

use tokio_rusqlite::rusqlite;

/// Unified error type for the interceptor, its stores and its network adapters.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input (e.g., a malformed request line).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or unresolvable URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Cache storage failed for a reason other than the database (quota, encoding).
    #[error("CACHE_ERROR: {0}")]
    Storage(String),

    /// Network call did not settle before its deadline.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Network-level failure: DNS, connection refused, aborted transfer.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Response body exceeded the configured limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// A manifest entry could not be fetched during install.
    #[error("INSTALL_FAILED: {entry}: {reason}")]
    InstallFailed { entry: String, reason: String },

    /// Lifecycle signal received in a state that cannot accept it.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),
}

impl Error {
    /// Whether this error belongs to the network failure channel.
    ///
    /// Timeouts and transport failures are deliberately indistinguishable to
    /// the dispatcher; both lead to the same fallback.
    pub fn is_network_failure(&self) -> bool {
        matches!(
            self,
            Error::FetchTimeout(_) | Error::Network(_) | Error::FetchTooLarge(_)
        )
    }

    /// Whether this error originated in cache storage.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Error::Database(_) | Error::MigrationFailed(_) | Error::Storage(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Storage(format!("header encoding: {err}"))
    }
}
