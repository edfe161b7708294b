//! Structured errors for the stdio host.
//!
//! Every failure becomes an [`ErrorBody`] on the reply line; a bad line never
//! stops the host.

use serde::Serialize;
use shelter_core::Error;

/// Errors in an incoming event line.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Line is not a valid event.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Fetch URL could not be resolved.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),
}

/// Error payload written back to the caller.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl From<ProtocolError> for ErrorBody {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidInput(message) => ErrorBody { code: "INVALID_INPUT", message },
            ProtocolError::InvalidUrl(message) => ErrorBody { code: "INVALID_URL", message },
        }
    }
}

impl From<Error> for ErrorBody {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Database(_) | Error::MigrationFailed(_) | Error::Storage(_) => "CACHE_ERROR",
            Error::FetchTimeout(_) => "FETCH_TIMEOUT",
            Error::Network(_) => "NETWORK_ERROR",
            Error::FetchTooLarge(_) => "FETCH_TOO_LARGE",
            Error::InstallFailed { .. } => "INSTALL_FAILED",
            Error::InvalidState(_) => "INVALID_STATE",
        };

        ErrorBody { code, message: err.to_string() }
    }
}
