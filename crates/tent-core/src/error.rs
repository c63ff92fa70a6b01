//! Error types for tent-core.

use thiserror::Error;

/// Errors that can occur while building, hashing, or signing posts.
#[derive(Debug, Error)]
pub enum Error {
    #[error("canonical JSON violation: {0}")]
    Canonical(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed Link header: {0}")]
    LinkHeader(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid field value: {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("invalid Authorization header: {0}")]
    InvalidHeader(String),

    #[error("request MAC verification failed")]
    MacMismatch,

    #[error("payload hash verification failed")]
    PayloadMismatch,
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

/// Result type alias for tent-core operations.
pub type Result<T> = std::result::Result<T, Error>;
