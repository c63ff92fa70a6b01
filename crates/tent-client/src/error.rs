//! Error types for tent-client.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::transport::Method;

/// A protocol-level error body (`application/vnd.tent.error.v0+json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TentError {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl std::fmt::Display for TentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)?;
        if !self.fields.is_empty() {
            let names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
            write!(f, " (fields: {})", names.join(", "))?;
        }
        Ok(())
    }
}

/// Errors from discovery and protocol requests.
#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response.
    #[error("{method} {url}: {message}")]
    Transport { method: Method, url: String, message: String },

    #[error("{method} {url}: unexpected status {status}{}", .tent_error.as_ref().map(|e| format!(": {e}")).unwrap_or_default())]
    BadStatus { status: u16, method: Method, url: String, tent_error: Option<TentError> },

    #[error("unexpected content type: {}", .content_type.as_deref().unwrap_or("<missing>"))]
    BadContentType { content_type: Option<String> },

    /// The response decoded but lacked something required.
    #[error("bad response data: {context}")]
    BadData { context: String },

    #[error("{method} {url}: timed out reading the response")]
    ReadTimeout { method: Method, url: String },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no servers to send the request to")]
    NoServers,

    #[error("post has no credentials link")]
    MissingCredentialsLink,

    #[error(transparent)]
    Core(#[from] tent_core::Error),
}

/// Result type alias for tent-client operations.
pub type Result<T> = std::result::Result<T, Error>;
