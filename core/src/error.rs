//! Error types for the search engine client.
//!
//! # Design
//! HTTP error statuses are not errors here: the client logs them and still
//! returns the decoded body. Timeouts are not errors either (they surface as
//! `Outcome::TimedOut`). What remains are failures the caller cannot recover
//! a response from.

use thiserror::Error;

use crate::http::TransportError;

/// Errors returned by `Client` operations.
#[derive(Debug, Error)]
pub enum ElasticError {
    /// A verb name outside GET/POST/PUT/DELETE was requested.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// The request body could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A caller-supplied body could not be shaped into the request
    /// (e.g. a search body string that is not JSON).
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// The response body was not valid JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The transport failed for a reason other than a timeout.
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<TransportError> for ElasticError {
    fn from(err: TransportError) -> Self {
        ElasticError::Transport(err.to_string())
    }
}
