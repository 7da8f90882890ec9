//! Error types for the lifecycle engine

use std::time::Duration;
use thiserror::Error;

/// Engine result type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while driving the remote cloud API
#[derive(Error, Debug)]
pub enum EngineError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (config loading)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote API rejected a request
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code returned by the API
        status: u16,
        /// Response body, as returned by the API
        message: String,
    },

    /// A bounded poll was exhausted before the remote API confirmed the
    /// expected state. The resource being waited on is left intact.
    #[error("timed out after {waited:?} waiting for {what}")]
    ConfirmationTimeout {
        /// What the poll was waiting for
        what: String,
        /// How long the poll ran before giving up
        waited: Duration,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Create an API error from a status code and response body
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a confirmation timeout error
    pub fn timeout(what: impl Into<String>, waited: Duration) -> Self {
        Self::ConfirmationTimeout {
            what: what.into(),
            waited,
        }
    }

    /// True when this is a confirmation timeout rather than a hard failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConfirmationTimeout { .. })
    }
}
