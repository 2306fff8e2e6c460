//! Error taxonomy for the access layer

use thiserror::Error;

/// Errors surfaced by authentication, dispatch and the access façade.
///
/// Cache failures never appear here: they are logged and degrade to a miss.
#[derive(Debug, Error)]
pub enum AccessError {
    /// A required credential field is missing or blank. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No usable token exists; the user must authorize again.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Non-2xx response from any endpoint, body kept verbatim.
    #[error("HTTP {status}: {body}")]
    Server { status: u16, body: String },

    /// Transport-level failure, including timeouts.
    #[error("network error: {0}")]
    Network(String),

    /// A successful response whose body could not be understood.
    #[error("unexpected response: {0}")]
    Protocol(String),
}

impl AccessError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// HTTP status for `Server` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AccessError>;
