//! Mapping of transport failures onto collaborator errors.

use thiserror::Error;

pub use quizkit_core::error::CollaboratorError;

/// Errors raised while building a collaborator from its configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Classify a `reqwest` send error.
pub(crate) fn from_reqwest(err: reqwest::Error, base_url: &str, timeout_secs: u64) -> CollaboratorError {
    if err.is_timeout() {
        CollaboratorError::Timeout(timeout_secs)
    } else if err.is_connect() {
        CollaboratorError::Unavailable(format!("{base_url} is not reachable"))
    } else {
        CollaboratorError::Network(err.to_string())
    }
}

/// Classify an HTTP error status.
pub(crate) fn from_status(status: u16, what: &str, body: String) -> CollaboratorError {
    match status {
        404 => CollaboratorError::NotFound(what.to_string()),
        502..=504 => CollaboratorError::Unavailable(format!("HTTP {status}: {body}")),
        _ => CollaboratorError::Api {
            status,
            message: body,
        },
    }
}
