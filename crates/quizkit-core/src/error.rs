//! Collaborator error types.
//!
//! These error types represent failures of the external collaborators the
//! engine talks to (content source, manual-grading store, draft store).
//! Defined in `quizkit-core` so the engine can downcast and classify errors
//! for its stalled sub-state without string matching.

use thiserror::Error;

/// Errors that can occur when talking to an external collaborator.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The collaborator is not reachable or not ready yet.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The collaborator returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The collaborator answered with data that could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CollaboratorError {
    /// Returns `true` if this error is permanent and retrying will not help.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            CollaboratorError::NotFound(_) | CollaboratorError::Malformed(_)
        )
    }

    /// Classify an `anyhow` error coming out of a collaborator call.
    ///
    /// Errors that are not a `CollaboratorError` are treated as transient.
    pub fn classify(err: &anyhow::Error) -> Option<&CollaboratorError> {
        err.downcast_ref::<CollaboratorError>()
    }
}
