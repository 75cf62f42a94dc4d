use thiserror::Error;

/// Errors from chat lifecycle and forwarding operations.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat session not found")]
    NotFound,

    #[error("invalid session transition: {0}")]
    InvalidTransition(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("invalid input: {0}")]
    Validation(String),

    /// Transcript delivery collaborator failed. Non-fatal: the session stays
    /// unforwarded and the caller may retry later.
    #[error("transcript delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for ChatError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => ChatError::NotFound,
            other => ChatError::Storage(other.to_string()),
        }
    }
}

/// Errors from repository operations (used by trait definitions in livedesk-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
