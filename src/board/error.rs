//! Failures reported by the storage side of the engine.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Missing, invalid or expired credentials (HTTP 401/403).
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// The task or list no longer exists, or belongs to someone else.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request never completed.
    #[error("network error: {0}")]
    Network(String),

    /// The server refused the request for another reason.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The server accepted the request but disagrees with the local placement.
    #[error("server state disagrees with local state: {0}")]
    Mismatch(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

impl SyncError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Map an HTTP status and body onto the taxonomy.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(message),
            _ => Self::Rejected { status, message },
        }
    }
}
