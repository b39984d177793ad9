//! Common error types for listsync.

use thiserror::Error;

/// Top-level error type for listsync operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote API answered with a non-success status.
    #[error("Remote API returned {status}: {body}")]
    Remote { status: u16, body: String },

    /// The remote API could not be reached (timeout, connection refused).
    #[error("Network error: {0}")]
    Network(String),

    /// Local store operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Sync scheduling failed.
    #[error("Sync error: {0}")]
    Sync(String),
}

impl Error {
    /// HTTP status carried by a remote error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a remote `404 Not Found` answer.
    pub fn is_not_found_status(&self) -> bool {
        self.status() == Some(404)
    }

    /// True for failures worth retrying: the request never got a response.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
