//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur while handling policy keys.
#[derive(Debug, Error)]
pub enum PermsError {
    /// A stored key could not be decoded.
    #[error("invalid policy key: {0}")]
    InvalidKey(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for PermsError {
    fn from(e: serde_json::Error) -> Self {
        PermsError::SerializationError(e.to_string())
    }
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
