//! Error types for the Kernel.

use thiserror::Error;

use xhe_core::{CoreError, ValidationError};
use xhe_perms::{Denial, PermsError};
use xhe_store::StoreError;

use crate::content::ContentError;

/// Errors that can occur during Kernel operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A pulse, key, fork or content item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The presented policy key does not authorize the operation.
    #[error("not authorized: {0}")]
    Authorization(#[from] Denial),

    /// The store failed. On append the index is rolled back.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Payload or argument validation failed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The operation needs a current identity and there is none.
    #[error("identity required")]
    IdentityRequired,

    /// Policy key decoding error.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    /// Core error (malformed stored pulse, bad hash).
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Content collaborator error.
    #[error("content error: {0}")]
    Content(#[from] ContentError),
}

impl KernelError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        KernelError::NotFound(what.to_string())
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(e: serde_json::Error) -> Self {
        KernelError::Persistence(StoreError::Serialization(e.to_string()))
    }
}

/// Result type for Kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
