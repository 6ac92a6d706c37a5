//! Error types for the Xhe core.

use thiserror::Error;

/// Core errors that can occur while handling pulses and hashes.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("malformed pulse: {0}")]
    MalformedPulse(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

impl From<hex::FromHexError> for CoreError {
    fn from(e: hex::FromHexError) -> Self {
        CoreError::InvalidHash(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::DecodingError(e.to_string())
    }
}

/// Payload validation errors.
///
/// Validation is advisory: nothing in the ledger itself rejects a pulse on
/// these grounds. Callers opt in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payload must be an object")]
    NotAnObject,

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid type for {field}: expected {expected}")]
    WrongKind {
        field: String,
        expected: &'static str,
    },

    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}
