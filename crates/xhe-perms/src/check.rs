//! The authorization rule.
//!
//! [`evaluate`] is the single decision function behind every key check:
//! the boolean `check`, the side-effect-free gateway `validate`, and the
//! enforcement performed before a gated gateway write.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::key::PolicyKey;

/// Why a presented key was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    NotFound,
    Revoked,
    WrongHolder,
    Expired,
    MissingCapabilities(Vec<String>),
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::NotFound => f.write_str("Key not found"),
            Denial::Revoked => f.write_str("Key revoked"),
            Denial::WrongHolder => f.write_str("Key does not belong to app"),
            Denial::Expired => f.write_str("Key expired"),
            Denial::MissingCapabilities(caps) => {
                write!(f, "Missing capabilities: {}", caps.join(", "))
            }
        }
    }
}

impl std::error::Error for Denial {}

/// Decide whether `key`, presented by `holder`, may exercise `required` at `now`.
///
/// Checks run in a fixed order: existence, revocation, holder, expiry,
/// capabilities. A key is expired when `now > expiry`.
pub fn evaluate(
    key: Option<&PolicyKey>,
    holder: &str,
    required: &[&str],
    now: i64,
) -> Result<(), Denial> {
    let key = key.ok_or(Denial::NotFound)?;

    if key.revoked {
        return Err(Denial::Revoked);
    }
    if key.holder != holder {
        return Err(Denial::WrongHolder);
    }
    if key.is_expired(now) {
        return Err(Denial::Expired);
    }

    let missing = key.missing(required);
    if !missing.is_empty() {
        return Err(Denial::MissingCapabilities(
            missing.into_iter().map(str::to_owned).collect(),
        ));
    }

    Ok(())
}

/// Serializable outcome of a validation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Verdict {
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }
}

impl From<Result<(), Denial>> for Verdict {
    fn from(outcome: Result<(), Denial>) -> Self {
        match outcome {
            Ok(()) => Self::valid(),
            Err(denial) => Self {
                valid: false,
                error: Some(denial.to_string()),
            },
        }
    }
}
