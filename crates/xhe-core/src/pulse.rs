//! Pulse: the atomic ledger record.
//!
//! A pulse is immutable. Its hash covers `{index, type, payload, parentHash}`
//! and is computed once at creation; afterwards it is only recomputed to
//! verify a stored copy.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

use crate::canonical::canonical_pulse_bytes;
use crate::crypto::Blake3Hash;
use crate::error::CoreError;
use crate::types::PulseHash;

/// The type tag of a pulse.
///
/// Well-known tags are `'static` constants; application-defined tags
/// submitted through the gateway are owned strings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PulseType(Cow<'static, str>);

impl PulseType {
    pub const IDENTITY_CREATE: Self = Self::from_static("IDENTITY_CREATE");
    pub const POLICY_KEY_ISSUE: Self = Self::from_static("POLICY_KEY_ISSUE");
    pub const POLICY_KEY_REVOKE: Self = Self::from_static("POLICY_KEY_REVOKE");
    pub const KARMA_CHANGE: Self = Self::from_static("KARMA_CHANGE");
    pub const SOCIAL_POST: Self = Self::from_static("SOCIAL_POST");
    pub const FORK_CREATE: Self = Self::from_static("FORK_CREATE");
    pub const FORK_SELECT: Self = Self::from_static("FORK_SELECT");
    pub const APP_REGISTER: Self = Self::from_static("APP_REGISTER");
    pub const API_CALL: Self = Self::from_static("API_CALL");
    pub const CONTENT_STORE: Self = Self::from_static("CONTENT_STORE");
    pub const GOVERNANCE_PROPOSAL: Self = Self::from_static("GOVERNANCE_PROPOSAL");
    pub const GOVERNANCE_VOTE: Self = Self::from_static("GOVERNANCE_VOTE");

    /// A tag backed by a static string.
    pub const fn from_static(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }

    /// A tag from an arbitrary string.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PulseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PulseType({})", self.0)
    }
}

impl fmt::Display for PulseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PulseType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for PulseType {
    fn from(tag: String) -> Self {
        Self::new(tag)
    }
}

impl PartialEq<str> for PulseType {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for PulseType {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// An immutable ledger record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pulse {
    /// Position in the ledger, gapless from 0.
    pub index: u64,

    /// Type tag.
    #[serde(rename = "type")]
    pub kind: PulseType,

    /// Opaque structured payload.
    pub payload: Value,

    /// Logical parent, for causal linkage between related pulses.
    #[serde(default)]
    pub parent_hash: Option<PulseHash>,

    /// Creation time (Unix ms). Advisory, not hashed.
    pub timestamp: i64,

    /// Blake3 of the canonical encoding of the hashed fields.
    pub hash: PulseHash,
}

impl Pulse {
    /// Build a pulse and compute its hash.
    pub fn new(
        index: u64,
        kind: PulseType,
        payload: Value,
        parent_hash: Option<PulseHash>,
        timestamp: i64,
    ) -> Self {
        let hash = compute_hash(index, &kind, &payload, parent_hash.as_ref());
        Self {
            index,
            kind,
            payload,
            parent_hash,
            timestamp,
            hash,
        }
    }

    /// Recompute the hash from the current field values.
    pub fn compute_hash(&self) -> PulseHash {
        compute_hash(self.index, &self.kind, &self.payload, self.parent_hash.as_ref())
    }

    /// True iff the stored hash matches the recomputed one.
    pub fn verify(&self) -> bool {
        self.compute_hash() == self.hash
    }

    /// Serialize to the persisted JSON form.
    pub fn to_value(&self) -> Result<Value, CoreError> {
        serde_json::to_value(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// Parse from the persisted JSON form. Does not verify the hash.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        serde_json::from_value(value).map_err(|e| CoreError::MalformedPulse(e.to_string()))
    }
}

/// Hash the canonical encoding of the hashed pulse fields.
pub fn compute_hash(
    index: u64,
    kind: &PulseType,
    payload: &Value,
    parent_hash: Option<&PulseHash>,
) -> PulseHash {
    let bytes = canonical_pulse_bytes(index, kind, payload, parent_hash);
    Blake3Hash::hash(&bytes).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Pulse {
        Pulse::new(3, PulseType::new("T"), json!({"a": 1}), None, 1736870400000)
    }

    #[test]
    fn test_new_pulse_verifies() {
        assert!(sample().verify());
    }

    #[test]
    fn test_timestamp_not_hashed() {
        let a = sample();
        let mut b = a.clone();
        b.timestamp += 1000;
        assert_eq!(a.compute_hash(), b.compute_hash());
        assert!(b.verify());
    }

    #[test]
    fn test_tampered_payload_fails() {
        let mut p = sample();
        p.payload = json!({"a": 2});
        assert!(!p.verify());
    }

    #[test]
    fn test_persisted_form() {
        let parent = PulseHash::from_bytes([9; 32]);
        let p = Pulse::new(0, PulseType::IDENTITY_CREATE, json!({}), Some(parent), 5);
        let value = p.to_value().unwrap();

        assert_eq!(value["type"], "IDENTITY_CREATE");
        assert_eq!(value["parentHash"], json!(parent.to_hex()));
        assert_eq!(value["hash"], json!(p.hash.to_hex()));

        let back = Pulse::from_value(value).unwrap();
        assert_eq!(back, p);
        assert!(back.verify());
    }

    #[test]
    fn test_pulse_type_equality() {
        assert_eq!(PulseType::new("API_CALL"), PulseType::API_CALL);
        assert_eq!(PulseType::API_CALL, "API_CALL");
    }
}
