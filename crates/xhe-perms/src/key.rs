//! Policy keys and their audit payloads.
//!
//! A policy key is a bearer token naming a holder and a set of capabilities.
//! It is created by issue, changed only by revoke, and never deleted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use xhe_core::capability::WILDCARD;
use xhe_core::hash_hex;

use crate::error::{PermsError, Result};

/// A capability-scoped bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyKey {
    /// Content-derived identifier.
    pub id: String,

    /// DID of the identity allowed to present this key.
    pub holder: String,

    /// Granted capability names. `*` grants everything.
    pub capabilities: BTreeSet<String>,

    /// Absolute expiry (Unix ms). `None` never expires.
    #[serde(default)]
    pub expiry: Option<i64>,

    /// Monotonic: once set, never cleared.
    #[serde(default)]
    pub revoked: bool,

    pub issued_at: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<i64>,
}

impl PolicyKey {
    /// Build an unrevoked key.
    pub fn new<I, S>(
        id: impl Into<String>,
        holder: impl Into<String>,
        capabilities: I,
        expiry: Option<i64>,
        issued_at: i64,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            holder: holder.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            expiry,
            revoked: false,
            issued_at,
            revoked_at: None,
        }
    }

    /// Mark the key revoked. Revoking twice keeps the first timestamp.
    pub fn revoke(&mut self, now: i64) {
        if !self.revoked {
            self.revoked = true;
            self.revoked_at = Some(now);
        }
    }

    /// Expired when an expiry is set and `now` is past it.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiry.is_some_and(|expiry| now > expiry)
    }

    /// Whether the capability set holds `capability` or the wildcard.
    pub fn grants(&self, capability: &str) -> bool {
        self.capabilities.contains(WILDCARD) || self.capabilities.contains(capability)
    }

    /// Neither revoked nor expired, and grants `capability`.
    pub fn allows(&self, capability: &str, now: i64) -> bool {
        !self.revoked && !self.is_expired(now) && self.grants(capability)
    }

    /// Required capabilities this key does not grant, in input order.
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|cap| !self.grants(cap))
            .collect()
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| PermsError::InvalidKey(e.to_string()))
    }
}

/// Key id: `H("{holder}:{now}:{nonce}")`.
///
/// The nonce keeps two keys issued to the same holder in the same
/// millisecond distinct.
pub fn derive_key_id(holder: &str, now: i64, nonce: &str) -> String {
    hash_hex(format!("{}:{}:{}", holder, now, nonce))
}

/// Payload of a `POLICY_KEY_ISSUE` pulse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePayload {
    pub key_id: String,
    pub holder: String,
    pub capabilities: BTreeSet<String>,
}

impl From<&PolicyKey> for IssuePayload {
    fn from(key: &PolicyKey) -> Self {
        Self {
            key_id: key.id.clone(),
            holder: key.holder.clone(),
            capabilities: key.capabilities.clone(),
        }
    }
}

/// Payload of a `POLICY_KEY_REVOKE` pulse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokePayload {
    pub key_id: String,
}

impl RevokePayload {
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
        }
    }
}
