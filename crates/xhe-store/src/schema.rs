//! Collection schema.
//!
//! The store is opened at a schema version. Each version only ever adds
//! collections, so upgrading never touches existing data.

use serde_json::Value;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Well-known collection names.
pub mod names {
    pub const PULSARS: &str = "pulsars";
    pub const IDENTITY: &str = "identity";
    pub const POLICY_KEYS: &str = "policyKeys";
    pub const KARMA: &str = "karma";
    pub const SOCIAL: &str = "social";
    pub const FORKS: &str = "forks";
    pub const ENTROPY: &str = "entropy";
    pub const REGISTERED_APPS: &str = "registeredApps";
}

/// A named collection with its primary-key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionDef {
    pub name: &'static str,
    /// Field of each item holding its key.
    pub key_path: &'static str,
    /// Schema version that introduced the collection.
    pub since: u32,
}

impl CollectionDef {
    /// Extract the primary key of `item`.
    ///
    /// Keys are strings; numeric keys are accepted and rendered in decimal.
    pub fn key_of(&self, item: &Value) -> Result<String> {
        match item.get(self.key_path) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(StoreError::MissingKey {
                collection: self.name.to_owned(),
                key_path: self.key_path.to_owned(),
            }),
        }
    }
}

const fn def(name: &'static str, key_path: &'static str, since: u32) -> CollectionDef {
    CollectionDef {
        name,
        key_path,
        since,
    }
}

/// Every collection the schema has ever declared, in declaration order.
pub static COLLECTIONS: &[CollectionDef] = &[
    def(names::PULSARS, "hash", 1),
    def(names::IDENTITY, "did", 1),
    def(names::POLICY_KEYS, "id", 1),
    def(names::KARMA, "did", 1),
    def(names::SOCIAL, "id", 1),
    def(names::FORKS, "id", 1),
    def(names::ENTROPY, "id", 1),
    def(names::REGISTERED_APPS, "did", 2),
];

/// Collections present at `version`.
pub fn collections_at(version: u32) -> impl Iterator<Item = &'static CollectionDef> {
    COLLECTIONS.iter().filter(move |c| c.since <= version)
}

/// Collections introduced by exactly `version`.
pub fn introduced_in(version: u32) -> impl Iterator<Item = &'static CollectionDef> {
    COLLECTIONS.iter().filter(move |c| c.since == version)
}

/// Look up a collection of the current schema.
pub fn lookup(name: &str) -> Result<&'static CollectionDef> {
    COLLECTIONS
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| StoreError::UnknownCollection(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_versions_only_add() {
        let v1: Vec<_> = collections_at(1).map(|c| c.name).collect();
        let v2: Vec<_> = collections_at(2).map(|c| c.name).collect();
        assert_eq!(v1.len(), 7);
        assert!(v1.iter().all(|n| v2.contains(n)));
        assert_eq!(
            introduced_in(2).map(|c| c.name).collect::<Vec<_>>(),
            vec![names::REGISTERED_APPS]
        );
    }

    #[test]
    fn test_key_of() {
        let pulsars = lookup(names::PULSARS).unwrap();
        assert_eq!(pulsars.key_of(&json!({"hash": "ab"})).unwrap(), "ab");
        assert!(matches!(
            pulsars.key_of(&json!({"id": "ab"})),
            Err(StoreError::MissingKey { .. })
        ));

        let entropy = lookup(names::ENTROPY).unwrap();
        assert_eq!(entropy.key_of(&json!({"id": 42})).unwrap(), "42");
    }

    #[test]
    fn test_unknown_collection() {
        assert!(matches!(
            lookup("nope"),
            Err(StoreError::UnknownCollection(_))
        ));
    }
}
