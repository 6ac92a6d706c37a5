//! Registry of third-party applications.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use xhe_core::hash_hex;
use xhe_store::{names, Store, StoreExt};

use crate::error::Result;

/// Prefix of every application DID.
pub const APP_DID_PREFIX: &str = "did:xhe:app:";

/// What an application asks for when registering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppManifest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredApp {
    pub did: String,
    pub name: String,
    pub description: String,
    pub url: String,
    pub capabilities: BTreeSet<String>,
    /// DID of the identity that registered the app.
    pub owner: String,
    pub policy_key_id: String,
    pub registered: i64,
    pub active: bool,
}

/// `did:xhe:app:` + 32 hex chars of `H("app:{name}:{now}:{nonce}")`.
pub fn derive_app_did(name: &str, now: i64, nonce: &str) -> String {
    let seed = hash_hex(format!("app:{}:{}:{}", name, now, nonce));
    format!("{}{}", APP_DID_PREFIX, &seed[..32])
}

pub struct AppRegistry<S: Store> {
    store: Arc<S>,
}

impl<S: Store> AppRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn put(&self, app: &RegisteredApp) -> Result<()> {
        Ok(self.store.put_record(names::REGISTERED_APPS, app).await?)
    }

    pub async fn get(&self, did: &str) -> Result<Option<RegisteredApp>> {
        Ok(self.store.get_record(names::REGISTERED_APPS, did).await?)
    }

    pub async fn all(&self) -> Result<Vec<RegisteredApp>> {
        Ok(self.store.get_all_records(names::REGISTERED_APPS).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xhe_store::MemoryStore;

    #[test]
    fn test_app_did_shape() {
        let did = derive_app_did("chat", 5, "n");
        assert!(did.starts_with(APP_DID_PREFIX));
        assert_eq!(did.len(), APP_DID_PREFIX.len() + 32);
        assert_ne!(did, derive_app_did("chat", 5, "m"));
    }

    #[tokio::test]
    async fn test_registry_roundtrip() {
        let registry = AppRegistry::new(Arc::new(MemoryStore::new()));
        let app = RegisteredApp {
            did: derive_app_did("chat", 1, "n"),
            name: "chat".into(),
            description: String::new(),
            url: "https://chat.example".into(),
            capabilities: ["WRITE".to_string()].into(),
            owner: "did:xhe:owner".into(),
            policy_key_id: "k".into(),
            registered: 1,
            active: true,
        };
        registry.put(&app).await.unwrap();

        assert_eq!(registry.get(&app.did).await.unwrap(), Some(app.clone()));
        assert_eq!(registry.all().await.unwrap(), vec![app]);
        assert!(registry.get("did:xhe:app:none").await.unwrap().is_none());
    }
}
