//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::schema::{self, CURRENT_VERSION};
use crate::traits::Store;

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    /// Create a new empty store at the current schema version.
    pub fn new() -> Self {
        Self::at_version(CURRENT_VERSION)
    }

    /// Create a new empty store holding the collections of `version`.
    pub fn at_version(version: u32) -> Self {
        let collections = schema::collections_at(version)
            .map(|c| (c.name.to_owned(), BTreeMap::new()))
            .collect();
        Self {
            inner: RwLock::new(collections),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(collection: &str) -> StoreError {
    StoreError::UnknownCollection(collection.to_owned())
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(&self, collection: &str, item: Value) -> Result<()> {
        let key = schema::lookup(collection)?.key_of(&item)?;
        let mut inner = self.write()?;
        inner
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?
            .insert(key, item);
        Ok(())
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let inner = self.read()?;
        let items = inner.get(collection).ok_or_else(|| missing(collection))?;
        Ok(items.get(key).cloned())
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<Value>> {
        let inner = self.read()?;
        let items = inner.get(collection).ok_or_else(|| missing(collection))?;
        Ok(items.values().cloned().collect())
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let mut inner = self.write()?;
        let items = inner.get_mut(collection).ok_or_else(|| missing(collection))?;
        Ok(items.remove(key).is_some())
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let inner = self.read()?;
        let items = inner.get(collection).ok_or_else(|| missing(collection))?;
        Ok(items.len() as u64)
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?
            .clear();
        Ok(())
    }

    async fn collections(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::names;
    use proptest::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_replace() {
        let store = MemoryStore::new();
        store
            .put(names::KARMA, json!({"did": "did:xhe:a", "score": 1}))
            .await
            .unwrap();
        store
            .put(names::KARMA, json!({"did": "did:xhe:a", "score": 5}))
            .await
            .unwrap();

        let item = store.get(names::KARMA, "did:xhe:a").await.unwrap().unwrap();
        assert_eq!(item["score"], 5);
        assert_eq!(store.count(names::KARMA).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            store.put(names::FORKS, json!({"id": id})).await.unwrap();
        }

        assert!(store.delete(names::FORKS, "b").await.unwrap());
        assert!(!store.delete(names::FORKS, "b").await.unwrap());
        assert_eq!(store.count(names::FORKS).await.unwrap(), 2);

        store.clear(names::FORKS).await.unwrap();
        assert!(store.get_all(names::FORKS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_version_gates_collections() {
        let store = MemoryStore::at_version(1);
        let err = store
            .put(names::REGISTERED_APPS, json!({"did": "did:xhe:app:x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownCollection(_)));

        let names = store.collections().await.unwrap();
        assert_eq!(names.len(), 7);
    }

    #[tokio::test]
    async fn test_missing_key_rejected() {
        let store = MemoryStore::new();
        let err = store.put(names::PULSARS, json!({"index": 0})).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingKey { .. }));
    }

    proptest! {
        #[test]
        fn last_write_wins_in_key_order(writes in prop::collection::vec(("[a-f]", any::<i64>()), 0..32)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStore::new();
                let mut expected = BTreeMap::new();
                for (did, score) in &writes {
                    store
                        .put(names::KARMA, json!({"did": did, "score": score}))
                        .await
                        .unwrap();
                    expected.insert(did.clone(), *score);
                }

                assert_eq!(store.count(names::KARMA).await.unwrap(), expected.len() as u64);
                let stored: Vec<(String, i64)> = store
                    .get_all(names::KARMA)
                    .await
                    .unwrap()
                    .iter()
                    .map(|item| (item["did"].as_str().unwrap().to_owned(), item["score"].as_i64().unwrap()))
                    .collect();
                assert_eq!(stored, expected.into_iter().collect::<Vec<_>>());
            });
        }
    }
}
