//! Store trait: the abstract interface for collection persistence.
//!
//! Items are JSON objects grouped into named collections, each keyed by a
//! declared field (see [`crate::schema`]). Implementations include SQLite
//! (primary) and in-memory (for tests).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// The Store trait: async interface for collection persistence.
///
/// # Design Notes
///
/// - **Upsert**: `put` replaces any item with the same key.
/// - **Per-operation isolation**: each call is atomic on its own. Nothing
///   spans calls; a caller writing to two collections can observe a crash
///   between them.
/// - **Ordering**: `get_all` returns items ordered by key.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or replace an item. The key is read from the collection's key path.
    async fn put(&self, collection: &str, item: Value) -> Result<()>;

    /// Get an item by key.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>>;

    /// Every item of a collection.
    async fn get_all(&self, collection: &str) -> Result<Vec<Value>>;

    /// Remove an item. Returns whether it existed.
    async fn delete(&self, collection: &str, key: &str) -> Result<bool>;

    /// Number of items in a collection.
    async fn count(&self, collection: &str) -> Result<u64>;

    /// Remove every item of a collection.
    async fn clear(&self, collection: &str) -> Result<()>;

    /// Names of the collections this store holds.
    async fn collections(&self) -> Result<Vec<String>>;
}

/// Typed helpers over [`Store`].
#[async_trait]
pub trait StoreExt: Store {
    /// Serialize a record and put it.
    async fn put_record<T>(&self, collection: &str, record: &T) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let item = serde_json::to_value(record)?;
        self.put(collection, item).await
    }

    /// Get and deserialize a record.
    async fn get_record<T>(&self, collection: &str, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(collection, key).await? {
            Some(item) => Ok(Some(serde_json::from_value(item)?)),
            None => Ok(None),
        }
    }

    /// Get and deserialize every record of a collection.
    async fn get_all_records<T>(&self, collection: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.get_all(collection)
            .await?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(Into::into))
            .collect()
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
