//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::schema;
use crate::traits::Store;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Schema version of the open database.
    pub async fn schema_version(&self) -> Result<u32> {
        self.blocking(|conn| migration::current_version(conn)).await
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Fail unless the collection is registered in this database.
fn ensure_collection(conn: &Connection, collection: &str) -> Result<()> {
    let known: Option<String> = conn
        .query_row(
            "SELECT name FROM collections WHERE name = ?1",
            params![collection],
            |row| row.get(0),
        )
        .optional()?;
    match known {
        Some(_) => Ok(()),
        None => Err(StoreError::UnknownCollection(collection.to_owned())),
    }
}

fn parse_body(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl Store for SqliteStore {
    async fn put(&self, collection: &str, item: Value) -> Result<()> {
        let key = schema::lookup(collection)?.key_of(&item)?;
        let body = serde_json::to_string(&item)?;
        let collection = collection.to_owned();

        self.blocking(move |conn| {
            ensure_collection(conn, &collection)?;
            conn.execute(
                "INSERT INTO items (collection, key, body) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection, key) DO UPDATE SET body = excluded.body",
                params![collection, key, body],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let collection = collection.to_owned();
        let key = key.to_owned();

        self.blocking(move |conn| {
            ensure_collection(conn, &collection)?;
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM items WHERE collection = ?1 AND key = ?2",
                    params![collection, key],
                    |row| row.get(0),
                )
                .optional()?;
            body.as_deref().map(parse_body).transpose()
        })
        .await
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<Value>> {
        let collection = collection.to_owned();

        self.blocking(move |conn| {
            ensure_collection(conn, &collection)?;
            let mut stmt =
                conn.prepare("SELECT body FROM items WHERE collection = ?1 ORDER BY key")?;
            let bodies = stmt
                .query_map(params![collection], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            bodies.iter().map(|b| parse_body(b)).collect()
        })
        .await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        let collection = collection.to_owned();
        let key = key.to_owned();

        self.blocking(move |conn| {
            ensure_collection(conn, &collection)?;
            let removed = conn.execute(
                "DELETE FROM items WHERE collection = ?1 AND key = ?2",
                params![collection, key],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let collection = collection.to_owned();

        self.blocking(move |conn| {
            ensure_collection(conn, &collection)?;
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM items WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        let collection = collection.to_owned();

        self.blocking(move |conn| {
            ensure_collection(conn, &collection)?;
            conn.execute("DELETE FROM items WHERE collection = ?1", params![collection])?;
            Ok(())
        })
        .await
    }

    async fn collections(&self) -> Result<Vec<String>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(names)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::names;
    use crate::traits::StoreExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .put(names::POLICY_KEYS, json!({"id": "k1", "holder": "did:x:app1"}))
            .await
            .unwrap();

        let item = store.get(names::POLICY_KEYS, "k1").await.unwrap().unwrap();
        assert_eq!(item["holder"], "did:x:app1");
        assert!(store.get(names::POLICY_KEYS, "k2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let store = SqliteStore::open_memory().unwrap();
        store.put(names::KARMA, json!({"did": "d", "score": 1})).await.unwrap();
        store.put(names::KARMA, json!({"did": "d", "score": 2})).await.unwrap();

        assert_eq!(store.count(names::KARMA).await.unwrap(), 1);
        let item = store.get(names::KARMA, "d").await.unwrap().unwrap();
        assert_eq!(item["score"], 2);
    }

    #[tokio::test]
    async fn test_get_all_ordered_by_key() {
        let store = SqliteStore::open_memory().unwrap();
        for id in ["c", "a", "b"] {
            store.put(names::SOCIAL, json!({"id": id})).await.unwrap();
        }
        let ids: Vec<_> = store
            .get_all(names::SOCIAL)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v["id"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_delete_clear_collections() {
        let store = SqliteStore::open_memory().unwrap();
        store.put(names::FORKS, json!({"id": "f1"})).await.unwrap();
        store.put(names::FORKS, json!({"id": "f2"})).await.unwrap();

        assert!(store.delete(names::FORKS, "f1").await.unwrap());
        assert!(!store.delete(names::FORKS, "f1").await.unwrap());
        store.clear(names::FORKS).await.unwrap();
        assert_eq!(store.count(names::FORKS).await.unwrap(), 0);

        let collections = store.collections().await.unwrap();
        assert!(collections.contains(&names::REGISTERED_APPS.to_string()));
        assert_eq!(store.schema_version().await.unwrap(), schema::CURRENT_VERSION);
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(matches!(
            store.count("nope").await,
            Err(StoreError::UnknownCollection(_))
        ));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xhe.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .put_record(names::ENTROPY, &json!({"id": "e1", "bits": 256}))
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let item: Option<Value> = store.get_record(names::ENTROPY, "e1").await.unwrap();
        assert_eq!(item.unwrap()["bits"], 256);
    }
}
