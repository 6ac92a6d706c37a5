//! # Xhe Store
//!
//! Storage abstraction for the Xhe ledger. Items are JSON objects grouped in
//! named collections keyed by a declared field; the schema is versioned and
//! only ever adds collections.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`Snapshot`] - Bulk export of every collection
//!
//! ## Usage
//!
//! ```rust,no_run
//! use serde_json::json;
//! use xhe_store::{names, SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("xhe.db").unwrap();
//!     store.put(names::FORKS, json!({"id": "f1", "name": "main"})).await.unwrap();
//!     let fork = store.get(names::FORKS, "f1").await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Upsert**: putting an item with an existing key replaces it
//! - **No cross-collection transactions**: each call is isolated on its own
//! - **Additive schema**: version 1 holds the base collections, version 2 adds
//!   `registeredApps`

pub mod error;
pub mod memory;
pub mod migration;
pub mod schema;
pub mod snapshot;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use schema::{names, CollectionDef, CURRENT_VERSION};
pub use snapshot::{ImportReport, Snapshot};
pub use sqlite::SqliteStore;
pub use traits::{Store, StoreExt};
