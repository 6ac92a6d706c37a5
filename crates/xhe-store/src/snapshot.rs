//! Bulk export and import of a whole store.
//!
//! A snapshot maps each collection name to its items. The archive format is
//! that map as pretty-printed JSON. Importing `put`s every item, so it merges
//! into whatever the target already holds; collections the target does not
//! know are skipped and reported.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::traits::Store;

/// Every item of every collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub collections: BTreeMap<String, Vec<Value>>,
}

impl Snapshot {
    /// Total number of items across collections.
    pub fn item_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// Items of one collection, empty if absent.
    pub fn items(&self, collection: &str) -> &[Value] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Items written, per collection.
    pub imported: BTreeMap<String, usize>,
    /// Collections present in the snapshot but unknown to the target.
    pub skipped: Vec<String>,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.imported.values().sum()
    }
}

/// Read every collection of `store`.
pub async fn export<S: Store + ?Sized>(store: &S) -> Result<Snapshot> {
    let mut snapshot = Snapshot::default();
    for name in store.collections().await? {
        let items = store.get_all(&name).await?;
        snapshot.collections.insert(name, items);
    }
    debug!(items = snapshot.item_count(), "store exported");
    Ok(snapshot)
}

/// Write every item of `snapshot` into `store`.
///
/// Not transactional: a failure part-way leaves earlier items written.
pub async fn import<S: Store + ?Sized>(store: &S, snapshot: &Snapshot) -> Result<ImportReport> {
    let known = store.collections().await?;
    let mut report = ImportReport::default();

    for (name, items) in &snapshot.collections {
        if !known.contains(name) {
            warn!(collection = %name, "skipping unknown collection on import");
            report.skipped.push(name.clone());
            continue;
        }
        for item in items {
            store.put(name, item.clone()).await?;
        }
        report.imported.insert(name.clone(), items.len());
    }

    debug!(items = report.total(), skipped = report.skipped.len(), "store imported");
    Ok(report)
}

/// Encode a snapshot as an archive.
pub fn to_archive(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Decode an archive.
pub fn from_archive(json: &str) -> Result<Snapshot> {
    Ok(serde_json::from_str(json)?)
}

/// Conventional archive file name for an export taken at `now` (Unix ms).
pub fn archive_file_name(now: i64) -> String {
    format!("xhe-archive-{}.json", now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::schema::names;
    use serde_json::json;

    #[tokio::test]
    async fn test_export_lists_every_collection() {
        let store = MemoryStore::new();
        store.put(names::FORKS, json!({"id": "f"})).await.unwrap();

        let snapshot = export(&store).await.unwrap();
        assert_eq!(snapshot.collections.len(), 8);
        assert_eq!(snapshot.items(names::FORKS).len(), 1);
        assert!(snapshot.items(names::PULSARS).is_empty());
    }

    #[tokio::test]
    async fn test_import_skips_unknown() {
        let target = MemoryStore::at_version(1);
        let mut snapshot = Snapshot::default();
        snapshot
            .collections
            .insert(names::KARMA.into(), vec![json!({"did": "d", "score": 3})]);
        snapshot
            .collections
            .insert(names::REGISTERED_APPS.into(), vec![json!({"did": "app"})]);

        let report = import(&target, &snapshot).await.unwrap();
        assert_eq!(report.imported.get(names::KARMA), Some(&1));
        assert_eq!(report.skipped, vec![names::REGISTERED_APPS.to_string()]);
        assert_eq!(target.count(names::KARMA).await.unwrap(), 1);
    }

    #[test]
    fn test_archive_is_plain_map() {
        let mut snapshot = Snapshot::default();
        snapshot
            .collections
            .insert(names::FORKS.into(), vec![json!({"id": "f"})]);

        let text = to_archive(&snapshot).unwrap();
        let raw: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw["forks"][0]["id"], "f");
        assert_eq!(from_archive(&text).unwrap(), snapshot);
        assert_eq!(archive_file_name(12), "xhe-archive-12.json");
    }
}
