//! Karma: a per-DID score projected from `KARMA_CHANGE` pulses.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::debug;

use xhe_core::{now_millis, PulseType, ValidationError};
use xhe_store::{names, Store, StoreExt};

use crate::error::Result;
use crate::ledger::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarmaEvent {
    pub amount: i64,
    pub reason: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarmaRecord {
    pub did: String,
    pub score: i64,
    #[serde(default)]
    pub history: Vec<KarmaEvent>,
}

impl KarmaRecord {
    /// Zero record for a DID with no history.
    pub fn empty(did: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            score: 0,
            history: Vec::new(),
        }
    }
}

pub struct KarmaService<S: Store> {
    store: Arc<S>,
    ledger: Arc<Ledger<S>>,
    // Serializes read-modify-write of records.
    write: Mutex<()>,
}

impl<S: Store> KarmaService<S> {
    pub fn new(store: Arc<S>, ledger: Arc<Ledger<S>>) -> Self {
        Self {
            store,
            ledger,
            write: Mutex::new(()),
        }
    }

    /// The record for `did`, or a zero record.
    pub async fn get(&self, did: &str) -> Result<KarmaRecord> {
        let record: Option<KarmaRecord> = self.store.get_record(names::KARMA, did).await?;
        Ok(record.unwrap_or_else(|| KarmaRecord::empty(did)))
    }

    /// Add `amount` (may be negative) to `did` and record a `KARMA_CHANGE` pulse.
    ///
    /// A change that would overflow the score is rejected before anything
    /// is written.
    pub async fn add(&self, did: &str, amount: i64, reason: &str) -> Result<KarmaRecord> {
        let _guard = self.write.lock().await;

        let mut record = self.get(did).await?;
        record.score = record.score.checked_add(amount).ok_or_else(|| {
            ValidationError::InvalidValue(format!("karma score for {} would overflow", did))
        })?;
        record.history.push(KarmaEvent {
            amount,
            reason: reason.to_owned(),
            timestamp: now_millis(),
        });

        self.store.put_record(names::KARMA, &record).await?;
        self.ledger
            .append(
                PulseType::KARMA_CHANGE,
                json!({ "did": did, "amount": amount, "reason": reason, "newScore": record.score }),
                None,
            )
            .await?;

        debug!(did, amount, score = record.score, "karma changed");
        Ok(record)
    }

    /// Highest scores first.
    pub async fn leaderboard(&self, limit: usize) -> Result<Vec<KarmaRecord>> {
        let mut all: Vec<KarmaRecord> = self.store.get_all_records(names::KARMA).await?;
        all.sort_by(|a, b| b.score.cmp(&a.score));
        all.truncate(limit);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::EventDispatcher;
    use xhe_store::MemoryStore;

    async fn karma() -> (Arc<Ledger<MemoryStore>>, KarmaService<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(
            Ledger::open(store.clone(), Arc::new(EventDispatcher::new()))
                .await
                .unwrap(),
        );
        (ledger.clone(), KarmaService::new(store, ledger))
    }

    #[tokio::test]
    async fn test_unknown_did_is_zero() {
        let (_, karma) = karma().await;
        assert_eq!(karma.get("did:xhe:nobody").await.unwrap(), KarmaRecord::empty("did:xhe:nobody"));
    }

    #[tokio::test]
    async fn test_add_accumulates_and_records() {
        let (ledger, karma) = karma().await;
        karma.add("did:xhe:a", 5, "helpful").await.unwrap();
        let record = karma.add("did:xhe:a", -2, "spam").await.unwrap();

        assert_eq!(record.score, 3);
        assert_eq!(record.history.len(), 2);

        let pulses = ledger.ordered().await.unwrap();
        assert_eq!(pulses.len(), 2);
        assert_eq!(pulses[1].kind, PulseType::KARMA_CHANGE);
        assert_eq!(pulses[1].payload["newScore"], 3);
    }

    #[tokio::test]
    async fn test_overflow_is_rejected_without_writes() {
        let (ledger, karma) = karma().await;
        karma.add("did:xhe:a", i64::MAX, "max").await.unwrap();

        let err = karma.add("did:xhe:a", 1, "one more").await.unwrap_err();
        assert!(matches!(err, crate::error::KernelError::Validation(_)));

        let record = karma.get("did:xhe:a").await.unwrap();
        assert_eq!(record.score, i64::MAX);
        assert_eq!(record.history.len(), 1);
        assert_eq!(ledger.count().await.unwrap(), 1);

        let record = karma.add("did:xhe:a", i64::MIN, "reset").await.unwrap();
        assert_eq!(record.score, -1);
    }

    #[tokio::test]
    async fn test_leaderboard_descending() {
        let (_, karma) = karma().await;
        karma.add("did:xhe:a", 1, "r").await.unwrap();
        karma.add("did:xhe:b", 7, "r").await.unwrap();
        karma.add("did:xhe:c", 4, "r").await.unwrap();

        let top: Vec<_> = karma
            .leaderboard(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.did)
            .collect();
        assert_eq!(top, vec!["did:xhe:b", "did:xhe:c"]);
    }
}
