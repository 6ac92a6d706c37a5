//! The ledger: an append-only sequence of hash-linked pulses.
//!
//! Index assignment, hashing, persistence and dispatch happen inside one
//! critical section, so indices are gapless and unique no matter how many
//! tasks append concurrently. A failed persist hands its index back.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use xhe_core::{now_millis, Pulse, PulseHash, PulseType};
use xhe_store::{names, Store};

use crate::dispatch::EventDispatcher;
use crate::error::{KernelError, Result};

/// One stored pulse with the outcome of recomputing its hash.
///
/// A stored item that no longer decodes as a pulse is reported as invalid
/// with `pulse` unset and the decode error in `malformed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayEntry {
    /// The stored index, when it is still readable.
    pub index: Option<u64>,
    pub pulse: Option<Pulse>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub malformed: Option<String>,
}

impl ReplayEntry {
    fn check(item: Value) -> Self {
        let index = item.get("index").and_then(Value::as_u64);
        match Pulse::from_value(item) {
            Ok(pulse) => Self {
                index: Some(pulse.index),
                valid: pulse.verify(),
                pulse: Some(pulse),
                malformed: None,
            },
            Err(e) => Self {
                index,
                pulse: None,
                valid: false,
                malformed: Some(e.to_string()),
            },
        }
    }
}

pub struct Ledger<S: Store> {
    store: Arc<S>,
    next_index: Mutex<u64>,
    dispatcher: Arc<EventDispatcher>,
}

impl<S: Store> Ledger<S> {
    /// Open the ledger over `store`, deriving the next index from the number
    /// of persisted pulses.
    pub async fn open(store: Arc<S>, dispatcher: Arc<EventDispatcher>) -> Result<Self> {
        let next = derive_next_index(store.as_ref()).await?;
        info!(next_index = next, "ledger opened");
        Ok(Self {
            store,
            next_index: Mutex::new(next),
            dispatcher,
        })
    }

    /// Re-derive the next index from the store, e.g. after a bulk import.
    pub async fn resync(&self) -> Result<u64> {
        let mut next = self.next_index.lock().await;
        *next = derive_next_index(self.store.as_ref()).await?;
        Ok(*next)
    }

    /// Append a pulse and notify listeners.
    pub async fn append(
        &self,
        kind: PulseType,
        payload: Value,
        parent_hash: Option<PulseHash>,
    ) -> Result<Pulse> {
        let mut next = self.next_index.lock().await;
        let index = *next;
        *next = index + 1;

        let pulse = Pulse::new(index, kind, payload, parent_hash, now_millis());
        if let Err(e) = self.persist(&pulse).await {
            *next = index;
            warn!(index, kind = %pulse.kind, error = %e, "pulse persist failed, index rolled back");
            return Err(e);
        }

        debug!(index, kind = %pulse.kind, hash = %pulse.hash.short(), "pulse appended");
        self.dispatcher.dispatch(&pulse);
        Ok(pulse)
    }

    async fn persist(&self, pulse: &Pulse) -> Result<()> {
        let item = pulse.to_value()?;
        self.store.put(names::PULSARS, item).await?;
        Ok(())
    }

    /// Look up a pulse by hash.
    pub async fn get(&self, hash: &PulseHash) -> Result<Pulse> {
        let item = self
            .store
            .get(names::PULSARS, &hash.to_hex())
            .await?
            .ok_or_else(|| KernelError::not_found(format!("pulse {}", hash.short())))?;
        Ok(Pulse::from_value(item)?)
    }

    /// Every pulse, in store order.
    pub async fn get_all(&self) -> Result<Vec<Pulse>> {
        self.store
            .get_all(names::PULSARS)
            .await?
            .into_iter()
            .map(|item| Pulse::from_value(item).map_err(KernelError::from))
            .collect()
    }

    /// Every pulse, ascending by index.
    pub async fn ordered(&self) -> Result<Vec<Pulse>> {
        let mut pulses = self.get_all().await?;
        pulses.sort_by_key(|p| p.index);
        Ok(pulses)
    }

    /// The last `n` pulses, ascending by index.
    pub async fn get_latest(&self, n: usize) -> Result<Vec<Pulse>> {
        let mut pulses = self.ordered().await?;
        let skip = pulses.len().saturating_sub(n);
        Ok(pulses.split_off(skip))
    }

    /// Recompute the hash of every pulse with `index >= from_index`.
    ///
    /// Reads the raw stored items, so a record that no longer decodes shows
    /// up as an invalid entry instead of failing the whole replay. Items
    /// whose index is unreadable are always included, after the rest.
    pub async fn replay(&self, from_index: u64) -> Result<Vec<ReplayEntry>> {
        let mut entries: Vec<ReplayEntry> = self
            .store
            .get_all(names::PULSARS)
            .await?
            .into_iter()
            .map(ReplayEntry::check)
            .filter(|e| e.index.map_or(true, |i| i >= from_index))
            .collect();
        entries.sort_by_key(|e| e.index.unwrap_or(u64::MAX));

        let invalid = entries.iter().filter(|e| !e.valid).count();
        if invalid > 0 {
            let malformed = entries.iter().filter(|e| e.malformed.is_some()).count();
            warn!(from_index, invalid, malformed, "replay found invalid pulses");
        }
        Ok(entries)
    }

    /// The lowest-index pulse satisfying `predicate`.
    pub async fn find<P>(&self, predicate: P) -> Result<Option<Pulse>>
    where
        P: Fn(&Pulse) -> bool,
    {
        Ok(self.ordered().await?.into_iter().find(|p| predicate(p)))
    }

    /// The index the next append will take.
    pub async fn next_index(&self) -> u64 {
        *self.next_index.lock().await
    }

    /// Number of persisted pulses.
    pub async fn count(&self) -> Result<u64> {
        Ok(self.store.count(names::PULSARS).await?)
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }
}

async fn derive_next_index<S: Store + ?Sized>(store: &S) -> Result<u64> {
    let count = store.count(names::PULSARS).await?;
    if count == 0 {
        return Ok(0);
    }

    let max_index = store
        .get_all(names::PULSARS)
        .await?
        .iter()
        .filter_map(|item| item.get("index").and_then(Value::as_u64))
        .max();
    if max_index.map(|m| m + 1) != Some(count) {
        warn!(count, ?max_index, "pulse count does not match highest index");
    }
    Ok(count)
}
