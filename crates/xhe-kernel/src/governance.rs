//! Forks, proposals and votes.
//!
//! Forks are stored and selectable. Proposals and votes exist only as
//! pulses; nothing tallies them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use xhe_core::{hash_hex, now_millis, random_nonce, Pulse, PulseHash, PulseType};
use xhe_store::{names, Store, StoreExt};

use crate::error::{KernelError, Result};
use crate::ledger::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fork {
    pub id: String,
    pub name: String,
    pub description: String,
    pub from_pulse_index: u64,
    pub created: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

/// Proposal kind used when none is given.
pub const DEFAULT_PROPOSAL_KIND: &str = "feature";

pub struct ForkGovernance<S: Store> {
    store: Arc<S>,
    ledger: Arc<Ledger<S>>,
}

impl<S: Store> ForkGovernance<S> {
    pub fn new(store: Arc<S>, ledger: Arc<Ledger<S>>) -> Self {
        Self { store, ledger }
    }

    /// Store a fork and record a `FORK_CREATE` pulse.
    pub async fn create_fork(&self, name: &str, description: &str, from_pulse_index: u64) -> Result<Fork> {
        let now = now_millis();
        let fork = Fork {
            id: hash_hex(format!("fork:{}:{}:{}", name, now, random_nonce())),
            name: name.to_owned(),
            description: description.to_owned(),
            from_pulse_index,
            created: now,
            active: true,
        };

        self.store.put_record(names::FORKS, &fork).await?;
        self.ledger
            .append(
                PulseType::FORK_CREATE,
                json!({ "forkId": fork.id, "name": fork.name, "fromPulseIndex": from_pulse_index }),
                None,
            )
            .await?;

        info!(fork_id = %fork.id, name, from_pulse_index, "fork created");
        Ok(fork)
    }

    pub async fn forks(&self) -> Result<Vec<Fork>> {
        Ok(self.store.get_all_records(names::FORKS).await?)
    }

    /// Record a `FORK_SELECT` pulse for an existing fork.
    pub async fn select_fork(&self, fork_id: &str) -> Result<Fork> {
        let fork: Fork = self
            .store
            .get_record(names::FORKS, fork_id)
            .await?
            .ok_or_else(|| KernelError::not_found(format!("fork {}", fork_id)))?;

        self.ledger
            .append(PulseType::FORK_SELECT, json!({ "forkId": fork_id }), None)
            .await?;
        Ok(fork)
    }

    /// Record a `GOVERNANCE_PROPOSAL` pulse.
    pub async fn submit_proposal(
        &self,
        proposer: &str,
        title: &str,
        description: &str,
        kind: Option<&str>,
    ) -> Result<Pulse> {
        let payload = json!({
            "title": title,
            "description": description,
            "type": kind.unwrap_or(DEFAULT_PROPOSAL_KIND),
            "proposer": proposer,
            "votes": { "yes": 0, "no": 0, "abstain": 0 },
            "status": "active",
        });
        self.ledger
            .append(PulseType::GOVERNANCE_PROPOSAL, payload, None)
            .await
    }

    /// Record a `GOVERNANCE_VOTE` pulse linked to the proposal pulse.
    pub async fn vote(
        &self,
        voter: &str,
        proposal: &PulseHash,
        choice: VoteChoice,
        weight: u32,
    ) -> Result<Pulse> {
        let payload = json!({
            "proposalHash": proposal,
            "voter": voter,
            "choice": choice,
            "weight": weight,
        });
        self.ledger
            .append(PulseType::GOVERNANCE_VOTE, payload, Some(*proposal))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::EventDispatcher;
    use xhe_store::MemoryStore;

    async fn governance() -> (Arc<Ledger<MemoryStore>>, ForkGovernance<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(
            Ledger::open(store.clone(), Arc::new(EventDispatcher::new()))
                .await
                .unwrap(),
        );
        (ledger.clone(), ForkGovernance::new(store, ledger))
    }

    #[tokio::test]
    async fn test_create_and_select_fork() {
        let (ledger, gov) = governance().await;
        let fork = gov.create_fork("experimental", "try things", 0).await.unwrap();
        assert!(fork.active);
        assert_eq!(gov.forks().await.unwrap(), vec![fork.clone()]);

        let selected = gov.select_fork(&fork.id).await.unwrap();
        assert_eq!(selected, fork);

        let kinds: Vec<_> = ledger.ordered().await.unwrap().into_iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![PulseType::FORK_CREATE, PulseType::FORK_SELECT]);
    }

    #[tokio::test]
    async fn test_select_unknown_fork() {
        let (ledger, gov) = governance().await;
        let err = gov.select_fork("nope").await.unwrap_err();
        assert!(matches!(err, KernelError::NotFound(_)));
        assert_eq!(ledger.next_index().await, 0);
    }

    #[tokio::test]
    async fn test_proposal_and_vote() {
        let (_, gov) = governance().await;
        let proposal = gov
            .submit_proposal("did:xhe:a", "Raise limits", "details", None)
            .await
            .unwrap();
        assert_eq!(proposal.payload["type"], DEFAULT_PROPOSAL_KIND);
        assert_eq!(proposal.payload["votes"]["yes"], 0);

        let vote = gov
            .vote("did:xhe:b", &proposal.hash, VoteChoice::Abstain, 2)
            .await
            .unwrap();
        assert_eq!(vote.parent_hash, Some(proposal.hash));
        assert_eq!(vote.payload["choice"], "abstain");
        assert_eq!(vote.payload["proposalHash"], proposal.hash.to_hex());
    }
}
