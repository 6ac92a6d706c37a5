//! Policy key lifecycle: issue, revoke, check.
//!
//! Every issue and revoke writes the key record first and then appends an
//! audit pulse. The two writes are not atomic: a crash between them leaves a
//! key without its audit pulse.

use std::sync::Arc;

use tracing::{info, warn};

use xhe_core::{now_millis, random_nonce, PulseType};
use xhe_perms::{derive_key_id, evaluate, Denial, IssuePayload, PolicyKey, RevokePayload};
use xhe_store::{names, Store, StoreExt};

use crate::error::{KernelError, Result};
use crate::ledger::Ledger;

pub struct PolicyKeyStore<S: Store> {
    store: Arc<S>,
    ledger: Arc<Ledger<S>>,
}

impl<S: Store> PolicyKeyStore<S> {
    pub fn new(store: Arc<S>, ledger: Arc<Ledger<S>>) -> Self {
        Self { store, ledger }
    }

    /// Issue a key to `holder` and record a `POLICY_KEY_ISSUE` pulse.
    pub async fn issue<I, C>(&self, holder: &str, capabilities: I, expiry: Option<i64>) -> Result<PolicyKey>
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let now = now_millis();
        let id = derive_key_id(holder, now, &random_nonce());
        let key = PolicyKey::new(id, holder, capabilities, expiry, now);

        self.store.put(names::POLICY_KEYS, key.to_value()?).await?;
        self.ledger
            .append(
                PulseType::POLICY_KEY_ISSUE,
                serde_json::to_value(IssuePayload::from(&key))?,
                None,
            )
            .await?;

        info!(key_id = %key.id, holder, capabilities = ?key.capabilities, "policy key issued");
        Ok(key)
    }

    /// Revoke a key and record a `POLICY_KEY_REVOKE` pulse.
    pub async fn revoke(&self, key_id: &str) -> Result<PolicyKey> {
        let mut key = self
            .get(key_id)
            .await?
            .ok_or_else(|| KernelError::not_found(format!("policy key {}", key_id)))?;

        key.revoke(now_millis());
        self.store.put(names::POLICY_KEYS, key.to_value()?).await?;
        self.ledger
            .append(
                PulseType::POLICY_KEY_REVOKE,
                serde_json::to_value(RevokePayload::new(key_id))?,
                None,
            )
            .await?;

        info!(key_id, "policy key revoked");
        Ok(key)
    }

    /// Whether the key exists, is live, and grants `capability` (or `*`).
    ///
    /// Never errors: a store failure is logged and answers false.
    pub async fn check(&self, key_id: &str, capability: &str) -> bool {
        match self.get(key_id).await {
            Ok(Some(key)) => key.allows(capability, now_millis()),
            Ok(None) => false,
            Err(e) => {
                warn!(key_id, error = %e, "policy key lookup failed during check");
                false
            }
        }
    }

    /// Apply the full rule, holder included, to a presented key.
    pub async fn evaluate(&self, holder: &str, key_id: &str, required: &[&str]) -> Result<std::result::Result<(), Denial>> {
        let key = self.get(key_id).await?;
        Ok(evaluate(key.as_ref(), holder, required, now_millis()))
    }

    pub async fn get(&self, key_id: &str) -> Result<Option<PolicyKey>> {
        match self.store.get(names::POLICY_KEYS, key_id).await? {
            Some(item) => Ok(Some(PolicyKey::from_value(item)?)),
            None => Ok(None),
        }
    }

    /// Non-revoked keys of `holder`.
    pub async fn by_holder(&self, holder: &str) -> Result<Vec<PolicyKey>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|k| k.holder == holder && !k.revoked)
            .collect())
    }

    pub async fn all(&self) -> Result<Vec<PolicyKey>> {
        Ok(self.store.get_all_records(names::POLICY_KEYS).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::EventDispatcher;
    use xhe_store::MemoryStore;

    async fn keys() -> (Arc<Ledger<MemoryStore>>, PolicyKeyStore<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(
            Ledger::open(store.clone(), Arc::new(EventDispatcher::new()))
                .await
                .unwrap(),
        );
        (ledger.clone(), PolicyKeyStore::new(store, ledger))
    }

    #[tokio::test]
    async fn test_issue_and_check() {
        let (ledger, keys) = keys().await;
        let key = keys.issue("did:x:app1", ["WRITE"], None).await.unwrap();

        assert!(keys.check(&key.id, "WRITE").await);
        assert!(!keys.check(&key.id, "STORAGE").await);
        assert!(!keys.check("missing", "WRITE").await);

        let pulses = ledger.ordered().await.unwrap();
        assert_eq!(pulses[0].kind, PulseType::POLICY_KEY_ISSUE);
        assert_eq!(pulses[0].payload["keyId"], key.id.as_str());
        assert_eq!(pulses[0].payload["holder"], "did:x:app1");
    }

    #[tokio::test]
    async fn test_wildcard_passes_anything() {
        let (_, keys) = keys().await;
        let key = keys.issue("did:x:app1", ["*"], None).await.unwrap();
        assert!(keys.check(&key.id, "ANYTHING").await);
    }

    #[tokio::test]
    async fn test_revoke() {
        let (ledger, keys) = keys().await;
        let key = keys.issue("did:x:app1", ["*"], None).await.unwrap();
        let revoked = keys.revoke(&key.id).await.unwrap();

        assert!(revoked.revoked);
        assert!(revoked.revoked_at.is_some());
        assert!(!keys.check(&key.id, "WRITE").await);
        assert_eq!(ledger.next_index().await, 2);

        let err = keys.revoke("missing").await.unwrap_err();
        assert!(matches!(err, KernelError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_expired_key_fails_check() {
        let (_, keys) = keys().await;
        let key = keys.issue("did:x:app1", ["WRITE"], Some(1)).await.unwrap();
        assert!(!keys.check(&key.id, "WRITE").await);
    }

    #[tokio::test]
    async fn test_by_holder_excludes_revoked() {
        let (_, keys) = keys().await;
        let a = keys.issue("did:x:app1", ["WRITE"], None).await.unwrap();
        let b = keys.issue("did:x:app1", ["READ"], None).await.unwrap();
        keys.issue("did:x:app2", ["READ"], None).await.unwrap();
        keys.revoke(&a.id).await.unwrap();

        let held = keys.by_holder("did:x:app1").await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].id, b.id);
        assert_eq!(keys.all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_evaluate_checks_holder() {
        let (_, keys) = keys().await;
        let key = keys.issue("did:x:app1", ["WRITE"], None).await.unwrap();
        assert_eq!(
            keys.evaluate("did:x:app2", &key.id, &["WRITE"]).await.unwrap(),
            Err(Denial::WrongHolder)
        );
        assert_eq!(keys.evaluate("did:x:app1", &key.id, &["WRITE"]).await.unwrap(), Ok(()));
    }
}
