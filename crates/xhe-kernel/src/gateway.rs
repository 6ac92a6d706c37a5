//! The gateway: the surface applications talk to.
//!
//! Application calls present a policy key and are checked with the same rule
//! as [`Gateway::validate`]: the key must exist, be live, belong to the
//! calling app and carry the capability the operation is gated on. Calls made
//! by the node owner ([`Caller::Local`]) are not checked.

use std::collections::BTreeSet;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use xhe_core::capability::{ops, WRITE};
use xhe_core::{now_millis, random_nonce, validate_payload, Pulse, PulseHash, PulseType, ValidationError};
use xhe_perms::{PolicyKey, Verdict};
use xhe_store::Store;

use crate::apps::{derive_app_did, AppManifest, RegisteredApp};
use crate::dispatch::{ListenerError, Subscription, TypeFilter};
use crate::error::{KernelError, Result};
use crate::governance::{Fork, VoteChoice};
use crate::karma::KarmaRecord;
use crate::kernel::Kernel;
use crate::social::Post;

/// Content type recorded when none is given.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";
/// Leaderboard size when none is given.
pub const DEFAULT_LEADERBOARD: usize = 10;
/// Number of posts listed when none is given.
pub const DEFAULT_POSTS: usize = 20;

/// Who is making a gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// The node owner. Unchecked.
    Local,
    /// A registered application presenting a policy key.
    App { did: String, key_id: String },
}

impl Caller {
    pub fn app(did: impl Into<String>, key_id: impl Into<String>) -> Self {
        Caller::App {
            did: did.into(),
            key_id: key_id.into(),
        }
    }

    fn app_did(&self) -> Option<&str> {
        match self {
            Caller::Local => None,
            Caller::App { did, .. } => Some(did),
        }
    }
}

/// One pulse an application wants appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: PulseType,
    pub payload: Value,
}

impl Operation {
    pub fn new(kind: impl Into<PulseType>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Result of [`Gateway::store_content`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentReceipt {
    pub cid: String,
    /// Hash of the `CONTENT_STORE` pulse.
    pub hash: PulseHash,
    pub size: usize,
}

/// Result of [`Gateway::retrieve_content`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredContent {
    pub cid: String,
    /// Payload of the `CONTENT_STORE` pulse.
    pub metadata: Value,
    pub pulse_index: u64,
    /// The bytes, if the content store still has them.
    pub data: Option<Bytes>,
}

/// Gateway view over a [`Kernel`].
pub struct Gateway<'k, S: Store> {
    kernel: &'k Kernel<S>,
}

impl<'k, S: Store> Gateway<'k, S> {
    pub(crate) fn new(kernel: &'k Kernel<S>) -> Self {
        Self { kernel }
    }

    // -------------------------------------------------------------------------
    // Authorization
    // -------------------------------------------------------------------------

    /// Check `caller` against the capability `operation` is gated on.
    async fn authorize(&self, caller: &Caller, operation: &str) -> Result<()> {
        let Caller::App { did, key_id } = caller else {
            return Ok(());
        };
        let required = self.kernel.capabilities.required_for(operation).unwrap_or(WRITE);

        if let Err(denial) = self.kernel.keys.evaluate(did, key_id, &[required]).await? {
            warn!(app = %did, key_id = %key_id, operation, reason = %denial, "gateway call denied");
            return Err(denial.into());
        }
        Ok(())
    }

    /// Whether `key_id` lets `app_did` use every capability in `required`.
    /// Never changes state.
    pub async fn validate(&self, app_did: &str, key_id: &str, required: &[&str]) -> Result<Verdict> {
        Ok(self.kernel.keys.evaluate(app_did, key_id, required).await?.into())
    }

    /// [`Gateway::validate`] for a single capability, as a bool.
    pub async fn verify_capability(&self, app_did: &str, key_id: &str, capability: &str) -> Result<bool> {
        Ok(self.validate(app_did, key_id, &[capability]).await?.valid)
    }

    fn check_schema(&self, kind: &PulseType, payload: &Value) -> Result<()> {
        if self.kernel.config.validate_payloads {
            validate_payload(kind, payload)?;
        }
        Ok(())
    }

    fn check_capability_names<'a, I>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        match self.kernel.capabilities.first_unknown(names) {
            Some(name) => Err(ValidationError::UnknownCapability(name.to_owned()).into()),
            None => Ok(()),
        }
    }

    // -------------------------------------------------------------------------
    // Pulses
    // -------------------------------------------------------------------------

    /// Append `operations` on behalf of `app_did`, then an `API_CALL` pulse.
    ///
    /// Nothing is appended when the key is rejected. Once appending starts it
    /// is not transactional: if operation `k` fails, `0..k` stay committed.
    pub async fn submit_pulse(&self, app_did: &str, key_id: &str, operations: Vec<Operation>) -> Result<Vec<Pulse>> {
        let caller = Caller::app(app_did, key_id);
        self.authorize(&caller, ops::SUBMIT_PULSE).await?;

        let tagged: Vec<(PulseType, Value)> = operations
            .into_iter()
            .map(|op| (op.kind, tag_payload(op.payload, app_did, key_id)))
            .collect();
        for (kind, payload) in &tagged {
            self.check_schema(kind, payload)?;
        }

        let count = tagged.len();
        let mut pulses = Vec::with_capacity(count);
        for (kind, payload) in tagged {
            pulses.push(self.kernel.ledger.append(kind, payload, None).await?);
        }

        self.kernel
            .ledger
            .append(
                PulseType::API_CALL,
                json!({ "api": ops::SUBMIT_PULSE, "app": app_did, "operationsCount": count }),
                None,
            )
            .await?;

        info!(app = app_did, operations = count, "pulses submitted");
        Ok(pulses)
    }

    /// Check a payload against the declared schema of its type.
    pub fn validate_schema(&self, kind: &PulseType, payload: &Value) -> Result<()> {
        Ok(validate_payload(kind, payload)?)
    }

    /// Listen for admitted pulses.
    pub fn listen<F>(&self, filter: TypeFilter, listener: F) -> Subscription
    where
        F: Fn(&Pulse) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.kernel.dispatcher.subscribe(filter, listener)
    }

    // -------------------------------------------------------------------------
    // Applications and keys
    // -------------------------------------------------------------------------

    /// Register an application owned by the current identity and issue its
    /// first policy key.
    pub async fn register_app(&self, manifest: AppManifest) -> Result<RegisteredApp> {
        let owner = self.kernel.identity.require()?;
        self.check_capability_names(manifest.capabilities.iter().map(String::as_str))?;

        let now = now_millis();
        let did = derive_app_did(&manifest.name, now, &random_nonce());
        let capabilities: BTreeSet<String> = manifest.capabilities.into_iter().collect();

        let payload = json!({
            "appDid": did,
            "name": manifest.name,
            "owner": owner.did,
            "capabilities": capabilities,
        });
        self.check_schema(&PulseType::APP_REGISTER, &payload)?;

        let key = self.kernel.keys.issue(&did, capabilities.iter().cloned(), None).await?;
        let app = RegisteredApp {
            did,
            name: manifest.name,
            description: manifest.description,
            url: manifest.url,
            capabilities,
            owner: owner.did,
            policy_key_id: key.id,
            registered: now,
            active: true,
        };
        self.kernel.apps.put(&app).await?;

        let mut payload = payload;
        payload["policyKeyId"] = Value::String(app.policy_key_id.clone());
        self.kernel
            .ledger
            .append(PulseType::APP_REGISTER, payload, None)
            .await?;

        info!(app = %app.did, name = %app.name, "app registered");
        Ok(app)
    }

    pub async fn registered_apps(&self) -> Result<Vec<RegisteredApp>> {
        self.kernel.apps.all().await
    }

    pub async fn app(&self, did: &str) -> Result<Option<RegisteredApp>> {
        self.kernel.apps.get(did).await
    }

    /// Issue an additional key to `app_did`. Applications need `DELEGATE`.
    pub async fn derive_policy_key(&self, caller: &Caller, app_did: &str, capabilities: &[&str]) -> Result<PolicyKey> {
        self.kernel.identity.require()?;
        self.authorize(caller, ops::DERIVE_POLICY_KEY).await?;
        self.check_capability_names(capabilities.iter().copied())?;

        self.kernel
            .keys
            .issue(app_did, capabilities.iter().copied(), None)
            .await
    }

    // -------------------------------------------------------------------------
    // Content
    // -------------------------------------------------------------------------

    /// Hand `data` to the content store and record a `CONTENT_STORE` pulse.
    pub async fn store_content(&self, caller: &Caller, data: Bytes, content_type: Option<&str>) -> Result<ContentReceipt> {
        self.authorize(caller, ops::STORE_CONTENT).await?;

        let size = data.len();
        let cid = self.kernel.content.put(data).await?;
        let payload = json!({
            "cid": cid,
            "type": content_type.unwrap_or(DEFAULT_CONTENT_TYPE),
            "size": size,
            "_app": caller.app_did(),
        });
        self.check_schema(&PulseType::CONTENT_STORE, &payload)?;

        let pulse = self
            .kernel
            .ledger
            .append(PulseType::CONTENT_STORE, payload, None)
            .await?;
        Ok(ContentReceipt {
            cid,
            hash: pulse.hash,
            size,
        })
    }

    /// Look up stored content by identifier.
    pub async fn retrieve_content(&self, cid: &str) -> Result<StoredContent> {
        let pulse = self
            .kernel
            .ledger
            .find(|p| p.kind == PulseType::CONTENT_STORE && p.payload["cid"] == cid)
            .await?
            .ok_or_else(|| KernelError::not_found(format!("content {}", cid)))?;

        let data = self.kernel.content.get(cid).await?;
        Ok(StoredContent {
            cid: cid.to_owned(),
            metadata: pulse.payload,
            pulse_index: pulse.index,
            data,
        })
    }

    // -------------------------------------------------------------------------
    // Karma and social
    // -------------------------------------------------------------------------

    /// Karma of `did`, or of the current identity.
    pub async fn get_karma(&self, did: Option<&str>) -> Result<KarmaRecord> {
        match did {
            Some(did) => self.kernel.karma.get(did).await,
            None => self.kernel.karma.get(&self.kernel.identity.require()?.did).await,
        }
    }

    pub async fn reward_karma(&self, caller: &Caller, target: &str, amount: i64, reason: &str) -> Result<KarmaRecord> {
        self.authorize(caller, ops::REWARD_KARMA).await?;
        self.kernel.karma.add(target, amount, reason).await
    }

    pub async fn leaderboard(&self, limit: Option<usize>) -> Result<Vec<KarmaRecord>> {
        self.kernel
            .karma
            .leaderboard(limit.unwrap_or(DEFAULT_LEADERBOARD))
            .await
    }

    /// Post as the current identity.
    pub async fn create_post(&self, caller: &Caller, content: &str, reply_to: Option<&str>) -> Result<Post> {
        let author = self.kernel.identity.require()?;
        self.authorize(caller, ops::CREATE_POST).await?;
        self.kernel.social.create_post(&author.did, content, reply_to).await
    }

    pub async fn posts(&self, limit: Option<usize>) -> Result<Vec<Post>> {
        self.kernel.social.posts(limit.unwrap_or(DEFAULT_POSTS)).await
    }

    // -------------------------------------------------------------------------
    // Governance
    // -------------------------------------------------------------------------

    pub async fn submit_proposal(&self, title: &str, description: &str, kind: Option<&str>) -> Result<Pulse> {
        let proposer = self.kernel.identity.require()?;
        self.kernel
            .governance
            .submit_proposal(&proposer.did, title, description, kind)
            .await
    }

    pub async fn vote(&self, proposal: &PulseHash, choice: VoteChoice, weight: Option<u32>) -> Result<Pulse> {
        let voter = self.kernel.identity.require()?;
        self.kernel
            .governance
            .vote(&voter.did, proposal, choice, weight.unwrap_or(1))
            .await
    }

    /// Fork from the current head of the ledger.
    pub async fn create_fork(&self, name: &str, description: &str) -> Result<Fork> {
        let from = self.kernel.ledger.next_index().await;
        self.kernel.governance.create_fork(name, description, from).await
    }

    pub async fn select_fork(&self, fork_id: &str) -> Result<Fork> {
        self.kernel.governance.select_fork(fork_id).await
    }

    pub fn get_did(&self) -> Option<String> {
        self.kernel.identity.current().map(|id| id.did)
    }
}

/// Mark a submitted payload with the app and key it came through. Non-object
/// payloads are wrapped as `{"value": …}` first.
fn tag_payload(payload: Value, app_did: &str, key_id: &str) -> Value {
    let mut map = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_owned(), other);
            map
        }
    };
    map.insert("_app".to_owned(), Value::String(app_did.to_owned()));
    map.insert("_policyKey".to_owned(), Value::String(key_id.to_owned()));
    Value::Object(map)
}
