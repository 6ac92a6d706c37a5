//! The node's identity.
//!
//! An identity is derived entirely from its recovery phrase:
//! `masterSeed = H(mnemonic)`, `did = "did:xhe:" + masterSeed[..32]`, and role
//! key `i` is `H("{masterSeed}:{i}")`. There is exactly one current identity;
//! recovering replaces it.
//!
//! The "public keys" are hash-derived identifiers, and [`IdentityService::verify`]
//! checks a hash surrogate rather than a real signature. Anyone who knows an
//! identity's signing identifier can produce a passing value.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use xhe_core::{deterministic_id, hash_hex, mnemonic, now_millis, signature_surrogate, PulseType};
use xhe_store::{names, Store, StoreExt};

use crate::error::{KernelError, Result};
use crate::ledger::Ledger;

/// Prefix of every identity DID.
pub const DID_PREFIX: &str = "did:xhe:";

const SIGNING_ROLE: u32 = 0;
const ENCRYPTION_ROLE: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeys {
    pub signing: String,
    pub encryption: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub did: String,
    pub mnemonic: String,
    pub master_seed: String,
    pub created: i64,
    pub public_keys: PublicKeys,
}

impl Identity {
    /// Derive an identity from a recovery phrase.
    pub fn derive(phrase: &str, created: i64) -> Self {
        let mnemonic = mnemonic::normalize(phrase);
        let master_seed = hash_hex(&mnemonic);
        let did = format!("{}{}", DID_PREFIX, &master_seed[..32]);
        let public_keys = PublicKeys {
            signing: deterministic_id(&master_seed, SIGNING_ROLE),
            encryption: deterministic_id(&master_seed, ENCRYPTION_ROLE),
        };
        Self {
            did,
            mnemonic,
            master_seed,
            created,
            public_keys,
        }
    }

    /// Signature surrogate of `message` under this identity.
    pub fn sign(&self, message: &str) -> String {
        signature_surrogate(message, &self.public_keys.signing)
    }
}

pub struct IdentityService<S: Store> {
    store: Arc<S>,
    ledger: Arc<Ledger<S>>,
    current: RwLock<Option<Identity>>,
    mnemonic_words: usize,
}

impl<S: Store> IdentityService<S> {
    /// Load the current identity, if any, from the store.
    pub async fn open(store: Arc<S>, ledger: Arc<Ledger<S>>, mnemonic_words: usize) -> Result<Self> {
        let service = Self {
            store,
            ledger,
            current: RwLock::new(None),
            mnemonic_words,
        };
        service.reload().await?;
        Ok(service)
    }

    /// Re-read the current identity from the store.
    pub async fn reload(&self) -> Result<Option<Identity>> {
        let stored: Vec<Identity> = self.store.get_all_records(names::IDENTITY).await?;
        let first = stored.into_iter().next();
        self.set_current(first.clone());
        Ok(first)
    }

    /// Create an identity from `phrase`, or from a fresh phrase when `None`,
    /// and make it current.
    pub async fn create(&self, phrase: Option<&str>) -> Result<Identity> {
        let phrase = match phrase {
            Some(p) => p.to_owned(),
            None => mnemonic::generate(self.mnemonic_words),
        };
        let identity = Identity::derive(&phrase, now_millis());

        self.store.put_record(names::IDENTITY, &identity).await?;
        self.ledger
            .append(
                PulseType::IDENTITY_CREATE,
                json!({ "did": identity.did, "publicKeys": identity.public_keys }),
                None,
            )
            .await?;

        info!(did = %identity.did, "identity created");
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    /// Replace every stored identity with the one derived from `phrase`.
    pub async fn recover(&self, phrase: &str) -> Result<Identity> {
        self.store.clear(names::IDENTITY).await?;
        self.set_current(None);
        self.create(Some(phrase)).await
    }

    pub fn current(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current identity, or [`KernelError::IdentityRequired`].
    pub fn require(&self) -> Result<Identity> {
        self.current().ok_or(KernelError::IdentityRequired)
    }

    /// Check a signature surrogate against the stored identity for `did`.
    /// Unknown DIDs verify as false.
    pub async fn verify(&self, did: &str, signature: &str, message: &str) -> Result<bool> {
        let identity: Option<Identity> = self.store.get_record(names::IDENTITY, did).await?;
        Ok(identity.is_some_and(|id| id.sign(message) == signature))
    }

    /// Sign `message` with the current identity.
    pub fn sign(&self, message: &str) -> Result<String> {
        Ok(self.require()?.sign(message))
    }

    fn set_current(&self, identity: Option<Identity>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = identity;
    }
}
