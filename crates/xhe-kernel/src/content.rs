//! Content addressing collaborator.
//!
//! The kernel records what was stored (a `CONTENT_STORE` pulse); where the
//! bytes live is up to the [`ContentStore`] implementation.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use xhe_core::hash_hex;

#[derive(Debug, Error)]
pub enum ContentError {
    /// The backing network or service could not be reached.
    #[error("content store unavailable: {0}")]
    Unavailable(String),
}

/// Content identifier for `data`: `Qm` followed by 44 hex chars of its hash.
pub fn content_id(data: &[u8]) -> String {
    let hash = hash_hex(data);
    format!("Qm{}", &hash[..44])
}

/// Put/get of bytes keyed by content identifier.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `data` and return its content identifier.
    async fn put(&self, data: Bytes) -> Result<String, ContentError>;

    /// Fetch bytes by content identifier, if this store has them.
    async fn get(&self, cid: &str) -> Result<Option<Bytes>, ContentError>;
}

/// Process-local content store.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, data: Bytes) -> Result<String, ContentError> {
        let cid = content_id(&data);
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cid.clone(), data);
        Ok(cid)
    }

    async fn get(&self, cid: &str) -> Result<Option<Bytes>, ContentError> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(cid)
            .cloned())
    }
}
