//! A store wrapper that fails writes on demand.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use xhe_store::{names, Result, Store, StoreError};

/// Delegates to `inner`, except that the next `n` puts into the pulse
/// collection fail with an I/O error once armed with [`FailingStore::fail_pulse_puts`].
pub struct FailingStore<S> {
    inner: S,
    pending_failures: AtomicUsize,
}

impl<S: Store> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            pending_failures: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` pulse writes.
    pub fn fail_pulse_puts(&self, n: usize) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn take_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl<S: Store> Store for FailingStore<S> {
    async fn put(&self, collection: &str, item: Value) -> Result<()> {
        if collection == names::PULSARS && self.take_failure() {
            return Err(StoreError::Io(io::Error::new(io::ErrorKind::Other, "injected write failure")));
        }
        self.inner.put(collection, item).await
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        self.inner.get(collection, key).await
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<Value>> {
        self.inner.get_all(collection).await
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<bool> {
        self.inner.delete(collection, key).await
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        self.inner.count(collection).await
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        self.inner.clear(collection).await
    }

    async fn collections(&self) -> Result<Vec<String>> {
        self.inner.collections().await
    }
}
