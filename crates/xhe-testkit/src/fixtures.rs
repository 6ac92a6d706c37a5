//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. These panic on failure.

use xhe_kernel::{Gateway, Identity, Kernel, KernelConfig};
use xhe_perms::PolicyKey;
use xhe_store::MemoryStore;

/// Fixed recovery phrase for deterministic identities.
pub const TEST_PHRASE: &str =
    "abandon ability able about above absent absorb abstract absurd abuse access accident";

/// A kernel over a fresh memory store.
pub async fn memory_kernel(config: KernelConfig) -> Kernel<MemoryStore> {
    Kernel::open(MemoryStore::new(), config)
        .await
        .expect("open memory kernel")
}

/// A kernel with a current identity derived from [`TEST_PHRASE`].
pub struct TestNode {
    pub kernel: Kernel<MemoryStore>,
    pub identity: Identity,
}

impl TestNode {
    pub async fn new() -> Self {
        Self::with_config(KernelConfig::default()).await
    }

    pub async fn with_config(config: KernelConfig) -> Self {
        let kernel = memory_kernel(config).await;
        let identity = kernel
            .identity()
            .create(Some(TEST_PHRASE))
            .await
            .expect("create identity");
        Self { kernel, identity }
    }

    pub fn gateway(&self) -> Gateway<'_, MemoryStore> {
        self.kernel.gateway()
    }

    /// Issue a non-expiring key to `holder`.
    pub async fn app_key(&self, holder: &str, capabilities: &[&str]) -> PolicyKey {
        self.kernel
            .keys()
            .issue(holder, capabilities.iter().copied(), None)
            .await
            .expect("issue policy key")
    }

    /// Issue a key that expired at `expiry` (Unix ms).
    pub async fn expiring_key(&self, holder: &str, capabilities: &[&str], expiry: i64) -> PolicyKey {
        self.kernel
            .keys()
            .issue(holder, capabilities.iter().copied(), Some(expiry))
            .await
            .expect("issue policy key")
    }

    /// Number of pulses on the ledger.
    pub async fn pulse_count(&self) -> u64 {
        self.kernel.ledger().next_index().await
    }
}
