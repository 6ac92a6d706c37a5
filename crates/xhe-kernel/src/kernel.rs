//! The Kernel: composition root for the ledger and its services.
//!
//! There are no process-wide singletons. `Kernel::open` builds every service
//! over one store and one ledger, and callers reach them through accessors or
//! the [`Gateway`].

use std::sync::Arc;

use tracing::{debug, info};

use xhe_core::{CapabilityRegistry, Pulse};
use xhe_store::{snapshot, ImportReport, Snapshot, Store};

use crate::advisory::{AdvisoryService, OfflineAdvisor};
use crate::apps::AppRegistry;
use crate::config::KernelConfig;
use crate::content::{ContentStore, MemoryContentStore};
use crate::dispatch::{EventDispatcher, ListenerError, Subscription, TypeFilter};
use crate::error::Result;
use crate::gateway::Gateway;
use crate::governance::ForkGovernance;
use crate::identity::IdentityService;
use crate::karma::KarmaService;
use crate::ledger::{Ledger, ReplayEntry};
use crate::policy::PolicyKeyStore;
use crate::social::SocialService;

/// The main Kernel struct.
pub struct Kernel<S: Store> {
    pub(crate) config: KernelConfig,
    pub(crate) store: Arc<S>,
    pub(crate) capabilities: CapabilityRegistry,
    pub(crate) dispatcher: Arc<EventDispatcher>,
    pub(crate) ledger: Arc<Ledger<S>>,
    pub(crate) keys: PolicyKeyStore<S>,
    pub(crate) identity: IdentityService<S>,
    pub(crate) apps: AppRegistry<S>,
    pub(crate) karma: KarmaService<S>,
    pub(crate) social: SocialService<S>,
    pub(crate) governance: ForkGovernance<S>,
    pub(crate) content: Arc<dyn ContentStore>,
    pub(crate) advisor: Arc<dyn AdvisoryService>,
}

impl<S: Store> Kernel<S> {
    /// Open a kernel over `store` with an in-memory content store and an
    /// offline advisor.
    pub async fn open(store: S, config: KernelConfig) -> Result<Self> {
        let advisor = Arc::new(OfflineAdvisor::new(config.advisory_endpoint.clone()));
        debug!(endpoint = advisor.endpoint(), "no model client, advisory service offline");
        Self::open_with(Arc::new(store), config, Arc::new(MemoryContentStore::new()), advisor).await
    }

    /// Open a kernel with explicit collaborators.
    pub async fn open_with(
        store: Arc<S>,
        config: KernelConfig,
        content: Arc<dyn ContentStore>,
        advisor: Arc<dyn AdvisoryService>,
    ) -> Result<Self> {
        let dispatcher = Arc::new(EventDispatcher::new());
        let ledger = Arc::new(Ledger::open(store.clone(), dispatcher.clone()).await?);
        let identity = IdentityService::open(store.clone(), ledger.clone(), config.mnemonic_words).await?;

        let kernel = Self {
            capabilities: CapabilityRegistry::standard(),
            keys: PolicyKeyStore::new(store.clone(), ledger.clone()),
            apps: AppRegistry::new(store.clone()),
            karma: KarmaService::new(store.clone(), ledger.clone()),
            social: SocialService::new(store.clone(), ledger.clone()),
            governance: ForkGovernance::new(store.clone(), ledger.clone()),
            identity,
            ledger,
            dispatcher,
            store,
            content,
            advisor,
            config,
        };

        let pulses = kernel.ledger.next_index().await;
        let did = kernel.identity.current().map(|id| id.did);
        info!(pulses, identity = did.as_deref().unwrap_or("none"), "kernel opened");
        Ok(kernel)
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn ledger(&self) -> &Arc<Ledger<S>> {
        &self.ledger
    }

    pub fn keys(&self) -> &PolicyKeyStore<S> {
        &self.keys
    }

    pub fn identity(&self) -> &IdentityService<S> {
        &self.identity
    }

    pub fn apps(&self) -> &AppRegistry<S> {
        &self.apps
    }

    pub fn karma(&self) -> &KarmaService<S> {
        &self.karma
    }

    pub fn social(&self) -> &SocialService<S> {
        &self.social
    }

    pub fn governance(&self) -> &ForkGovernance<S> {
        &self.governance
    }

    pub fn content(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }

    pub fn advisor(&self) -> &Arc<dyn AdvisoryService> {
        &self.advisor
    }

    /// The application-facing surface.
    pub fn gateway(&self) -> Gateway<'_, S> {
        Gateway::new(self)
    }

    // =========================================================================
    // Ledger shortcuts
    // =========================================================================

    /// The last `n` pulses (default from config), ascending by index.
    pub async fn latest(&self, n: Option<usize>) -> Result<Vec<Pulse>> {
        self.ledger
            .get_latest(n.unwrap_or(self.config.default_latest))
            .await
    }

    pub async fn replay(&self, from_index: u64) -> Result<Vec<ReplayEntry>> {
        self.ledger.replay(from_index).await
    }

    pub fn subscribe<F>(&self, filter: TypeFilter, listener: F) -> Subscription
    where
        F: Fn(&Pulse) -> std::result::Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(filter, listener)
    }

    // =========================================================================
    // Archive
    // =========================================================================

    /// Every collection of the underlying store.
    pub async fn export_snapshot(&self) -> Result<Snapshot> {
        Ok(snapshot::export(self.store.as_ref()).await?)
    }

    /// Import a snapshot, then re-derive the next index and current identity.
    pub async fn import_snapshot(&self, snapshot: &Snapshot) -> Result<ImportReport> {
        let report = snapshot::import(self.store.as_ref(), snapshot).await?;
        let next = self.ledger.resync().await?;
        self.identity.reload().await?;

        info!(imported = report.total(), next_index = next, "snapshot imported");
        Ok(report)
    }
}
