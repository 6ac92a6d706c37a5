//! # Xhe Kernel
//!
//! A single-node, append-only ledger of hash-linked pulses with a
//! capability-scoped gateway in front of it.
//!
//! ## Overview
//!
//! Every state change is a pulse appended to the [`Ledger`]:
//!
//! - **Ledger**: gapless indices, Blake3 hashes over canonical CBOR, replay
//! - **Policy keys**: bearer tokens scoped to capabilities, revocable, expiring
//! - **Identity**: one current DID derived from a recovery phrase
//! - **Gateway**: the application surface; checks the presented key
//! - **Dispatcher**: synchronous in-process fan-out of admitted pulses
//!
//! Karma, posts, forks and registered apps are projections kept next to the
//! pulses that record them.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use serde_json::json;
//! use xhe_kernel::{Kernel, KernelConfig, Operation};
//! use xhe_store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("xhe.db").unwrap();
//!     let kernel = Kernel::open(store, KernelConfig::default()).await.unwrap();
//!
//!     let key = kernel.keys().issue("did:xhe:app:chat", ["WRITE"], None).await.unwrap();
//!     let pulses = kernel
//!         .gateway()
//!         .submit_pulse(
//!             "did:xhe:app:chat",
//!             &key.id,
//!             vec![Operation::new("CHAT_MESSAGE", json!({ "text": "hi" }))],
//!         )
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `xhe_kernel::core` - pulses, hashing, capabilities, schemas
//! - `xhe_kernel::store` - storage trait, SQLite and memory stores, snapshots
//! - `xhe_kernel::perms` - policy key rules

pub mod advisory;
pub mod apps;
pub mod config;
pub mod content;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod governance;
pub mod identity;
pub mod karma;
pub mod kernel;
pub mod ledger;
pub mod policy;
pub mod social;

pub use xhe_core as core;
pub use xhe_perms as perms;
pub use xhe_store as store;

pub use advisory::{Advice, AdvisoryService, OfflineAdvisor};
pub use apps::{AppManifest, AppRegistry, RegisteredApp};
pub use config::KernelConfig;
pub use content::{content_id, ContentError, ContentStore, MemoryContentStore};
pub use dispatch::{EventDispatcher, ListenerError, Subscription, TypeFilter};
pub use error::{KernelError, Result};
pub use gateway::{Caller, ContentReceipt, Gateway, Operation, StoredContent};
pub use governance::{Fork, ForkGovernance, VoteChoice};
pub use identity::{Identity, IdentityService, PublicKeys};
pub use karma::{KarmaEvent, KarmaRecord, KarmaService};
pub use kernel::Kernel;
pub use ledger::{Ledger, ReplayEntry};
pub use policy::PolicyKeyStore;
pub use social::{Post, SocialService};

pub use xhe_core::{Pulse, PulseHash, PulseType};
pub use xhe_perms::{Denial, PolicyKey, Verdict};
