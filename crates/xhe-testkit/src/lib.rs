//! # Xhe Testkit
//!
//! Testing utilities for the Xhe ledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a ready-made node with an identity and helpers for keys
//! - **Generators**: proptest strategies for payloads, pulse types and capability sets
//! - **Failing store**: a [`Store`](xhe_store::Store) wrapper that fails pulse
//!   writes on demand
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use xhe_testkit::fixtures::TestNode;
//!
//! async fn example() {
//!     let node = TestNode::new().await;
//!     let key = node.app_key("did:x:app1", &["WRITE"]).await;
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use xhe_core::{Pulse, PulseType};
//! use xhe_testkit::generators::{json_payload, pulse_type};
//!
//! proptest! {
//!     #[test]
//!     fn hash_ignores_timestamp(kind in pulse_type(), payload in json_payload()) {
//!         let a = Pulse::new(0, kind.clone(), payload.clone(), None, 1);
//!         let b = Pulse::new(0, kind, payload, None, 2);
//!         prop_assert_eq!(a.hash, b.hash);
//!     }
//! }
//! ```

pub mod failing;
pub mod fixtures;
pub mod generators;

pub use failing::FailingStore;
pub use fixtures::{memory_kernel, TestNode, TEST_PHRASE};
