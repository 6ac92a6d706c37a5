//! # Xhe Permissions
//!
//! Policy keys and the rule that decides whether a key may be used.
//!
//! ## Overview
//!
//! A policy key is a bearer token: whoever presents its id, on behalf of its
//! holder DID, may exercise the capabilities it carries. Keys are issued and
//! revoked through the ledger, and every issue and revoke is recorded as a
//! pulse carrying an [`IssuePayload`] or [`RevokePayload`].
//!
//! This crate holds the pure parts: the key record and [`evaluate`]. Loading
//! keys from the store and appending the audit pulses is done by the kernel.
//!
//! ## Rule
//!
//! A key passes when it exists, is not revoked, belongs to the presenting
//! holder, has not expired, and grants every required capability (or `*`).
//! Each failure maps to a distinct [`Denial`].

pub mod check;
pub mod error;
pub mod key;

pub use check::{evaluate, Denial, Verdict};
pub use error::{PermsError, Result};
pub use key::{derive_key_id, IssuePayload, PolicyKey, RevokePayload};
