//! # Xhe Core
//!
//! Pure primitives for the Xhe pulse ledger: pulses, hashing, canonical
//! encoding, the capability registry and payload schemas.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Pulse`] - The immutable ledger record
//! - [`PulseHash`] - Blake3 hash over the canonical encoding of a pulse
//! - [`PulseType`] - Type tag of a pulse
//! - [`CapabilityRegistry`] - Named capabilities and the operations they cover
//!
//! ## Canonicalization
//!
//! Pulse hashes are computed over deterministic CBOR. See [`canonical`].

pub mod canonical;
pub mod capability;
pub mod crypto;
pub mod error;
pub mod mnemonic;
pub mod pulse;
pub mod time;
pub mod types;
pub mod validation;

pub use canonical::canonical_pulse_bytes;
pub use capability::{CapabilityRegistry, CapabilitySpec};
pub use crypto::{deterministic_id, hash_hex, random_nonce, signature_surrogate, Blake3Hash};
pub use error::{CoreError, ValidationError};
pub use pulse::{compute_hash, Pulse, PulseType};
pub use time::now_millis;
pub use types::{format_pulse_index, PulseHash};
pub use validation::{schema_for, validate_payload, FieldKind, PayloadSchema};
