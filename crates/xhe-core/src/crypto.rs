//! Hashing primitives for the Xhe ledger.
//!
//! Everything content-derived in the system (pulse hashes, DIDs, key ids,
//! post ids) goes through Blake3. There is no asymmetric cryptography here:
//! identity "public keys" are hash-derived identifiers and signatures are a
//! hash surrogate, see [`signature_surrogate`].

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte Blake3 hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    /// Compute the Blake3 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The zero hash (sentinel value).
    pub const ZERO: Self = Self([0u8; 32]);
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3({})", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Blake3Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Blake3Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Hash arbitrary data and return the digest as lowercase hex.
pub fn hash_hex(data: impl AsRef<[u8]>) -> String {
    Blake3Hash::hash(data.as_ref()).to_hex()
}

/// Derive a deterministic identifier from a seed and an index.
///
/// `H("{seed}:{index}")`. Used for role keys of an identity.
pub fn deterministic_id(seed: &str, index: u32) -> String {
    hash_hex(format!("{}:{}", seed, index))
}

/// Fill `N` bytes from the thread-local CSPRNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// A 128-bit random nonce as hex, for ids that must differ across calls
/// landing in the same millisecond.
pub fn random_nonce() -> String {
    hex::encode(random_bytes::<16>())
}

/// Hash-based signature surrogate: `H("{message}:{signing_key}")`.
///
/// This is NOT a public-key signature. Anyone who knows the signer's signing
/// identifier (which is published in the `IDENTITY_CREATE` pulse) can produce
/// a matching value. It only authenticates against parties who do not know
/// the derivation path.
pub fn signature_surrogate(message: &str, signing_key: &str) -> String {
    hash_hex(format!("{}:{}", message, signing_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_hash() {
        let data = b"test data";
        let h1 = Blake3Hash::hash(data);
        let h2 = Blake3Hash::hash(data);
        assert_eq!(h1, h2);

        let h3 = Blake3Hash::hash(b"different data");
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_hash_hex_is_256_bit() {
        let hex = hash_hex("hello");
        assert_eq!(hex.len(), 64);
        assert_eq!(hex, Blake3Hash::hash(b"hello").to_hex());
    }

    #[test]
    fn test_deterministic_id() {
        let seed = hash_hex("seed");
        assert_eq!(deterministic_id(&seed, 0), deterministic_id(&seed, 0));
        assert_ne!(deterministic_id(&seed, 0), deterministic_id(&seed, 1));
        assert_eq!(deterministic_id(&seed, 1), hash_hex(format!("{}:1", seed)));
    }

    #[test]
    fn test_random_nonce_unique() {
        assert_ne!(random_nonce(), random_nonce());
        assert_eq!(random_nonce().len(), 32);
    }

    #[test]
    fn test_signature_surrogate() {
        let sig = signature_surrogate("msg", "key");
        assert_eq!(sig, hash_hex("msg:key"));
        assert_ne!(sig, signature_surrogate("msg", "other"));
    }
}
