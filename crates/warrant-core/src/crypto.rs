//! Hashing primitives shared by every subsystem.
//!
//! All digests in the governance core are SHA-256 over canonical bytes
//! (see [`crate::canonical`]). Hashes are fixed 32-byte arrays serialized
//! as lowercase hex; the all-zero hash is the genesis link for every
//! chain (audit entries and execution manifests alike).

use serde::{Deserialize, Deserializer, Serializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Size of a SHA-256 digest in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte SHA-256 digest.
pub type Hash = [u8; HASH_SIZE];

/// The genesis link value: 32 zero bytes.
pub const ZERO_HASH: Hash = [0u8; HASH_SIZE];

/// Errors from parsing hex-encoded digests.
#[derive(Debug, Error)]
pub enum HashParseError {
    /// The input length is not 64 hex characters.
    #[error("expected 64 hex chars, got {len}")]
    BadLength {
        /// Observed input length.
        len: usize,
    },

    /// The input contains non-hex or uppercase characters.
    #[error("invalid hex digest: {reason}")]
    BadEncoding {
        /// Description of the encoding fault.
        reason: String,
    },
}

/// Computes the SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256(bytes: &[u8]) -> Hash {
    let digest = Sha256::digest(bytes);
    let mut out = ZERO_HASH;
    out.copy_from_slice(&digest);
    out
}

/// Computes the SHA-256 digest of `bytes` as lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha256(bytes))
}

/// Compares two digests in constant time.
///
/// Digest comparison on authorization paths must not leak prefix-match
/// timing, so this goes through [`subtle::ConstantTimeEq`] rather than
/// `==`.
#[must_use]
pub fn hashes_equal(a: &Hash, b: &Hash) -> bool {
    a.ct_eq(b).into()
}

/// Parses a 64-character lowercase hex string into a [`Hash`].
///
/// # Errors
///
/// Returns [`HashParseError`] on wrong length, uppercase input, or
/// non-hex characters. Uppercase is rejected because the canonical
/// serialization of every digest in this crate is lowercase; accepting
/// both would make chain verification encoding-dependent.
pub fn parse_hash_hex(s: &str) -> Result<Hash, HashParseError> {
    if s.len() != HASH_SIZE * 2 {
        return Err(HashParseError::BadLength { len: s.len() });
    }
    if s.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(HashParseError::BadEncoding {
            reason: "uppercase hex is not canonical".to_string(),
        });
    }
    let bytes = hex::decode(s).map_err(|e| HashParseError::BadEncoding {
        reason: e.to_string(),
    })?;
    let mut out = ZERO_HASH;
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Serde adapter serializing a [`Hash`] as lowercase hex.
pub mod hash_hex {
    use super::{Deserialize, Deserializer, Hash, Serializer, parse_hash_hex};

    /// Serializes the digest as a 64-char lowercase hex string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(hash: &Hash, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&hex::encode(hash))
    }

    /// Deserializes a 64-char lowercase hex string into a digest.
    ///
    /// # Errors
    ///
    /// Rejects anything that is not canonical lowercase hex of the right
    /// length.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(de)?;
        parse_hash_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<Hash>`: lowercase hex or explicit `null`.
pub mod opt_hash_hex {
    use super::{Deserialize, Deserializer, Hash, Serializer, parse_hash_hex};

    /// Serializes `Some(hash)` as hex and `None` as `null`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(hash: &Option<Hash>, ser: S) -> Result<S::Ok, S::Error> {
        match hash {
            Some(h) => ser.serialize_some(&hex::encode(h)),
            None => ser.serialize_none(),
        }
    }

    /// Deserializes hex-or-null into `Option<Hash>`.
    ///
    /// # Errors
    ///
    /// Rejects non-canonical hex.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Hash>, D::Error> {
        let raw: Option<String> = Option::deserialize(de)?;
        raw.map(|s| parse_hash_hex(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
