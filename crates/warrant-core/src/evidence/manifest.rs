//! Execution manifests: the per-store tamper-evident chain.

use serde::{Deserialize, Serialize};
use uuid::Builder;

use super::bundle::EvidenceBundle;
use super::EvidenceError;
use crate::canonical;
use crate::crypto::{Hash, HASH_SIZE, hash_hex, sha256};

/// Immutable manifest linking one execution's evidence into the chain.
///
/// `manifest_hash` is SHA-256 over the canonical encoding of every
/// other field; `previous_manifest_hash` is the prior manifest's hash,
/// all zeros for the first. Generation is deterministic: the manifest
/// id is derived from the chain position rather than drawn at random,
/// so identical inputs regenerate byte-identical manifests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionManifest {
    /// Manifest identifier (UUIDv4-shaped, deterministically derived).
    pub manifest_id: String,
    /// The execution this manifest covers.
    pub execution_id: String,
    /// Ordered digests of the actions performed, one per action.
    #[serde(with = "hash_vec_hex")]
    pub action_hashes: Vec<Hash>,
    /// The sealed bundle's digest.
    #[serde(with = "hash_hex")]
    pub bundle_hash: Hash,
    /// Link to the previous manifest; zeros for genesis.
    #[serde(with = "hash_hex")]
    pub previous_manifest_hash: Hash,
    /// Digest over the canonical encoding of the fields above.
    #[serde(with = "hash_hex")]
    pub manifest_hash: Hash,
}

/// Serde adapter for `Vec<Hash>` as lowercase hex strings.
mod hash_vec_hex {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde::ser::SerializeSeq;

    use crate::crypto::{Hash, parse_hash_hex};

    pub fn serialize<S: Serializer>(hashes: &[Hash], ser: S) -> Result<S::Ok, S::Error> {
        let mut seq = ser.serialize_seq(Some(hashes.len()))?;
        for h in hashes {
            seq.serialize_element(&hex::encode(h))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<Hash>, D::Error> {
        let raw: Vec<String> = Vec::deserialize(de)?;
        raw.iter()
            .map(|s| parse_hash_hex(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

impl ExecutionManifest {
    /// Generates the manifest for `bundle` at the given chain position.
    ///
    /// Does not mutate the bundle; two calls with identical inputs
    /// return identical manifests.
    ///
    /// # Errors
    ///
    /// Propagates canonical-encoding failures.
    pub fn generate(
        bundle: &EvidenceBundle,
        action_hashes: Vec<Hash>,
        previous_manifest_hash: Hash,
    ) -> Result<Self, EvidenceError> {
        let manifest_id = derive_manifest_id(
            &bundle.execution_id,
            &bundle.bundle_hash,
            &previous_manifest_hash,
        );

        let mut manifest = Self {
            manifest_id,
            execution_id: bundle.execution_id.clone(),
            action_hashes,
            bundle_hash: bundle.bundle_hash,
            previous_manifest_hash,
            manifest_hash: [0u8; HASH_SIZE],
        };
        manifest.manifest_hash = manifest.compute_hash()?;
        Ok(manifest)
    }

    /// Recomputes this manifest's hash from its canonical preimage.
    ///
    /// # Errors
    ///
    /// Propagates canonical-encoding failures.
    pub fn compute_hash(&self) -> Result<Hash, EvidenceError> {
        Ok(canonical::digest_without_field(self, "manifest_hash")?)
    }
}

/// Derives a UUIDv4-shaped manifest id from the chain position.
///
/// The first 16 bytes of SHA-256 over (execution id, bundle hash,
/// previous link) go through [`uuid::Builder::from_random_bytes`], which
/// stamps the version-4 and RFC-4122 variant bits — so the id passes the
/// identifier validator while staying deterministic for identical
/// inputs.
fn derive_manifest_id(execution_id: &str, bundle_hash: &Hash, previous: &Hash) -> String {
    let mut preimage = Vec::with_capacity(execution_id.len() + HASH_SIZE * 2);
    preimage.extend_from_slice(execution_id.as_bytes());
    preimage.extend_from_slice(bundle_hash);
    preimage.extend_from_slice(previous);
    let digest = sha256(&preimage);
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Builder::from_random_bytes(bytes).into_uuid().to_string()
}
