//! The manifest store: chain linkage, verification, persistence.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::bundle::EvidenceBundle;
use super::manifest::ExecutionManifest;
use super::{EvidenceError, ManifestChainVerdict};
use crate::crypto::{Hash, ZERO_HASH, hashes_equal};
use crate::validate::{IdKind, validate_uuid_v4};

/// Append-only store of execution manifests.
///
/// Manifests are keyed by execution id and linked in generation order;
/// the linkage mutex serializes chain growth. When an artifact root is
/// configured, each manifest is additionally persisted to
/// `{root}/manifests/{execution_id}.json` via the atomic
/// temp-write/fsync/rename protocol, so a crash never leaves a partial
/// manifest on disk.
#[derive(Debug)]
pub struct ManifestStore {
    chain: Mutex<Vec<ExecutionManifest>>,
    persist_root: Option<PathBuf>,
}

impl ManifestStore {
    /// Creates an in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chain: Mutex::new(Vec::new()),
            persist_root: None,
        }
    }

    /// Creates a store that persists manifests under
    /// `{artifact_root}/manifests/`.
    #[must_use]
    pub fn with_artifact_root(artifact_root: &Path) -> Self {
        Self {
            chain: Mutex::new(Vec::new()),
            persist_root: Some(artifact_root.join("manifests")),
        }
    }

    /// Reopens a persisted store, reloading the chain in generation
    /// order from `{artifact_root}/manifests/chain.jsonl`.
    ///
    /// The reloaded chain is *not* verified here — callers run
    /// [`Self::verify_chain`] so that tampering is reported with an
    /// index instead of refusing to load at all.
    ///
    /// # Errors
    ///
    /// I/O failures and unparseable chain lines.
    pub fn resume(artifact_root: &Path) -> Result<Self, EvidenceError> {
        let root = artifact_root.join("manifests");
        let chain_path = root.join("chain.jsonl");
        let mut chain = Vec::new();
        if chain_path.is_file() {
            for line in fs::read_to_string(&chain_path)?.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                chain.push(serde_json::from_str::<ExecutionManifest>(line)?);
            }
        }
        Ok(Self {
            chain: Mutex::new(chain),
            persist_root: Some(root),
        })
    }

    /// Generates, links, and (when configured) persists the manifest
    /// for `bundle`.
    ///
    /// # Errors
    ///
    /// Propagates generation and persistence failures; on a persistence
    /// failure the manifest is not linked (manifest generation is
    /// mandatory, not best-effort).
    pub fn generate(
        &self,
        bundle: &EvidenceBundle,
        action_hashes: Vec<Hash>,
    ) -> Result<ExecutionManifest, EvidenceError> {
        let mut chain = self.chain.lock().expect("manifest store lock poisoned");
        let previous = chain.last().map_or(ZERO_HASH, |m| m.manifest_hash);
        let manifest = ExecutionManifest::generate(bundle, action_hashes, previous)?;

        if let Some(ref root) = self.persist_root {
            persist_manifest(root, &manifest)?;
        }

        chain.push(manifest.clone());
        Ok(manifest)
    }

    /// Returns a copy of the chain in generation order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ExecutionManifest> {
        self.chain
            .lock()
            .expect("manifest store lock poisoned")
            .clone()
    }

    /// Returns the manifest for one execution, if present.
    #[must_use]
    pub fn get(&self, execution_id: &str) -> Option<ExecutionManifest> {
        self.chain
            .lock()
            .expect("manifest store lock poisoned")
            .iter()
            .find(|m| m.execution_id == execution_id)
            .cloned()
    }

    /// Number of manifests in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chain.lock().expect("manifest store lock poisoned").len()
    }

    /// True when the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verifies hashes and links across `[start, end]` (inclusive
    /// indices; `end` defaults to the chain tip).
    ///
    /// A single flipped byte anywhere in the range is detectable; the
    /// verdict carries the first bad index relative to the chain.
    #[must_use]
    pub fn verify_chain(&self, start: usize, end: Option<usize>) -> ManifestChainVerdict {
        let chain = self.chain.lock().expect("manifest store lock poisoned");
        verify_manifests(&chain, start, end)
    }

    /// Reloads one persisted manifest and checks it against the
    /// in-memory chain entry.
    ///
    /// # Errors
    ///
    /// I/O and parse failures, plus [`EvidenceError::HashChainMismatch`]
    /// when the reloaded manifest's hash does not verify.
    pub fn reload_persisted(&self, execution_id: &str) -> Result<ExecutionManifest, EvidenceError> {
        validate_uuid_v4(execution_id, IdKind::Execution).map_err(EvidenceError::Path)?;
        let root = self.persist_root.as_ref().ok_or_else(|| {
            EvidenceError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "store has no artifact root",
            ))
        })?;
        let path = root.join(format!("{execution_id}.json"));
        let raw = fs::read_to_string(path)?;
        let manifest: ExecutionManifest = serde_json::from_str(&raw)?;
        let recomputed = manifest.compute_hash()?;
        if !hashes_equal(&recomputed, &manifest.manifest_hash) {
            return Err(EvidenceError::HashChainMismatch {
                index: 0,
                detail: "persisted manifest hash does not verify".to_string(),
            });
        }
        Ok(manifest)
    }
}

impl Default for ManifestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Verifies a manifest slice as a chain segment.
fn verify_manifests(
    chain: &[ExecutionManifest],
    start: usize,
    end: Option<usize>,
) -> ManifestChainVerdict {
    let end = end.unwrap_or_else(|| chain.len().saturating_sub(1));
    if chain.is_empty() || start > end || end >= chain.len() {
        return ManifestChainVerdict {
            valid: true,
            first_bad_index: None,
            reason: None,
        };
    }

    for index in start..=end {
        let manifest = &chain[index];

        let expected_previous = if index == 0 {
            ZERO_HASH
        } else {
            chain[index - 1].manifest_hash
        };
        if !hashes_equal(&manifest.previous_manifest_hash, &expected_previous) {
            return ManifestChainVerdict {
                valid: false,
                first_bad_index: Some(index),
                reason: Some("HashChainMismatch: broken link to previous manifest".to_string()),
            };
        }

        match manifest.compute_hash() {
            Ok(recomputed) if hashes_equal(&recomputed, &manifest.manifest_hash) => {},
            Ok(_) => {
                return ManifestChainVerdict {
                    valid: false,
                    first_bad_index: Some(index),
                    reason: Some("HashChainMismatch: manifest hash does not recompute".to_string()),
                };
            },
            Err(e) => {
                return ManifestChainVerdict {
                    valid: false,
                    first_bad_index: Some(index),
                    reason: Some(format!("HashChainMismatch: {e}")),
                };
            },
        }
    }

    ManifestChainVerdict {
        valid: true,
        first_bad_index: None,
        reason: None,
    }
}

/// Atomic manifest write: temp file in the target directory, fsync,
/// rename, fsync the directory. The chain file gets one appended,
/// fsynced line per manifest so reload preserves generation order.
fn persist_manifest(root: &Path, manifest: &ExecutionManifest) -> Result<(), EvidenceError> {
    fs::create_dir_all(root)?;
    let final_path = root.join(format!("{}.json", manifest.execution_id));
    let json = crate::canonical::to_canonical_json(manifest)?;

    let mut tmp = tempfile::NamedTempFile::new_in(root)?;
    tmp.write_all(json.as_bytes())?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(&final_path).map_err(|e| e.error)?;

    // Directory fsync commits the rename.
    let dir = fs::File::open(root)?;
    dir.sync_all()?;

    let mut chain_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(root.join("chain.jsonl"))?;
    writeln!(chain_file, "{json}")?;
    chain_file.sync_all()?;
    Ok(())
}
