//! Evidence bundle construction and sealing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::{ArtifactKind, EvidenceArtifact};
use super::EvidenceError;
use crate::canonical::{self, ts_millis};
use crate::crypto::{Hash, hash_hex, sha256};
use crate::redact::SecretRedactor;
use crate::validate::{IdKind, validate_uuid_v4};

/// An immutable set of artifacts captured during one execution.
///
/// `bundle_hash` is SHA-256 over the concatenation of artifact digests
/// sorted by relative path, so the hash is independent of capture
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// The execution this bundle belongs to (UUIDv4).
    pub execution_id: String,
    /// Artifacts, sorted by relative path at seal time.
    pub artifacts: Vec<EvidenceArtifact>,
    /// Digest over the sorted artifact digests.
    #[serde(with = "hash_hex")]
    pub bundle_hash: Hash,
    /// Seal time.
    #[serde(with = "ts_millis")]
    pub created_at: DateTime<Utc>,
}

impl EvidenceBundle {
    /// Recomputes the bundle hash from the artifacts.
    #[must_use]
    pub fn compute_bundle_hash(artifacts: &[EvidenceArtifact]) -> Hash {
        let mut sorted: Vec<&EvidenceArtifact> = artifacts.iter().collect();
        sorted.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        let mut preimage = Vec::with_capacity(sorted.len() * 32);
        for artifact in sorted {
            preimage.extend_from_slice(&artifact.sha256);
        }
        sha256(&preimage)
    }
}

/// Collects artifacts for one execution and seals them into a bundle.
///
/// Every textual artifact is verified against the redactor before it is
/// accepted; an unredacted capture fails the add and therefore the
/// bundle.
#[derive(Debug)]
pub struct EvidenceBundleBuilder {
    execution_id: String,
    redactor: SecretRedactor,
    artifacts: Vec<EvidenceArtifact>,
}

impl EvidenceBundleBuilder {
    /// Starts a bundle for `execution_id`.
    ///
    /// # Errors
    ///
    /// Rejects a non-UUIDv4 execution id.
    pub fn new(execution_id: &str, redactor: SecretRedactor) -> Result<Self, EvidenceError> {
        validate_uuid_v4(execution_id, IdKind::Execution)?;
        Ok(Self {
            execution_id: execution_id.to_string(),
            redactor,
            artifacts: Vec::new(),
        })
    }

    /// Validates and adds one artifact, returning the (possibly
    /// redacted) bytes that must be the ones persisted.
    ///
    /// For textual kinds the content is passed through the redactor and
    /// then re-scanned; binary kinds are hashed as-is. Path validation
    /// happens before anything touches the content.
    ///
    /// # Errors
    ///
    /// [`EvidenceError::Path`] on a bad relative path,
    /// [`EvidenceError::Unredacted`] when secrets survive redaction,
    /// [`EvidenceError::DuplicateKind`] / [`EvidenceError::DuplicatePath`]
    /// on uniqueness violations.
    pub fn add_artifact(
        &mut self,
        relative_path: &str,
        kind: ArtifactKind,
        content: &[u8],
        captured_at: DateTime<Utc>,
    ) -> Result<Vec<u8>, EvidenceError> {
        if kind.is_unique_per_bundle() && self.artifacts.iter().any(|a| a.kind == kind) {
            return Err(EvidenceError::DuplicateKind {
                kind: kind.as_str(),
            });
        }
        if self.artifacts.iter().any(|a| a.relative_path == relative_path) {
            return Err(EvidenceError::DuplicatePath {
                path: relative_path.to_string(),
            });
        }

        let final_bytes = if kind.is_textual() {
            let text = String::from_utf8_lossy(content);
            let redacted = if kind == ArtifactKind::Har {
                self.redactor
                    .redact_archive(&text)
                    .unwrap_or_else(|_| self.redactor.redact_text(&text))
            } else {
                self.redactor.redact_text(&text)
            };
            self.redactor.verify_redacted(&redacted)?;
            redacted.into_bytes()
        } else {
            content.to_vec()
        };

        let artifact = EvidenceArtifact::new(relative_path, kind, &final_bytes, captured_at)?;
        self.artifacts.push(artifact);
        Ok(final_bytes)
    }

    /// Adds pre-redacted content, still enforcing the verifier scan.
    ///
    /// For callers that already ran the redactor upstream; the scan is
    /// not skippable.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_artifact`].
    pub fn add_redacted_artifact(
        &mut self,
        relative_path: &str,
        kind: ArtifactKind,
        content: &[u8],
        captured_at: DateTime<Utc>,
    ) -> Result<(), EvidenceError> {
        if kind.is_unique_per_bundle() && self.artifacts.iter().any(|a| a.kind == kind) {
            return Err(EvidenceError::DuplicateKind {
                kind: kind.as_str(),
            });
        }
        if self.artifacts.iter().any(|a| a.relative_path == relative_path) {
            return Err(EvidenceError::DuplicatePath {
                path: relative_path.to_string(),
            });
        }
        if kind.is_textual() {
            self.redactor
                .verify_redacted(&String::from_utf8_lossy(content))?;
        }
        let artifact = EvidenceArtifact::new(relative_path, kind, content, captured_at)?;
        self.artifacts.push(artifact);
        Ok(())
    }

    /// True when nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Seals the bundle. Artifacts are sorted by relative path and the
    /// bundle hash computed over their digests; the result is
    /// immutable.
    #[must_use]
    pub fn seal(mut self, created_at: DateTime<Utc>) -> EvidenceBundle {
        self.artifacts
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        let bundle_hash = EvidenceBundle::compute_bundle_hash(&self.artifacts);
        EvidenceBundle {
            execution_id: self.execution_id,
            artifacts: self.artifacts,
            bundle_hash,
            created_at: canonical::truncate_to_millis(created_at),
        }
    }
}
