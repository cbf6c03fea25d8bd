//! Evidence bundles and the execution manifest chain.
//!
//! # Design
//!
//! ```text
//! captured bytes
//!      |
//!      v
//! EvidenceBundleBuilder ── validate path (A) ── redact + verify (B)
//!      |
//!      v  seal()
//! EvidenceBundle (immutable, bundle_hash over sorted artifact digests)
//!      |
//!      v
//! ManifestStore::generate ── links previous manifest hash
//!      |
//!      v
//! ExecutionManifest (immutable, self-hashed, persisted as JSON)
//! ```
//!
//! Construction is the enforcement point: a bundle with a traversal
//! path, an unredacted artifact, or a duplicated unique kind cannot
//! exist. Manifest generation never mutates the bundle, and identical
//! inputs produce byte-identical manifests.

mod artifact;
mod bundle;
mod manifest;
mod store;

pub use artifact::{ArtifactKind, EvidenceArtifact};
pub use bundle::{EvidenceBundle, EvidenceBundleBuilder};
pub use manifest::ExecutionManifest;
pub use store::ManifestStore;
use thiserror::Error;

use crate::audit::ChainVerdict;

/// Errors from evidence handling.
#[derive(Debug, Error)]
pub enum EvidenceError {
    /// An artifact path failed validation.
    #[error(transparent)]
    Path(#[from] crate::validate::ValidateError),

    /// An artifact still carried secrets after redaction.
    #[error(transparent)]
    Unredacted(#[from] crate::redact::RedactError),

    /// A second artifact of a kind declared unique was added.
    #[error("duplicate artifact kind {kind} in one bundle")]
    DuplicateKind {
        /// The kind that collided.
        kind: &'static str,
    },

    /// Two artifacts share one relative path.
    #[error("duplicate artifact path {path:?} in one bundle")]
    DuplicatePath {
        /// The colliding path.
        path: String,
    },

    /// The manifest chain failed verification.
    #[error("hash chain mismatch at manifest index {index}: {detail}")]
    HashChainMismatch {
        /// Index of the first bad manifest.
        index: usize,
        /// What was inconsistent.
        detail: String,
    },

    /// Canonical encoding failed.
    #[error(transparent)]
    Canonical(#[from] crate::canonical::CanonicalError),

    /// Persistence I/O failed.
    #[error("manifest I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted manifest did not parse.
    #[error("malformed manifest file: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Re-used verdict shape for manifest chain verification.
pub type ManifestChainVerdict = ChainVerdict;
