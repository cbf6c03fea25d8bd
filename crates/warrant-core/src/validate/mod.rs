//! Identifier and path validation.
//!
//! Every identifier that can reach a filesystem path or an audit record
//! (`execution_id`, `session_id`, `confirmation_id`, `submission_id`,
//! `manifest_id`) must be a canonical UUIDv4; every artifact path must be
//! relative, traversal-free, and resolve strictly under the configured
//! artifact root. All checks run before any I/O side effect.

mod id;
mod path;

pub use id::{IdKind, new_id, validate_uuid_v4};
pub use path::{confine_to_root, validate_relative_path};
use thiserror::Error;

/// Validation failures. Both variants are integrity-class errors: they
/// hard-stop the operation that produced them and are always audited.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// An identifier is not a canonical UUIDv4.
    #[error("invalid {kind} identifier: {reason}")]
    IdentifierInvalid {
        /// Which identifier failed.
        kind: IdKind,
        /// Why it failed.
        reason: String,
    },

    /// A path is absolute, contains traversal, or escapes the artifact
    /// root.
    #[error("path traversal blocked for {path:?}: {reason}")]
    PathTraversal {
        /// The offending path as supplied by the caller.
        path: String,
        /// Why it was rejected.
        reason: String,
    },
}
