//! Hash-chained, append-only audit logs.
//!
//! # Design
//!
//! Each governance subsystem owns exactly one [`AuditLog`]. Entries are
//! SHA-256 linked: every entry embeds the previous entry's hash (the
//! 32-byte zero value for genesis) and its own hash over the canonical
//! encoding of all other fields. `append` is the only mutator and is
//! serialized by a mutex; readers get consistent snapshots.
//!
//! Cross-subsystem writes are architectural violations: a writer must
//! declare its [`LogScope`], and a mismatch with the log's scope is
//! rejected before anything is hashed.
//!
//! # Verification
//!
//! [`AuditLog::verify_with_reason`] recomputes every hash and link
//! end-to-end and reports the first inconsistent index. Callers that
//! wrap a storage layer must treat a failed verification as an
//! integrity fault and hard-stop.

mod entry;
mod log;

pub use entry::{AuditAction, AuditEntry, AuditEntrySeed, AuditOutcome, AuditRefs};
pub use log::{AuditLog, ChainVerdict};
use thiserror::Error;

/// The subsystems that own audit logs. One log per scope; no sharing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum LogScope {
    /// Browser-operation execution log.
    Execution,
    /// Platform submission log.
    Submission,
    /// Reflection / intent-capture log.
    Reflection,
    /// Evidence export log.
    Export,
}

impl LogScope {
    /// Returns the scope name used in persisted entries.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Submission => "submission",
            Self::Reflection => "reflection",
            Self::Export => "export",
        }
    }
}

impl std::fmt::Display for LogScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from audit log operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A subsystem attempted to write into another subsystem's log.
    #[error("architectural violation: {writer} subsystem may not write to the {owner} log")]
    ArchitecturalViolation {
        /// Scope of the log being written.
        owner: LogScope,
        /// Scope the writer declared.
        writer: LogScope,
    },

    /// The chain failed end-to-end verification.
    ///
    /// Hard stop: no further appends or reads should be trusted.
    #[error("audit integrity failure at index {index}: {detail}")]
    AuditIntegrity {
        /// Index of the first inconsistent entry.
        index: usize,
        /// What was inconsistent.
        detail: String,
    },

    /// Canonical encoding of an entry failed.
    #[error(transparent)]
    Canonical(#[from] crate::canonical::CanonicalError),

    /// Persisted log line could not be parsed.
    #[error("corrupt audit line {line}: {reason}")]
    CorruptLine {
        /// 1-based line number.
        line: usize,
        /// Parse failure description.
        reason: String,
    },

    /// I/O failure while persisting or loading.
    #[error("audit I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
