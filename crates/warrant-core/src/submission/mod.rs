//! Submission lifecycle state machines and records.
//!
//! Transitions are a closed table; anything outside it — self-loops and
//! backwards moves included — is an [`SubmissionError::InvalidTransition`].
//! Terminal states absorb: once `ACKNOWLEDGED`, `REJECTED`, or `FAILED`
//! is reached the record is sealed. The session and export lifecycles
//! are tiny machines under the same rule.

mod record;
mod status;

pub use record::{StatusChange, SubmissionRecord, SubmissionStore};
pub use status::{ExportState, SessionState, SubmissionStatus};
use thiserror::Error;

/// Errors from state-machine mediation.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The requested transition is outside the closed table.
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: &'static str,
        /// Requested state.
        to: &'static str,
    },

    /// The submission id is unknown to the store.
    #[error("unknown submission {submission_id}")]
    UnknownSubmission {
        /// The id that was not found.
        submission_id: String,
    },

    /// A record with this id already exists.
    #[error("submission {submission_id} already exists")]
    DuplicateSubmissionId {
        /// The colliding id.
        submission_id: String,
    },

    /// An identifier failed validation at construction.
    #[error(transparent)]
    IdentifierInvalid(#[from] crate::validate::ValidateError),
}
