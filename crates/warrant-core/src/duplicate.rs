//! Duplicate submission guard.
//!
//! Keeps an idempotency index over `(decision_id, platform_tag,
//! content_hash)`. An exact match on all three blocks the submission; a
//! partial match (same decision and platform, different content — or
//! same content headed elsewhere) produces an advisory warning that is
//! logged but does not block. An exact duplicate may only proceed when
//! the request carries the explicit override flag, which is part of the
//! confirmation's bound payload and therefore itself human-authorized.

use std::collections::HashSet;
use std::sync::Mutex;

use thiserror::Error;

use crate::crypto::Hash;
use crate::request::SubmissionRequest;

/// Error raised when an exact duplicate is blocked.
#[derive(Debug, Error)]
pub enum DuplicateError {
    /// The exact triple was submitted before and no override was
    /// authorized.
    #[error("duplicate submission for decision {decision_id} to {platform_tag}")]
    DuplicateSubmission {
        /// The repeated decision.
        decision_id: String,
        /// The repeated destination.
        platform_tag: String,
    },
}

/// One recorded submission identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SubmissionKey {
    decision_id: String,
    platform_tag: String,
    content_hash: Hash,
}

impl SubmissionKey {
    fn of(request: &SubmissionRequest) -> Self {
        Self {
            decision_id: request.decision_id.clone(),
            platform_tag: request.platform_tag.clone(),
            content_hash: request.draft_content_hash,
        }
    }
}

/// Outcome of a duplicate check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DuplicateVerdict {
    /// No prior submission resembles this one.
    Clear,
    /// A near-duplicate exists; proceed, but log the warning.
    Advisory {
        /// Human-readable description of the partial match.
        warning: String,
    },
    /// An exact duplicate exists and the human authorized an override.
    OverrideAuthorized,
}

/// Read-mostly duplicate index, locked on insert.
#[derive(Debug, Default)]
pub struct DuplicateGuard {
    seen: Mutex<HashSet<SubmissionKey>>,
}

impl DuplicateGuard {
    /// Creates an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `request` against the index without recording it.
    ///
    /// # Errors
    ///
    /// [`DuplicateError::DuplicateSubmission`] on an exact triple match
    /// without the override flag.
    pub fn check(&self, request: &SubmissionRequest) -> Result<DuplicateVerdict, DuplicateError> {
        let key = SubmissionKey::of(request);
        let seen = self.seen.lock().expect("duplicate guard lock poisoned");

        if seen.contains(&key) {
            if request.override_duplicate {
                return Ok(DuplicateVerdict::OverrideAuthorized);
            }
            return Err(DuplicateError::DuplicateSubmission {
                decision_id: request.decision_id.clone(),
                platform_tag: request.platform_tag.clone(),
            });
        }

        for prior in seen.iter() {
            if prior.decision_id == key.decision_id && prior.platform_tag == key.platform_tag {
                return Ok(DuplicateVerdict::Advisory {
                    warning: format!(
                        "decision {} was already submitted to {} with different content",
                        key.decision_id, key.platform_tag
                    ),
                });
            }
            if prior.content_hash == key.content_hash {
                return Ok(DuplicateVerdict::Advisory {
                    warning: format!(
                        "identical content was already submitted to {}",
                        prior.platform_tag
                    ),
                });
            }
        }

        Ok(DuplicateVerdict::Clear)
    }

    /// Records a transmitted submission in the index.
    pub fn record(&self, request: &SubmissionRequest) {
        self.seen
            .lock()
            .expect("duplicate guard lock poisoned")
            .insert(SubmissionKey::of(request));
    }

    /// Number of recorded submissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().expect("duplicate guard lock poisoned").len()
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
