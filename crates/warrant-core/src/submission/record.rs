//! Submission records and the per-id serialized store.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::SubmissionStatus;
use super::SubmissionError;
use crate::canonical::{self, ts_millis};
use crate::crypto::{Hash, hash_hex};
use crate::validate::{IdKind, new_id, validate_uuid_v4};

/// One accepted transition in a record's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// The state entered.
    pub status: SubmissionStatus,
    /// When it was entered.
    #[serde(with = "ts_millis")]
    pub at: DateTime<Utc>,
    /// Optional reason (failure detail, platform verdict).
    pub reason: Option<String>,
}

/// A submission tracked through the state machine.
///
/// The history vector is append-only: every accepted transition adds
/// exactly one entry, and nothing is ever rewritten. Mutation happens
/// only through [`SubmissionStore::transition`], which serializes
/// per-id updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Record identifier (UUIDv4).
    pub submission_id: String,
    /// The human decision this submission realizes.
    pub decision_id: String,
    /// Destination platform.
    pub platform_tag: String,
    /// Digest of the confirmed draft content.
    #[serde(with = "hash_hex")]
    pub content_hash: Hash,
    /// Current state.
    pub status: SubmissionStatus,
    /// When the record was created.
    #[serde(with = "ts_millis")]
    pub created_at: DateTime<Utc>,
    /// Every accepted transition, oldest first.
    pub history: Vec<StatusChange>,
}

impl SubmissionRecord {
    /// Creates a record in `PENDING`.
    ///
    /// # Errors
    ///
    /// Rejects a non-UUIDv4 submission id.
    pub fn new(
        decision_id: &str,
        platform_tag: &str,
        content_hash: Hash,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SubmissionError> {
        let submission_id = new_id();
        validate_uuid_v4(&submission_id, IdKind::Submission)?;
        let created_at = canonical::truncate_to_millis(created_at);
        Ok(Self {
            submission_id,
            decision_id: decision_id.to_string(),
            platform_tag: platform_tag.to_string(),
            content_hash,
            status: SubmissionStatus::Pending,
            created_at,
            history: vec![StatusChange {
                status: SubmissionStatus::Pending,
                at: created_at,
                reason: None,
            }],
        })
    }

    fn apply(
        &mut self,
        to: SubmissionStatus,
        at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<(), SubmissionError> {
        if !self.status.can_transition_to(&to) {
            return Err(SubmissionError::InvalidTransition {
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        self.history.push(StatusChange {
            status: to,
            at: canonical::truncate_to_millis(at),
            reason,
        });
        Ok(())
    }
}

/// In-memory record store with per-id serialized transitions.
///
/// One mutex over the map keeps critical sections short (no I/O under
/// the lock); distinct ids still transition without interfering with
/// each other's histories.
#[derive(Debug, Default)]
pub struct SubmissionStore {
    records: Mutex<HashMap<String, SubmissionRecord>>,
}

impl SubmissionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a freshly created record.
    ///
    /// # Errors
    ///
    /// [`SubmissionError::DuplicateSubmissionId`] when the id exists.
    pub fn insert(&self, record: SubmissionRecord) -> Result<(), SubmissionError> {
        let mut records = self.records.lock().expect("submission store lock poisoned");
        if records.contains_key(&record.submission_id) {
            return Err(SubmissionError::DuplicateSubmissionId {
                submission_id: record.submission_id,
            });
        }
        records.insert(record.submission_id.clone(), record);
        Ok(())
    }

    /// Returns a copy of the record.
    #[must_use]
    pub fn get(&self, submission_id: &str) -> Option<SubmissionRecord> {
        self.records
            .lock()
            .expect("submission store lock poisoned")
            .get(submission_id)
            .cloned()
    }

    /// Checks a transition without performing it.
    ///
    /// # Errors
    ///
    /// [`SubmissionError::UnknownSubmission`] or
    /// [`SubmissionError::InvalidTransition`].
    pub fn dry_run(
        &self,
        submission_id: &str,
        to: SubmissionStatus,
    ) -> Result<(), SubmissionError> {
        let records = self.records.lock().expect("submission store lock poisoned");
        let record =
            records
                .get(submission_id)
                .ok_or_else(|| SubmissionError::UnknownSubmission {
                    submission_id: submission_id.to_string(),
                })?;
        if record.status.can_transition_to(&to) {
            Ok(())
        } else {
            Err(SubmissionError::InvalidTransition {
                from: record.status.as_str(),
                to: to.as_str(),
            })
        }
    }

    /// Performs a guarded transition, appending to the history.
    ///
    /// # Errors
    ///
    /// [`SubmissionError::UnknownSubmission`] or
    /// [`SubmissionError::InvalidTransition`]; on error the record is
    /// unchanged.
    pub fn transition(
        &self,
        submission_id: &str,
        to: SubmissionStatus,
        at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<SubmissionRecord, SubmissionError> {
        let mut records = self.records.lock().expect("submission store lock poisoned");
        let record =
            records
                .get_mut(submission_id)
                .ok_or_else(|| SubmissionError::UnknownSubmission {
                    submission_id: submission_id.to_string(),
                })?;
        record.apply(to, at, reason)?;
        Ok(record.clone())
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .expect("submission store lock poisoned")
            .len()
    }

    /// True when no records exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use crate::crypto::sha256;

    use super::*;

    fn t0() -> DateTime<Utc> {
        canonical::parse_timestamp("2026-02-01T10:00:00.000Z").unwrap()
    }

    fn new_record() -> SubmissionRecord {
        SubmissionRecord::new("decision-1", "hackerone", sha256(b"draft"), t0()).unwrap()
    }

    #[test]
    fn record_starts_pending_with_one_history_entry() {
        let record = new_record();
        assert_eq!(record.status, SubmissionStatus::Pending);
        assert_eq!(record.history.len(), 1);
        assert_eq!(record.history[0].status, SubmissionStatus::Pending);
    }

    #[test]
    fn happy_path_builds_history() {
        let store = SubmissionStore::new();
        let record = new_record();
        let id = record.submission_id.clone();
        store.insert(record).unwrap();

        store
            .transition(&id, SubmissionStatus::Confirmed, t0(), None)
            .unwrap();
        store
            .transition(&id, SubmissionStatus::Submitted, t0(), None)
            .unwrap();
        let done = store
            .transition(
                &id,
                SubmissionStatus::Acknowledged,
                t0(),
                Some("platform ref #123".to_string()),
            )
            .unwrap();

        assert_eq!(done.status, SubmissionStatus::Acknowledged);
        let states: Vec<_> = done.history.iter().map(|c| c.status).collect();
        assert_eq!(
            states,
            vec![
                SubmissionStatus::Pending,
                SubmissionStatus::Confirmed,
                SubmissionStatus::Submitted,
                SubmissionStatus::Acknowledged,
            ]
        );
    }

    #[test]
    fn skipping_confirmation_is_rejected_and_state_unchanged() {
        let store = SubmissionStore::new();
        let record = new_record();
        let id = record.submission_id.clone();
        store.insert(record).unwrap();

        let err = store
            .transition(&id, SubmissionStatus::Submitted, t0(), None)
            .unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::InvalidTransition {
                from: "PENDING",
                to: "SUBMITTED",
            }
        ));

        let record = store.get(&id).unwrap();
        assert_eq!(record.status, SubmissionStatus::Pending);
        assert_eq!(record.history.len(), 1);
    }

    #[test]
    fn terminal_record_absorbs_further_transitions() {
        let store = SubmissionStore::new();
        let record = new_record();
        let id = record.submission_id.clone();
        store.insert(record).unwrap();
        store
            .transition(&id, SubmissionStatus::Confirmed, t0(), None)
            .unwrap();
        store
            .transition(
                &id,
                SubmissionStatus::Failed,
                t0(),
                Some("connect timeout".to_string()),
            )
            .unwrap();

        for to in SubmissionStatus::all() {
            assert!(store.transition(&id, to, t0(), None).is_err());
        }
    }

    #[test]
    fn dry_run_does_not_mutate() {
        let store = SubmissionStore::new();
        let record = new_record();
        let id = record.submission_id.clone();
        store.insert(record).unwrap();

        store.dry_run(&id, SubmissionStatus::Confirmed).unwrap();
        assert_eq!(store.get(&id).unwrap().history.len(), 1);
        assert!(store.dry_run(&id, SubmissionStatus::Submitted).is_err());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = SubmissionStore::new();
        let record = new_record();
        store.insert(record.clone()).unwrap();
        assert!(matches!(
            store.insert(record),
            Err(SubmissionError::DuplicateSubmissionId { .. })
        ));
    }

    #[test]
    fn unknown_id_is_reported() {
        let store = SubmissionStore::new();
        let ghost = crate::validate::new_id();
        assert!(matches!(
            store.dry_run(&ghost, SubmissionStatus::Confirmed),
            Err(SubmissionError::UnknownSubmission { .. })
        ));
    }
}
