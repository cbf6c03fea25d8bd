//! The append-only, mutex-serialized audit log.

use std::io::{BufRead, Write};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::entry::{AuditEntry, AuditEntrySeed};
use super::{AuditError, LogScope};
use crate::canonical;
use crate::crypto::{Hash, ZERO_HASH, hashes_equal};
use crate::validate;

/// Result of an end-to-end chain verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerdict {
    /// True when every hash and link checks out.
    pub valid: bool,
    /// Index of the first inconsistent entry, when invalid.
    pub first_bad_index: Option<usize>,
    /// Description of the first inconsistency, when invalid.
    pub reason: Option<String>,
}

impl ChainVerdict {
    fn ok() -> Self {
        Self {
            valid: true,
            first_bad_index: None,
            reason: None,
        }
    }

    fn broken(index: usize, reason: String) -> Self {
        Self {
            valid: false,
            first_bad_index: Some(index),
            reason: Some(reason),
        }
    }
}

/// An append-only hash-chained log owned by a single subsystem.
///
/// `append` holds a short mutex covering canonicalization, hashing, and
/// the push — never any I/O. Snapshots clone the entries so readers
/// observe a consistent prefix.
#[derive(Debug)]
pub struct AuditLog {
    scope: LogScope,
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog {
    /// Creates an empty log owned by `scope`.
    #[must_use]
    pub fn new(scope: LogScope) -> Self {
        Self {
            scope,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Returns the owning scope.
    #[must_use]
    pub const fn scope(&self) -> LogScope {
        self.scope
    }

    /// Appends an entry on behalf of `writer`.
    ///
    /// The writer must be the owning subsystem; anything else is an
    /// architectural violation and nothing is appended.
    ///
    /// # Errors
    ///
    /// [`AuditError::ArchitecturalViolation`] on a scope mismatch;
    /// [`AuditError::Canonical`] if the entry cannot be encoded.
    pub fn append(
        &self,
        writer: LogScope,
        seed: AuditEntrySeed,
        now: DateTime<Utc>,
    ) -> Result<AuditEntry, AuditError> {
        if writer != self.scope {
            return Err(AuditError::ArchitecturalViolation {
                owner: self.scope,
                writer,
            });
        }

        let mut entries = self.entries.lock().expect("audit log lock poisoned");

        let previous_hash = entries.last().map_or(ZERO_HASH, |e| e.entry_hash);
        let mut entry = AuditEntry {
            entry_id: validate::new_id(),
            timestamp_utc: canonical::truncate_to_millis(now),
            actor_id: seed.actor_id,
            role: seed.role,
            action: seed.action,
            outcome: seed.outcome,
            refs: seed.refs,
            previous_hash,
            entry_hash: ZERO_HASH,
        };
        entry.entry_hash = entry.compute_hash()?;

        tracing::debug!(
            scope = %self.scope,
            action = %entry.action,
            outcome = entry.outcome.as_str(),
            "audit append"
        );

        entries.push(entry.clone());
        Ok(entry)
    }

    /// Returns a consistent copy of all entries in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit log lock poisoned").clone()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("audit log lock poisoned").len()
    }

    /// Returns true when the log has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recomputes every hash and link end-to-end.
    #[must_use]
    pub fn verify(&self) -> bool {
        self.verify_with_reason().valid
    }

    /// Recomputes every hash and link, reporting the first inconsistency.
    #[must_use]
    pub fn verify_with_reason(&self) -> ChainVerdict {
        let entries = self.entries.lock().expect("audit log lock poisoned");
        verify_entries(&entries)
    }

    /// Writes the log as one JSON object per line.
    ///
    /// # Errors
    ///
    /// Propagates serialization and I/O failures.
    pub fn write_jsonl<W: Write>(&self, mut writer: W) -> Result<(), AuditError> {
        for entry in self.snapshot() {
            let line = canonical::to_canonical_json(&entry)?;
            writeln!(writer, "{line}")?;
        }
        Ok(())
    }

    /// Reconstructs a log from JSONL, verifying the chain link-by-link.
    ///
    /// # Errors
    ///
    /// [`AuditError::CorruptLine`] on unparseable input;
    /// [`AuditError::AuditIntegrity`] if the reconstructed chain does
    /// not verify. A log that fails here must be treated as tampered.
    pub fn load_jsonl<R: BufRead>(scope: LogScope, reader: R) -> Result<Self, AuditError> {
        let mut entries = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry =
                serde_json::from_str(&line).map_err(|e| AuditError::CorruptLine {
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            entries.push(entry);
        }

        let verdict = verify_entries(&entries);
        if !verdict.valid {
            return Err(AuditError::AuditIntegrity {
                index: verdict.first_bad_index.unwrap_or(0),
                detail: verdict.reason.unwrap_or_else(|| "chain invalid".to_string()),
            });
        }

        Ok(Self {
            scope,
            entries: Mutex::new(entries),
        })
    }
}

/// Verifies a sequence of entries as a chain.
fn verify_entries(entries: &[AuditEntry]) -> ChainVerdict {
    let mut expected_previous: Hash = ZERO_HASH;
    for (index, entry) in entries.iter().enumerate() {
        if !hashes_equal(&entry.previous_hash, &expected_previous) {
            return ChainVerdict::broken(
                index,
                format!(
                    "link broken: expected previous {}, found {}",
                    hex::encode(expected_previous),
                    hex::encode(entry.previous_hash)
                ),
            );
        }
        match entry.compute_hash() {
            Ok(computed) if hashes_equal(&computed, &entry.entry_hash) => {},
            Ok(computed) => {
                return ChainVerdict::broken(
                    index,
                    format!(
                        "hash mismatch: stored {}, recomputed {}",
                        hex::encode(entry.entry_hash),
                        hex::encode(computed)
                    ),
                );
            },
            Err(e) => {
                return ChainVerdict::broken(index, format!("canonical encoding failed: {e}"));
            },
        }
        expected_previous = entry.entry_hash;
    }
    ChainVerdict::ok()
}

#[cfg(test)]
mod tests {
    use super::super::entry::{AuditAction, AuditOutcome};
    use crate::actor::Role;

    use super::*;

    fn seed(action: AuditAction, outcome: AuditOutcome) -> AuditEntrySeed {
        AuditEntrySeed::new("op-1", Role::Operator, action, outcome)
    }

    fn t(offset_secs: i64) -> DateTime<Utc> {
        canonical::parse_timestamp("2026-01-15T08:30:00.000Z").unwrap()
            + chrono::Duration::seconds(offset_secs)
    }

    #[test]
    fn genesis_entry_links_to_zero() {
        let log = AuditLog::new(LogScope::Submission);
        let entry = log
            .append(
                LogScope::Submission,
                seed(AuditAction::RequestCreated, AuditOutcome::Ok),
                t(0),
            )
            .unwrap();
        assert_eq!(entry.previous_hash, ZERO_HASH);
        assert!(log.verify());
    }

    #[test]
    fn entries_chain_in_order() {
        let log = AuditLog::new(LogScope::Execution);
        let first = log
            .append(
                LogScope::Execution,
                seed(AuditAction::ActionExecuted, AuditOutcome::Ok),
                t(0),
            )
            .unwrap();
        let second = log
            .append(
                LogScope::Execution,
                seed(AuditAction::EvidenceSealed, AuditOutcome::Ok),
                t(1),
            )
            .unwrap();
        assert_eq!(second.previous_hash, first.entry_hash);
        assert!(log.verify());
    }

    #[test]
    fn cross_scope_write_is_rejected() {
        let log = AuditLog::new(LogScope::Submission);
        let err = log
            .append(
                LogScope::Execution,
                seed(AuditAction::Transmitted, AuditOutcome::Ok),
                t(0),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            AuditError::ArchitecturalViolation {
                owner: LogScope::Submission,
                writer: LogScope::Execution,
            }
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn snapshots_are_prefix_extensions() {
        let log = AuditLog::new(LogScope::Export);
        log.append(
            LogScope::Export,
            seed(AuditAction::ExportCompleted, AuditOutcome::Ok),
            t(0),
        )
        .unwrap();
        let before = log.snapshot();
        log.append(
            LogScope::Export,
            seed(AuditAction::PhaseSealed, AuditOutcome::Ok),
            t(1),
        )
        .unwrap();
        let after = log.snapshot();
        assert_eq!(&after[..before.len()], &before[..]);
        assert_eq!(after.len(), before.len() + 1);
    }

    #[test]
    fn verification_reports_first_bad_index() {
        let log = AuditLog::new(LogScope::Execution);
        for i in 0..3 {
            log.append(
                LogScope::Execution,
                seed(AuditAction::ActionExecuted, AuditOutcome::Ok),
                t(i),
            )
            .unwrap();
        }

        let mut entries = log.snapshot();
        entries[1].actor_id = "intruder".to_string();
        let verdict = verify_entries(&entries);
        assert!(!verdict.valid);
        assert_eq!(verdict.first_bad_index, Some(1));
        assert!(verdict.reason.unwrap().contains("hash mismatch"));
    }

    #[test]
    fn broken_link_is_detected() {
        let log = AuditLog::new(LogScope::Execution);
        for i in 0..2 {
            log.append(
                LogScope::Execution,
                seed(AuditAction::ActionExecuted, AuditOutcome::Ok),
                t(i),
            )
            .unwrap();
        }
        let mut entries = log.snapshot();
        entries[1].previous_hash = [0xAB; 32];
        // Recompute so the per-entry hash is self-consistent: only the
        // link itself is wrong.
        entries[1].entry_hash = entries[1].compute_hash().unwrap();
        let verdict = verify_entries(&entries);
        assert_eq!(verdict.first_bad_index, Some(1));
        assert!(verdict.reason.unwrap().contains("link broken"));
    }

    #[test]
    fn jsonl_round_trip_preserves_chain() {
        let log = AuditLog::new(LogScope::Submission);
        for (i, outcome) in [AuditOutcome::Ok, AuditOutcome::Consumed, AuditOutcome::Denied]
            .into_iter()
            .enumerate()
        {
            log.append(
                LogScope::Submission,
                seed(AuditAction::ConfirmationConsumed, outcome),
                t(i64::try_from(i).unwrap()),
            )
            .unwrap();
        }

        let mut buf = Vec::new();
        log.write_jsonl(&mut buf).unwrap();

        let reloaded = AuditLog::load_jsonl(LogScope::Submission, buf.as_slice()).unwrap();
        assert_eq!(reloaded.snapshot(), log.snapshot());
        assert!(reloaded.verify());
    }

    #[test]
    fn tampered_jsonl_fails_to_load() {
        let log = AuditLog::new(LogScope::Submission);
        log.append(
            LogScope::Submission,
            seed(AuditAction::Transmitted, AuditOutcome::Ok),
            t(0),
        )
        .unwrap();
        log.append(
            LogScope::Submission,
            seed(AuditAction::PlatformAcknowledged, AuditOutcome::Ok),
            t(1),
        )
        .unwrap();

        let mut buf = Vec::new();
        log.write_jsonl(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap().replace("op-1", "op-9");

        let err = AuditLog::load_jsonl(LogScope::Submission, text.as_bytes()).unwrap_err();
        assert!(matches!(err, AuditError::AuditIntegrity { index: 0, .. }));
    }

    #[test]
    fn garbage_jsonl_reports_line_number() {
        let err =
            AuditLog::load_jsonl(LogScope::Export, "not json at all\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AuditError::CorruptLine { line: 1, .. }));
    }
}
