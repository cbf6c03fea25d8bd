//! Audit entry records and their canonical hashing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::Role;
use crate::canonical::{self, ts_millis};
use crate::crypto::{Hash, hash_hex};

/// Outcome recorded with every audit entry.
///
/// Integrity-class outcomes (`TamperDetected`, `ReplayAttempt`,
/// `PathTraversal`, `UnredactedEvidence`, `ForbiddenAction`) always
/// correspond to a hard-stopped operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum AuditOutcome {
    /// The operation completed.
    Ok,
    /// The operation was refused by policy.
    Denied,
    /// The operation failed operationally.
    Error,
    /// A confirmation token was consumed.
    Consumed,
    /// A consumed token was presented again.
    ReplayAttempt,
    /// A bound payload no longer matched its token.
    TamperDetected,
    /// A token was past its expiry.
    TokenExpired,
    /// A path escaped or tried to escape the artifact root.
    PathTraversal,
    /// Evidence still carried secrets after redaction.
    UnredactedEvidence,
    /// A requested action was outside the allowlist.
    ForbiddenAction,
    /// An exact duplicate submission was blocked.
    DuplicateBlocked,
    /// The caller's role did not permit the operation.
    PermissionDenied,
    /// A state transition outside the closed table was attempted.
    InvalidTransition,
    /// A non-blocking warning attached to a successful operation.
    Advisory,
}

impl AuditOutcome {
    /// Returns the persisted name of this outcome.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Denied => "DENIED",
            Self::Error => "ERROR",
            Self::Consumed => "CONSUMED",
            Self::ReplayAttempt => "REPLAY_ATTEMPT",
            Self::TamperDetected => "TAMPER_DETECTED",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::PathTraversal => "PATH_TRAVERSAL",
            Self::UnredactedEvidence => "UNREDACTED_EVIDENCE",
            Self::ForbiddenAction => "FORBIDDEN_ACTION",
            Self::DuplicateBlocked => "DUPLICATE_BLOCKED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::Advisory => "ADVISORY",
        }
    }
}

/// The closed action vocabulary used by the orchestrator.
///
/// Entries store the action as a plain string so operators can grep
/// persisted logs; this enum keeps the producers consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuditAction {
    /// A submission request was created.
    RequestCreated,
    /// A human was asked to confirm.
    ConfirmationRequested,
    /// A confirmation token was minted.
    ConfirmationMinted,
    /// A confirmation token was consumed.
    ConfirmationConsumed,
    /// A replayed confirmation was blocked.
    ReplayBlocked,
    /// A bound-hash mismatch was detected.
    TamperDetected,
    /// The single request slot was granted.
    NetworkAccessGranted,
    /// Network access was refused.
    NetworkAccessDenied,
    /// A report was transmitted to a platform.
    Transmitted,
    /// A transmission attempt failed.
    TransmissionFailed,
    /// The platform acknowledged a submission.
    PlatformAcknowledged,
    /// The platform rejected a submission.
    PlatformRejected,
    /// A duplicate submission was blocked.
    DuplicateBlocked,
    /// A caller lacked permission for an operation.
    PermissionDenied,
    /// A browser action was executed.
    ActionExecuted,
    /// A browser action failed.
    ActionFailed,
    /// An evidence bundle was sealed.
    EvidenceSealed,
    /// An execution manifest was written.
    ManifestWritten,
    /// Findings were exported.
    ExportCompleted,
    /// A phase was sealed against further writes.
    PhaseSealed,
    /// The system was decommissioned.
    Decommissioned,
    /// A chain verification was run.
    ChainVerified,
    /// An operator session started.
    SessionStarted,
    /// An operator session ended.
    SessionEnded,
}

impl AuditAction {
    /// Returns the persisted name of this action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RequestCreated => "request_created",
            Self::ConfirmationRequested => "confirmation_requested",
            Self::ConfirmationMinted => "confirmation_minted",
            Self::ConfirmationConsumed => "confirmation_consumed",
            Self::ReplayBlocked => "confirmation_replay_blocked",
            Self::TamperDetected => "report_tampering_detected",
            Self::NetworkAccessGranted => "network_access_granted",
            Self::NetworkAccessDenied => "network_access_denied",
            Self::Transmitted => "transmitted",
            Self::TransmissionFailed => "transmission_failed",
            Self::PlatformAcknowledged => "platform_acknowledged",
            Self::PlatformRejected => "platform_rejected",
            Self::DuplicateBlocked => "duplicate_blocked",
            Self::PermissionDenied => "permission_denied",
            Self::ActionExecuted => "action_executed",
            Self::ActionFailed => "action_failed",
            Self::EvidenceSealed => "evidence_sealed",
            Self::ManifestWritten => "manifest_written",
            Self::ExportCompleted => "export_completed",
            Self::PhaseSealed => "phase_sealed",
            Self::Decommissioned => "decommissioned",
            Self::ChainVerified => "chain_verified",
            Self::SessionStarted => "session_started",
            Self::SessionEnded => "session_ended",
        }
    }
}

/// Optional cross-references carried by an entry.
///
/// Absent references serialize as explicit `null` so the canonical
/// encoding is identical for writer and verifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRefs {
    /// Finding the entry concerns, if any.
    pub finding_id: Option<String>,
    /// Session the entry concerns, if any.
    pub session_id: Option<String>,
    /// Confirmation the entry concerns, if any.
    pub confirmation_id: Option<String>,
    /// Manifest the entry concerns, if any.
    pub manifest_id: Option<String>,
}

/// The caller-supplied part of an audit entry.
#[derive(Debug, Clone)]
pub struct AuditEntrySeed {
    /// Acting identity.
    pub actor_id: String,
    /// The actor's role at the time of the action.
    pub role: Role,
    /// What happened (see [`AuditAction`]).
    pub action: String,
    /// How it ended.
    pub outcome: AuditOutcome,
    /// Cross-references.
    pub refs: AuditRefs,
}

impl AuditEntrySeed {
    /// Builds a seed from the closed action vocabulary.
    #[must_use]
    pub fn new(actor_id: &str, role: Role, action: AuditAction, outcome: AuditOutcome) -> Self {
        Self {
            actor_id: actor_id.to_string(),
            role,
            action: action.as_str().to_string(),
            outcome,
            refs: AuditRefs::default(),
        }
    }

    /// Attaches cross-references.
    #[must_use]
    pub fn with_refs(mut self, refs: AuditRefs) -> Self {
        self.refs = refs;
        self
    }
}

/// One immutable, chain-linked audit record.
///
/// `entry_hash` is SHA-256 over the canonical encoding of every other
/// field (which embeds `previous_hash`); it is computed once at append
/// time and never recomputed in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry identifier (UUIDv4).
    pub entry_id: String,
    /// When the entry was appended, canonical millisecond precision.
    #[serde(with = "ts_millis")]
    pub timestamp_utc: DateTime<Utc>,
    /// Acting identity.
    pub actor_id: String,
    /// The actor's role.
    pub role: Role,
    /// Action name.
    pub action: String,
    /// Outcome.
    pub outcome: AuditOutcome,
    /// Cross-references (explicit nulls when absent).
    pub refs: AuditRefs,
    /// Hash of the previous entry; all zeros for genesis.
    #[serde(with = "hash_hex")]
    pub previous_hash: Hash,
    /// Hash of this entry.
    #[serde(with = "hash_hex")]
    pub entry_hash: Hash,
}

impl AuditEntry {
    /// Recomputes this entry's hash from its canonical preimage.
    ///
    /// # Errors
    ///
    /// Propagates canonical-encoding failures.
    pub fn compute_hash(&self) -> Result<Hash, crate::canonical::CanonicalError> {
        canonical::digest_without_field(self, "entry_hash")
    }
}
