//! The orchestrator's error surface and exit-code mapping.

use thiserror::Error;

use super::executor::ExecutorFailure;
use crate::actor::{Operation, Role};

/// Errors surfaced by the orchestrator.
///
/// Wrapped subsystem errors keep their original kind and message;
/// nothing is reclassified on the way out.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchestratorError {
    /// The caller's role does not permit the operation.
    #[error("insufficient permission: {role} may not {operation} (actor {actor_id})")]
    InsufficientPermission {
        /// The refused actor.
        actor_id: String,
        /// Their role.
        role: Role,
        /// The refused operation.
        operation: Operation,
    },

    /// Identifier or path validation failed.
    #[error(transparent)]
    Validate(#[from] crate::validate::ValidateError),

    /// Envelope validation failed (forbidden action, missing human
    /// initiation).
    #[error(transparent)]
    Request(#[from] crate::request::RequestError),

    /// Confirmation lifecycle failure.
    #[error(transparent)]
    Confirm(#[from] crate::confirm::ConfirmError),

    /// Request-slot failure.
    #[error(transparent)]
    Enforce(#[from] crate::enforce::EnforceError),

    /// State machine refusal.
    #[error(transparent)]
    Submission(#[from] crate::submission::SubmissionError),

    /// Evidence handling failure.
    #[error(transparent)]
    Evidence(#[from] crate::evidence::EvidenceError),

    /// Exact duplicate submission.
    #[error(transparent)]
    Duplicate(#[from] crate::duplicate::DuplicateError),

    /// Audit log failure.
    #[error(transparent)]
    Audit(#[from] crate::audit::AuditError),

    /// Transport failure after consumption.
    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Canonical encoding failure.
    #[error(transparent)]
    Canonical(#[from] crate::canonical::CanonicalError),

    /// The browser-side execution failed; the original classification
    /// and any partial evidence ride along unchanged.
    #[error("execution failed: {failure}")]
    Execution {
        /// The preserved failure.
        failure: ExecutorFailure,
    },

    /// A chain failed verification at a hard-stop point.
    #[error("audit integrity failure: {detail}")]
    AuditIntegrityFailure {
        /// What failed.
        detail: String,
    },

    /// The caller's session is not in the `ACTIVE` state.
    #[error("session {session_id} is {state}, not ACTIVE")]
    SessionNotActive {
        /// The refused session.
        session_id: String,
        /// Its observed state (`UNKNOWN` when never started).
        state: &'static str,
    },

    /// The export phase is sealed.
    #[error("phase is sealed; no further exports are permitted")]
    PhaseSealed,

    /// The system has been decommissioned.
    #[error("system is decommissioned")]
    Decommissioned,
}

impl OrchestratorError {
    /// Maps the error to the governance CLI exit code:
    /// `2` governance violation, `3` integrity/verification failure,
    /// `4` permission denied, `5` expired/replayed token, `1` for
    /// operational failures outside the taxonomy.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        use crate::confirm::ConfirmError;
        use crate::transport::TransportError;

        match self {
            Self::Confirm(ConfirmError::TokenExpired { .. } | ConfirmError::ReplayAttempt { .. })
            | Self::Transport(TransportError::Confirm(
                ConfirmError::TokenExpired { .. } | ConfirmError::ReplayAttempt { .. },
            )) => 5,

            Self::InsufficientPermission { .. }
            | Self::Confirm(ConfirmError::HumanConfirmationRequired { .. }) => 4,

            Self::Confirm(ConfirmError::TokenTampered { .. })
            | Self::Transport(TransportError::Confirm(ConfirmError::TokenTampered { .. }))
            | Self::AuditIntegrityFailure { .. }
            | Self::Audit(crate::audit::AuditError::AuditIntegrity { .. })
            | Self::Evidence(crate::evidence::EvidenceError::HashChainMismatch { .. }) => 3,

            Self::Validate(_)
            | Self::Request(_)
            | Self::Enforce(_)
            | Self::Submission(_)
            | Self::Evidence(_)
            | Self::Duplicate(_)
            | Self::Audit(_)
            | Self::Config(_)
            | Self::Confirm(_)
            | Self::SessionNotActive { .. }
            | Self::PhaseSealed
            | Self::Decommissioned
            | Self::Transport(TransportError::ArchitecturalViolation { .. }) => 2,

            Self::Transport(_) | Self::Canonical(_) | Self::Execution { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::confirm::ConfirmError;

    use super::*;

    #[test]
    fn exit_codes_match_the_cli_contract() {
        let expired = OrchestratorError::Confirm(ConfirmError::TokenExpired {
            confirmation_id: "x".to_string(),
            expires_at: "2026-01-01T00:00:00.000Z".to_string(),
        });
        assert_eq!(expired.exit_code(), 5);

        let replay = OrchestratorError::Confirm(ConfirmError::ReplayAttempt {
            confirmation_id: "x".to_string(),
        });
        assert_eq!(replay.exit_code(), 5);

        let permission = OrchestratorError::InsufficientPermission {
            actor_id: "a".to_string(),
            role: Role::Auditor,
            operation: Operation::Execute,
        };
        assert_eq!(permission.exit_code(), 4);

        let tamper = OrchestratorError::Confirm(ConfirmError::TokenTampered {
            confirmation_id: "x".to_string(),
        });
        assert_eq!(tamper.exit_code(), 3);

        let integrity = OrchestratorError::AuditIntegrityFailure {
            detail: "broken".to_string(),
        };
        assert_eq!(integrity.exit_code(), 3);

        assert_eq!(OrchestratorError::PhaseSealed.exit_code(), 2);
        assert_eq!(OrchestratorError::Decommissioned.exit_code(), 2);
    }
}
