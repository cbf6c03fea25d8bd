//! Closed transition tables for submission, session, and export
//! lifecycles.

use serde::{Deserialize, Serialize};

/// Submission lifecycle state.
///
/// ```text
/// PENDING -> CONFIRMED -> SUBMITTED -> ACKNOWLEDGED
///                  |            |
///                FAILED      REJECTED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum SubmissionStatus {
    /// Request created, not yet confirmed.
    Pending,
    /// A valid confirmation was consumed.
    Confirmed,
    /// Transmitted to the platform.
    Submitted,
    /// Platform acknowledged receipt. Terminal.
    Acknowledged,
    /// Platform rejected the submission. Terminal.
    Rejected,
    /// Transmission failed. Terminal; retry needs a fresh authorization
    /// and a fresh record.
    Failed,
}

impl SubmissionStatus {
    /// Returns the persisted name of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Submitted => "SUBMITTED",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
        }
    }

    /// The closed transition table. A submission must pass through
    /// `CONFIRMED` before it can ever be `SUBMITTED`; that is what makes
    /// the human confirmation step structurally unbypassable.
    #[must_use]
    pub const fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Submitted | Self::Failed)
                | (Self::Submitted, Self::Acknowledged | Self::Rejected)
        )
    }

    /// True for states that absorb every further event.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Acknowledged | Self::Rejected | Self::Failed)
    }

    /// All states, for exhaustive table tests.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::Pending,
            Self::Confirmed,
            Self::Submitted,
            Self::Acknowledged,
            Self::Rejected,
            Self::Failed,
        ]
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator session lifecycle: `Started -> Active -> Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum SessionState {
    /// Session record created.
    Started,
    /// Credentials validated, session usable.
    Active,
    /// Session over. Terminal.
    Ended,
}

impl SessionState {
    /// Returns the persisted name of this state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::Active => "ACTIVE",
            Self::Ended => "ENDED",
        }
    }

    /// Closed table: forward only.
    #[must_use]
    pub const fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (Self::Started, Self::Active) | (Self::Active, Self::Ended)
        )
    }

    /// True when no further transition is permitted.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

/// Export/seal lifecycle: `Open -> Sealed`, then nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ExportState {
    /// Exports may be produced.
    Open,
    /// Phase sealed; all further exports refuse. Terminal.
    Sealed,
}

impl ExportState {
    /// Returns the persisted name of this state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Sealed => "SEALED",
        }
    }

    /// Closed table: sealing is the only move.
    #[must_use]
    pub const fn can_transition_to(&self, target: &Self) -> bool {
        matches!((self, target), (Self::Open, Self::Sealed))
    }

    /// True when sealed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Sealed)
    }
}
