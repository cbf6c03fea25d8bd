//! The browser-engine seam.
//!
//! The automation engine itself is outside the core; the orchestrator
//! hands it a validated [`SafeAction`](crate::request::SafeAction) and
//! receives captured artifact bytes back. Failures are classified, and
//! whatever evidence existed before the fault rides along so the
//! orchestrator can preserve it.

use crate::evidence::ArtifactKind;
use crate::request::SafeAction;

/// Raw bytes captured for one artifact during an execution.
#[derive(Debug, Clone)]
pub struct CapturedArtifact {
    /// Path relative to the artifact root
    /// (`{execution_id}/{kind}/{file}` layout).
    pub relative_path: String,
    /// What was captured.
    pub kind: ArtifactKind,
    /// The captured bytes, pre-redaction.
    pub content: Vec<u8>,
}

/// Classification of an execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FailureKind {
    /// The browser process died.
    BrowserCrash,
    /// Navigation did not complete.
    NavigationFailure,
    /// A Content-Security-Policy block stopped the action.
    CspBlock,
    /// Anything else.
    Other,
}

impl FailureKind {
    /// Returns the classification name used in audit reasons.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BrowserCrash => "browser_crash",
            Self::NavigationFailure => "navigation_failure",
            Self::CspBlock => "csp_block",
            Self::Other => "other",
        }
    }
}

/// A classified execution failure with preserved partial evidence.
#[derive(Debug)]
pub struct ExecutorFailure {
    /// What went wrong.
    pub kind: FailureKind,
    /// The engine's original message, unchanged.
    pub detail: String,
    /// Artifacts captured before the fault.
    pub partial: Vec<CapturedArtifact>,
}

impl ExecutorFailure {
    /// Builds a failure with no partial evidence.
    #[must_use]
    pub fn new(kind: FailureKind, detail: &str) -> Self {
        Self {
            kind,
            detail: detail.to_string(),
            partial: Vec::new(),
        }
    }

    /// Attaches partial evidence.
    #[must_use]
    pub fn with_partial(mut self, partial: Vec<CapturedArtifact>) -> Self {
        self.partial = partial;
        self
    }
}

impl std::fmt::Display for ExecutorFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.detail)
    }
}

impl std::error::Error for ExecutorFailure {}

/// The seam the automation engine implements.
pub trait ActionExecutor {
    /// Performs one validated action, returning captured evidence.
    ///
    /// # Errors
    ///
    /// An [`ExecutorFailure`] carrying the classification, the original
    /// message, and any evidence captured before the fault.
    fn perform(&mut self, action: &SafeAction) -> Result<Vec<CapturedArtifact>, ExecutorFailure>;
}
