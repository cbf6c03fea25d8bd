//! Individual evidence artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EvidenceError;
use crate::canonical::{self, ts_millis};
use crate::crypto::{Hash, hash_hex, sha256};
use crate::validate::validate_relative_path;

/// The artifact kinds captured during an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ArtifactKind {
    /// HTTP archive of observed traffic. Unique per bundle.
    Har,
    /// Page screenshot. Repeatable.
    Screenshot,
    /// Screen recording. Unique per bundle.
    Video,
    /// Browser console output. Repeatable.
    ConsoleLog,
    /// Step-by-step execution trace. Unique per bundle.
    Trace,
}

impl ArtifactKind {
    /// Returns the persisted name of this kind (also the on-disk
    /// directory segment: `{root}/{execution_id}/{kind}/{file}`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Har => "har",
            Self::Screenshot => "screenshot",
            Self::Video => "video",
            Self::ConsoleLog => "console_log",
            Self::Trace => "trace",
        }
    }

    /// True for kinds of which a bundle may hold at most one.
    #[must_use]
    pub const fn is_unique_per_bundle(&self) -> bool {
        matches!(self, Self::Har | Self::Video | Self::Trace)
    }

    /// True for textual kinds that pass through the redactor.
    #[must_use]
    pub const fn is_textual(&self) -> bool {
        matches!(self, Self::Har | Self::ConsoleLog | Self::Trace)
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured, content-hashed artifact.
///
/// Immutable; the constructor validates the relative path before
/// anything else happens, so an artifact with a traversal path cannot
/// exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    /// Path relative to the artifact root.
    pub relative_path: String,
    /// SHA-256 over the final (post-redaction) bytes.
    #[serde(with = "hash_hex")]
    pub sha256: Hash,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Size of the final bytes.
    pub bytes_len: u64,
    /// Capture time.
    #[serde(with = "ts_millis")]
    pub captured_at: DateTime<Utc>,
}

impl EvidenceArtifact {
    /// Builds an artifact over `content`, validating the path first.
    ///
    /// # Errors
    ///
    /// [`EvidenceError::Path`] when the relative path is absolute,
    /// contains traversal, or carries encoded attack sequences. No I/O
    /// happens before that check.
    pub fn new(
        relative_path: &str,
        kind: ArtifactKind,
        content: &[u8],
        captured_at: DateTime<Utc>,
    ) -> Result<Self, EvidenceError> {
        validate_relative_path(relative_path)?;
        Ok(Self {
            relative_path: relative_path.to_string(),
            sha256: sha256(content),
            kind,
            bytes_len: content.len() as u64,
            captured_at: canonical::truncate_to_millis(captured_at),
        })
    }
}
