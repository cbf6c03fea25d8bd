//! # warrant-core
//!
//! Governance core for a human-authorized security-testing toolkit.
//!
//! Every state-changing or externally-visible action — executing a browser
//! operation against a target, transmitting a report to a platform,
//! exporting evidence, decommissioning the system — must be preceded by a
//! cryptographically-bound, single-use human confirmation, and every
//! outcome is recorded in tamper-evident, hash-chained audit logs.
//!
//! ## Subsystems
//!
//! - **Confirmation lifecycle** ([`confirm`]): mint, bind, expire, and
//!   consume single-use confirmation tokens under a process-wide registry.
//! - **Hash-chained audit** ([`audit`]): append-only SHA-256 linked logs,
//!   one per subsystem, with end-to-end verification.
//! - **Submission state machine** ([`submission`]): closed transition
//!   tables with terminal absorption.
//! - **Evidence governance** ([`evidence`], [`redact`], [`validate`]):
//!   path-confined, secret-redacted artifact bundles chained through
//!   execution manifests.
//!
//! The [`orchestrator`] module is the front door that wires these together;
//! nothing below it exposes an unconfirmed outbound path.
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use warrant_core::actor::{Actor, ActorType, Role};
//! use warrant_core::confirm::{ConfirmationRegistry, TokenKind};
//!
//! let registry = ConfirmationRegistry::new();
//! let operator = Actor::new("op-1", "Operator One", ActorType::Human, Role::Operator);
//! let payload = serde_json::json!({"action_type": "NAVIGATE", "target": "https://example.org"});
//!
//! let now = Utc::now();
//! let token = registry.mint(&payload, &operator, TokenKind::Single, now).unwrap();
//! registry.consume(&token, &payload, now).unwrap();
//! assert!(registry.is_consumed(token.confirmation_id()));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod actor;
pub mod audit;
pub mod canonical;
pub mod config;
pub mod confirm;
pub mod crypto;
pub mod duplicate;
pub mod enforce;
pub mod evidence;
pub mod orchestrator;
pub mod redact;
pub mod request;
pub mod submission;
pub mod transport;
pub mod validate;

/// Prelude for the common governance types.
pub mod prelude {
    pub use crate::actor::{Actor, ActorType, Operation, Role};
    pub use crate::audit::{AuditLog, AuditOutcome, LogScope};
    pub use crate::confirm::{ConfirmationRegistry, ConfirmationToken, TokenKind};
    pub use crate::crypto::{HASH_SIZE, Hash, ZERO_HASH};
    pub use crate::evidence::{ArtifactKind, EvidenceBundle, ManifestStore};
    pub use crate::orchestrator::Orchestrator;
    pub use crate::submission::SubmissionStatus;
}
