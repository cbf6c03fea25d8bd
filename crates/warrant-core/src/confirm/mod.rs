//! Confirmation token lifecycle: mint, bind, expire, consume.
//!
//! # Design
//!
//! A [`ConfirmationToken`] is minted on an explicit human act and bound
//! to the SHA-256 digest of the canonical encoding of the payload it
//! authorizes. Consumption is serialized under a process-wide mutex and
//! checks, in order: identifier validity, replay, expiry, and payload
//! binding. The consumed set only grows — there is no reset, disable,
//! or clear operation, by construction.
//!
//! When a durable consume log is configured, the consumed id is fsynced
//! to an append-only, exclusively-locked file *before* the in-memory
//! insert, so a crash between the two can only err on the side of
//! refusing a reuse.

mod durable;
mod registry;
mod token;

pub use durable::FileBackedConsumeLog;
pub use registry::{ConfirmationRegistry, ConsumptionReceipt};
use thiserror::Error;
pub use token::{ConfirmationToken, TokenKind};

use crate::validate::ValidateError;

/// Errors from the confirmation lifecycle.
#[derive(Debug, Error)]
pub enum ConfirmError {
    /// The confirmation id is not a canonical UUIDv4.
    #[error(transparent)]
    IdentifierInvalid(#[from] ValidateError),

    /// The token id is already in the consumed set.
    #[error("replay attempt: confirmation {confirmation_id} was already consumed")]
    ReplayAttempt {
        /// The replayed id.
        confirmation_id: String,
    },

    /// The token is past its expiry.
    #[error("confirmation {confirmation_id} expired at {expires_at}")]
    TokenExpired {
        /// The expired id.
        confirmation_id: String,
        /// When it expired (canonical encoding).
        expires_at: String,
    },

    /// The presented payload does not match the token's bound hash.
    #[error("confirmation {confirmation_id} is bound to a different payload")]
    TokenTampered {
        /// The id whose binding failed.
        confirmation_id: String,
    },

    /// A non-human actor attempted to mint a confirmation.
    #[error("actor {actor_id} ({actor_type}) cannot authorize externally-visible effects")]
    HumanConfirmationRequired {
        /// The refusing actor.
        actor_id: String,
        /// Its type, for the audit record.
        actor_type: &'static str,
    },

    /// The payload could not be canonically encoded for binding.
    #[error(transparent)]
    Canonical(#[from] crate::canonical::CanonicalError),

    /// The durable consume log failed; fail closed.
    #[error("durable consume log failure: {0}")]
    Durable(#[from] std::io::Error),

    /// The durable consume log contains an unreadable record.
    #[error("corrupt consume log entry at line {line}: {reason}")]
    CorruptConsumeLog {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },
}
