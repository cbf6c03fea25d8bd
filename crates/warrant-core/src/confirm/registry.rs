//! The process-wide confirmation registry.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::durable::FileBackedConsumeLog;
use super::token::{ConfirmationToken, TokenKind};
use super::ConfirmError;
use crate::actor::Actor;
use crate::canonical::{self, format_timestamp};
use crate::crypto::hashes_equal;
use crate::validate::{IdKind, new_id, validate_uuid_v4};

/// Witness that a confirmation was consumed.
///
/// Only [`ConfirmationRegistry::consume`] can mint one, and it is
/// neither cloneable nor constructible elsewhere. The transport layer
/// demands a receipt before opening any socket, which is what makes
/// the consume-before-network ordering structural rather than
/// conventional.
#[derive(Debug)]
pub struct ConsumptionReceipt {
    confirmation_id: String,
    consumed_at: DateTime<Utc>,
}

impl ConsumptionReceipt {
    /// The consumed confirmation.
    #[must_use]
    pub fn confirmation_id(&self) -> &str {
        &self.confirmation_id
    }

    /// When consumption happened.
    #[must_use]
    pub const fn consumed_at(&self) -> DateTime<Utc> {
        self.consumed_at
    }
}

/// Mints confirmation tokens and enforces single-use consumption.
///
/// The consumed set is process-wide and only ever grows. Under N
/// concurrent consumers of the same token, exactly one wins; the rest
/// observe [`ConfirmError::ReplayAttempt`]. There is deliberately no
/// reset, disable, or clear operation.
#[derive(Debug)]
pub struct ConfirmationRegistry {
    consumed: Mutex<HashSet<String>>,
    durable: Option<FileBackedConsumeLog>,
}

impl Default for ConfirmationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationRegistry {
    /// Creates a registry with an in-memory consumed set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            consumed: Mutex::new(HashSet::new()),
            durable: None,
        }
    }

    /// Creates a registry whose consumed set is additionally persisted
    /// to `log`, seeding the in-memory set from the replayed records.
    #[must_use]
    pub fn with_durable_log(log: FileBackedConsumeLog) -> Self {
        let seeded: HashSet<String> = log.replayed().iter().cloned().collect();
        Self {
            consumed: Mutex::new(seeded),
            durable: Some(log),
        }
    }

    /// Mints a token bound to `payload` on behalf of a human actor.
    ///
    /// The bound hash covers the canonical encoding of the *full*
    /// payload, parameters included, so any later substitution is
    /// detected at consume time. Expiry is `now` plus the kind's cap.
    ///
    /// # Errors
    ///
    /// [`ConfirmError::HumanConfirmationRequired`] when the actor is not
    /// a human identity; [`ConfirmError::Canonical`] if the payload
    /// cannot be encoded.
    pub fn mint<T: Serialize>(
        &self,
        payload: &T,
        actor: &Actor,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<ConfirmationToken, ConfirmError> {
        if !actor.can_authorize() {
            return Err(ConfirmError::HumanConfirmationRequired {
                actor_id: actor.actor_id().to_string(),
                actor_type: match actor.actor_type() {
                    crate::actor::ActorType::Human => "HUMAN",
                    crate::actor::ActorType::System => "SYSTEM",
                    crate::actor::ActorType::External => "EXTERNAL",
                },
            });
        }

        let bound_hash = canonical::digest(payload)?;
        let issued_at = canonical::truncate_to_millis(now);
        let expires_at = issued_at + kind.max_lifetime();

        let token = ConfirmationToken::sealed(
            new_id(),
            bound_hash,
            issued_at,
            expires_at,
            actor.actor_id().to_string(),
            kind,
        );

        tracing::info!(
            confirmation_id = token.confirmation_id(),
            actor = actor.actor_id(),
            kind = kind.as_str(),
            "confirmation minted"
        );

        Ok(token)
    }

    /// Consumes a token for `payload`, atomically and at most once.
    ///
    /// Checks run in a fixed order under the registry mutex:
    ///
    /// 1. the id is a canonical UUIDv4;
    /// 2. the id is not already consumed (replay);
    /// 3. the token is not expired — an expired token is *not* marked
    ///    consumed;
    /// 4. the payload's canonical digest equals the bound hash
    ///    (constant-time comparison);
    /// 5. the id enters the consumed set (durably first, when a consume
    ///    log is configured).
    ///
    /// # Errors
    ///
    /// One of [`ConfirmError::IdentifierInvalid`],
    /// [`ConfirmError::ReplayAttempt`], [`ConfirmError::TokenExpired`],
    /// [`ConfirmError::TokenTampered`], or a durable-log failure
    /// (fail closed).
    pub fn consume<T: Serialize>(
        &self,
        token: &ConfirmationToken,
        payload: &T,
        now: DateTime<Utc>,
    ) -> Result<ConsumptionReceipt, ConfirmError> {
        validate_uuid_v4(token.confirmation_id(), IdKind::Confirmation)?;

        let mut consumed = self.consumed.lock().expect("registry lock poisoned");

        if consumed.contains(token.confirmation_id()) {
            return Err(ConfirmError::ReplayAttempt {
                confirmation_id: token.confirmation_id().to_string(),
            });
        }

        if token.is_expired(now) {
            return Err(ConfirmError::TokenExpired {
                confirmation_id: token.confirmation_id().to_string(),
                expires_at: format_timestamp(&token.expires_at()),
            });
        }

        let presented = canonical::digest(payload)?;
        if !hashes_equal(&presented, token.bound_hash()) {
            return Err(ConfirmError::TokenTampered {
                confirmation_id: token.confirmation_id().to_string(),
            });
        }

        // Durable record lands before the in-memory insert; a crash in
        // between re-denies on replay, never re-allows.
        if let Some(ref durable) = self.durable {
            durable.record(token.confirmation_id())?;
        }
        consumed.insert(token.confirmation_id().to_string());

        tracing::info!(
            confirmation_id = token.confirmation_id(),
            "confirmation consumed"
        );
        Ok(ConsumptionReceipt {
            confirmation_id: token.confirmation_id().to_string(),
            consumed_at: canonical::truncate_to_millis(now),
        })
    }

    /// True when the id has been consumed.
    #[must_use]
    pub fn is_consumed(&self, confirmation_id: &str) -> bool {
        self.consumed
            .lock()
            .expect("registry lock poisoned")
            .contains(confirmation_id)
    }

    /// Number of consumed confirmations.
    #[must_use]
    pub fn consumed_count(&self) -> usize {
        self.consumed.lock().expect("registry lock poisoned").len()
    }
}
