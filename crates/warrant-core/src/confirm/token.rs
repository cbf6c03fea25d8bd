//! The confirmation token record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::ts_millis;
use crate::crypto::{Hash, hash_hex};

/// Whether a token authorizes one action or one pre-validated batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum TokenKind {
    /// Authorizes exactly one action payload. 15-minute cap.
    Single,
    /// Authorizes one ordered batch of pre-validated actions.
    /// 30-minute cap.
    Batch,
}

impl TokenKind {
    /// Maximum `expires_at - issued_at` for this kind.
    #[must_use]
    pub fn max_lifetime(&self) -> Duration {
        match self {
            Self::Single => Duration::minutes(15),
            Self::Batch => Duration::minutes(30),
        }
    }

    /// Returns the persisted name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Batch => "BATCH",
        }
    }
}

/// A single-use, time-bound, cryptographically-bound authorization.
///
/// Immutable once minted; fields are private and construction happens
/// only through [`super::ConfirmationRegistry::mint`], which validates
/// the lifetime cap and computes the bound hash from the full payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationToken {
    confirmation_id: String,
    #[serde(with = "hash_hex")]
    bound_hash: Hash,
    #[serde(with = "ts_millis")]
    issued_at: DateTime<Utc>,
    #[serde(with = "ts_millis")]
    expires_at: DateTime<Utc>,
    actor_id: String,
    kind: TokenKind,
}

impl ConfirmationToken {
    /// Crate-internal constructor; the registry is the only minter.
    pub(crate) fn sealed(
        confirmation_id: String,
        bound_hash: Hash,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        actor_id: String,
        kind: TokenKind,
    ) -> Self {
        Self {
            confirmation_id,
            bound_hash,
            issued_at,
            expires_at,
            actor_id,
            kind,
        }
    }

    /// The token's identifier (canonical UUIDv4).
    #[must_use]
    pub fn confirmation_id(&self) -> &str {
        &self.confirmation_id
    }

    /// SHA-256 over the canonical encoding of the authorized payload.
    #[must_use]
    pub const fn bound_hash(&self) -> &Hash {
        &self.bound_hash
    }

    /// When the token was minted.
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// When the token stops being consumable.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// The human who authorized.
    #[must_use]
    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    /// Single or batch.
    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        self.kind
    }

    /// True when `now` is past expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Remaining lifetime at `now`; zero when expired.
    #[must_use]
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}
