//! Single-request enforcement at the base of every outbound path.
//!
//! Network adapters are not trusted to self-police single use. The
//! [`SingleRequestEnforcer`] owns an at-most-once request slot per
//! confirmation: the slot is acquired *before* any network operation,
//! held for the lifetime of the call, and dies on release — success or
//! failure. The same confirmation can never re-acquire.
//!
//! Ordering invariant for every externally-visible transmission:
//! validate expiry, consume the confirmation, *then* begin the network
//! call under the held slot. See [`crate::transport`] for the one place
//! that performs the full sequence.

use std::sync::Mutex;

use thiserror::Error;

use crate::validate::{IdKind, validate_uuid_v4};

/// Errors from slot acquisition.
#[derive(Debug, Error)]
pub enum EnforceError {
    /// The enforcer was built for a malformed confirmation id.
    #[error(transparent)]
    IdentifierInvalid(#[from] crate::validate::ValidateError),

    /// The slot was already taken or spent for this confirmation.
    ///
    /// Governance-class: the caller is attempting a second request under
    /// one authorization.
    #[error("request slot for confirmation {confirmation_id} is already {state}")]
    SlotUnavailable {
        /// The bound confirmation.
        confirmation_id: String,
        /// `"held"` or `"spent"`.
        state: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Available,
    Held,
    Spent,
}

/// At-most-once request slot bound to one confirmation id.
#[derive(Debug)]
pub struct SingleRequestEnforcer {
    confirmation_id: String,
    state: Mutex<SlotState>,
}

impl SingleRequestEnforcer {
    /// Creates an enforcer bound to `confirmation_id`.
    ///
    /// # Errors
    ///
    /// Rejects ids that are not canonical UUIDv4 — an enforcer must
    /// never be constructed around an unvalidated identifier.
    pub fn new(confirmation_id: &str) -> Result<Self, EnforceError> {
        validate_uuid_v4(confirmation_id, IdKind::Confirmation)?;
        Ok(Self {
            confirmation_id: confirmation_id.to_string(),
            state: Mutex::new(SlotState::Available),
        })
    }

    /// The confirmation this enforcer is bound to.
    #[must_use]
    pub fn confirmation_id(&self) -> &str {
        &self.confirmation_id
    }

    /// Acquires the single request slot.
    ///
    /// The returned guard must be held across the outbound call; when it
    /// drops, the slot is spent forever.
    ///
    /// # Errors
    ///
    /// [`EnforceError::SlotUnavailable`] when the slot was ever acquired
    /// before, including by a call that failed.
    pub fn acquire(&self) -> Result<RequestSlot<'_>, EnforceError> {
        let mut state = self.state.lock().expect("enforcer lock poisoned");
        match *state {
            SlotState::Available => {
                *state = SlotState::Held;
                Ok(RequestSlot { enforcer: self })
            },
            SlotState::Held => Err(EnforceError::SlotUnavailable {
                confirmation_id: self.confirmation_id.clone(),
                state: "held",
            }),
            SlotState::Spent => Err(EnforceError::SlotUnavailable {
                confirmation_id: self.confirmation_id.clone(),
                state: "spent",
            }),
        }
    }

    /// True once the slot has been released (the confirmation is dead).
    #[must_use]
    pub fn is_spent(&self) -> bool {
        *self.state.lock().expect("enforcer lock poisoned") == SlotState::Spent
    }
}

/// RAII guard for the held request slot.
///
/// Dropping the guard — on success, failure, or panic unwind — spends
/// the slot irreversibly.
#[derive(Debug)]
pub struct RequestSlot<'a> {
    enforcer: &'a SingleRequestEnforcer,
}

impl RequestSlot<'_> {
    /// The confirmation this slot belongs to.
    #[must_use]
    pub fn confirmation_id(&self) -> &str {
        &self.enforcer.confirmation_id
    }
}

impl Drop for RequestSlot<'_> {
    fn drop(&mut self) {
        let mut state = self
            .enforcer
            .state
            .lock()
            .expect("enforcer lock poisoned");
        *state = SlotState::Spent;
    }
}
