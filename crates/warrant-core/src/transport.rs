//! The gated transmission seam.
//!
//! # Design
//!
//! Single-use consumption lives below every outbound path; there is no
//! uncontrolled function an adapter could reach. [`send_authorized`]
//! demands a [`ConsumptionReceipt`] — the witness only
//! [`ConfirmationRegistry::consume`] can mint — before any socket
//! exists, which makes the ordering
//!
//! > validate expiry → consume → begin network call
//!
//! structural: code that has not consumed cannot call. The convenience
//! wrapper [`transmit_gated`] performs the whole sequence in one step
//! for callers with nothing to do between consumption and the call.
//!
//! Retries happen only *inside* the held request slot, only for
//! 429/5xx/connect failures, and only within a budget strictly below
//! the token's lifetime. Once the slot releases — success or failure —
//! the confirmation is dead and a retry needs a fresh human
//! authorization.
//!
//! Adapters are not trusted to self-police the one-request rule.
//! Every [`TransmitAttempt`] carries a request counter; the adapter
//! must call [`TransmitAttempt::begin_request`] immediately before
//! each physical outbound request, and a second registration within
//! one attempt is an architectural violation. After the adapter
//! returns, the counter is checked again: zero registrations on a
//! success (a bypassed counter) and more than one registration
//! (a swallowed violation) both hard-stop the submission. Response
//! plumbing keys on the attempt id, never on URL equality, so
//! concurrent requests to one URL cannot be mis-paired.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::{EndpointConfig, RetryConfig};
use crate::confirm::{ConfirmError, ConfirmationRegistry, ConfirmationToken, ConsumptionReceipt};
use crate::enforce::{EnforceError, SingleRequestEnforcer};

/// Errors from the transmission seam.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Confirmation-side failure (expired, replayed, tampered).
    #[error(transparent)]
    Confirm(#[from] ConfirmError),

    /// Request-slot failure.
    #[error(transparent)]
    Enforce(#[from] EnforceError),

    /// The connection could not be established. Retryable.
    #[error("connection failed: {detail}")]
    Connect {
        /// Failure detail.
        detail: String,
    },

    /// The platform answered with an HTTP error status.
    #[error("platform returned status {code}")]
    HttpStatus {
        /// The status code.
        code: u16,
    },

    /// The response did not match the declared schema.
    ///
    /// Missing required fields are fatal; unknown fields become
    /// warnings attached to the acknowledgement instead.
    #[error("response validation failed: {detail}")]
    ResponseValidation {
        /// What was missing or malformed.
        detail: String,
    },

    /// The retry budget ran out. Fatal; not retried without fresh
    /// authorization.
    #[error("retry budget exhausted after {attempts} attempts")]
    RetryExhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// The adapter broke a structural rule: a receipt for a different
    /// confirmation, a second outbound request within one attempt, or
    /// a request that was never registered on the attempt counter.
    #[error("architectural violation: {detail}")]
    ArchitecturalViolation {
        /// What went wrong.
        detail: String,
    },
}

impl TransportError {
    /// True for failures worth retrying inside the held slot.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Connect { .. } => true,
            Self::HttpStatus { code } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

/// Platform acknowledgement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AckStatus {
    /// The platform accepted the submission.
    Accepted,
    /// The platform rejected it.
    Rejected,
}

/// Validated platform response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformAck {
    /// The platform's reference for the submission.
    pub submission_ref: String,
    /// Accepted or rejected.
    pub status: AckStatus,
    /// Non-blocking schema warnings (unknown fields).
    pub warnings: Vec<String>,
}

/// One attempt handed to an adapter, carrying the outbound request
/// counter for that attempt.
#[derive(Debug)]
pub struct TransmitAttempt<'a> {
    /// Unique id for this attempt; response matching keys on this.
    pub attempt_id: String,
    /// Destination endpoint (HTTPS, validated at config time).
    pub endpoint: &'a EndpointConfig,
    /// The confirmed draft bytes.
    pub draft_bytes: &'a [u8],
    requests: AtomicU32,
}

impl<'a> TransmitAttempt<'a> {
    fn new(endpoint: &'a EndpointConfig, draft_bytes: &'a [u8]) -> Self {
        Self {
            attempt_id: crate::validate::new_id(),
            endpoint,
            draft_bytes,
            requests: AtomicU32::new(0),
        }
    }

    /// Registers one outbound request on this attempt.
    ///
    /// Adapters must call this immediately before each physical
    /// request they send. Exactly one registration is permitted per
    /// attempt; the counter is never reset.
    ///
    /// # Errors
    ///
    /// [`TransportError::ArchitecturalViolation`] on a second
    /// registration. The adapter must abort instead of sending; even
    /// if it swallows the error and sends anyway, the registration is
    /// already recorded and the post-call check hard-stops the
    /// submission.
    pub fn begin_request(&self) -> Result<(), TransportError> {
        let previous = self.requests.fetch_add(1, Ordering::SeqCst);
        if previous >= 1 {
            return Err(TransportError::ArchitecturalViolation {
                detail: format!(
                    "adapter attempted outbound request {} under attempt {}; \
                     exactly one is permitted",
                    previous + 1,
                    self.attempt_id
                ),
            });
        }
        tracing::debug!(attempt_id = %self.attempt_id, "outbound request registered");
        Ok(())
    }

    /// Outbound requests registered on this attempt so far.
    #[must_use]
    pub fn request_count(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

/// A platform adapter: performs exactly one outbound request per
/// `submit` call and returns the raw response document.
///
/// Implementations must call [`TransmitAttempt::begin_request`] before
/// the physical request. The seam verifies the count after every
/// `submit` return, so neither skipping the registration nor sending
/// twice can go unnoticed.
pub trait PlatformAdapter {
    /// Performs the single outbound request for `attempt`.
    ///
    /// # Errors
    ///
    /// [`TransportError::Connect`] / [`TransportError::HttpStatus`] for
    /// transport-level failures.
    fn submit(&mut self, attempt: &TransmitAttempt<'_>) -> Result<Value, TransportError>;
}

/// Validates a raw platform response against the declared schema.
///
/// Required: `submission_ref` (string) and `status`
/// (`"accepted"`/`"rejected"`). Unknown top-level fields become
/// warnings; missing required fields are fatal.
///
/// # Errors
///
/// [`TransportError::ResponseValidation`] naming the missing or
/// malformed field.
pub fn validate_response(raw: &Value) -> Result<PlatformAck, TransportError> {
    let object = raw
        .as_object()
        .ok_or_else(|| TransportError::ResponseValidation {
            detail: "response is not an object".to_string(),
        })?;

    let submission_ref = object
        .get("submission_ref")
        .and_then(Value::as_str)
        .ok_or_else(|| TransportError::ResponseValidation {
            detail: "missing required field submission_ref".to_string(),
        })?
        .to_string();

    let status = match object.get("status").and_then(Value::as_str) {
        Some("accepted") => AckStatus::Accepted,
        Some("rejected") => AckStatus::Rejected,
        Some(other) => {
            return Err(TransportError::ResponseValidation {
                detail: format!("unknown status {other:?}"),
            });
        },
        None => {
            return Err(TransportError::ResponseValidation {
                detail: "missing required field status".to_string(),
            });
        },
    };

    let mut warnings = Vec::new();
    for key in object.keys() {
        if key != "submission_ref" && key != "status" {
            let warning = format!("unexpected response field {key:?}");
            tracing::warn!(field = %key, "unexpected platform response field");
            warnings.push(warning);
        }
    }

    Ok(PlatformAck {
        submission_ref,
        status,
        warnings,
    })
}

/// Sends `draft_bytes` under an already-consumed confirmation.
///
/// The receipt must belong to `token`; the expiry is re-checked here
/// because time may have passed since consumption. The single request
/// slot is acquired before the first adapter call and is dead when
/// this function returns, whatever happened.
///
/// # Errors
///
/// Slot, transport, schema, and budget failures.
pub fn send_authorized<A: PlatformAdapter>(
    token: &ConfirmationToken,
    receipt: &ConsumptionReceipt,
    draft_bytes: &[u8],
    endpoint: &EndpointConfig,
    retry: &RetryConfig,
    adapter: &mut A,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<PlatformAck, TransportError> {
    if receipt.confirmation_id() != token.confirmation_id() {
        return Err(TransportError::ArchitecturalViolation {
            detail: format!(
                "receipt for {} presented with token {}",
                receipt.confirmation_id(),
                token.confirmation_id()
            ),
        });
    }
    if token.is_expired(now) {
        return Err(TransportError::Confirm(ConfirmError::TokenExpired {
            confirmation_id: token.confirmation_id().to_string(),
            expires_at: crate::canonical::format_timestamp(&token.expires_at()),
        }));
    }

    let enforcer = SingleRequestEnforcer::new(token.confirmation_id())?;
    let slot = enforcer.acquire()?;

    let started = Instant::now();
    let budget = retry.total_budget().to_std().unwrap_or_default();
    let mut attempts = 0u32;

    let outcome = loop {
        attempts += 1;
        let attempt = TransmitAttempt::new(endpoint, draft_bytes);
        let submitted = adapter.submit(&attempt);

        // The adapter is not trusted: whatever it returned, more than
        // one registered request under this attempt is a double-send
        // and hard-stops the submission.
        let requests = attempt.request_count();
        if requests > 1 {
            break Err(TransportError::ArchitecturalViolation {
                detail: format!(
                    "adapter registered {requests} outbound requests under attempt {}; \
                     exactly one is permitted",
                    attempt.attempt_id
                ),
            });
        }

        match submitted {
            Ok(raw) => {
                // A success with no registered request means the
                // adapter bypassed the counter entirely.
                if requests == 0 {
                    break Err(TransportError::ArchitecturalViolation {
                        detail: format!(
                            "adapter reported success without registering an outbound \
                             request under attempt {}",
                            attempt.attempt_id
                        ),
                    });
                }
                break validate_response(&raw);
            },
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    attempt = attempts,
                    requests,
                    error = %e,
                    "transient transmission failure"
                );
                if attempts >= retry.max_attempts || started.elapsed() >= budget {
                    break Err(TransportError::RetryExhausted { attempts });
                }
                let backoff = retry
                    .backoff_base_millis
                    .saturating_mul(1u64 << (attempts - 1).min(8));
                std::thread::sleep(std::time::Duration::from_millis(backoff));
                if started.elapsed() >= budget {
                    break Err(TransportError::RetryExhausted { attempts });
                }
            },
            Err(e) => break Err(e),
        }
    };

    drop(slot);
    outcome
}

/// Consumes `token` for `payload` and immediately transmits.
///
/// # Errors
///
/// Confirmation errors (expired, replayed, tampered) before anything
/// happens; transport errors after the slot is held. Every failure
/// leaves the confirmation dead.
#[allow(clippy::too_many_arguments)]
pub fn transmit_gated<T: Serialize, A: PlatformAdapter>(
    registry: &ConfirmationRegistry,
    token: &ConfirmationToken,
    payload: &T,
    draft_bytes: &[u8],
    endpoint: &EndpointConfig,
    retry: &RetryConfig,
    adapter: &mut A,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<PlatformAck, TransportError> {
    if token.is_expired(now) {
        return Err(TransportError::Confirm(ConfirmError::TokenExpired {
            confirmation_id: token.confirmation_id().to_string(),
            expires_at: crate::canonical::format_timestamp(&token.expires_at()),
        }));
    }
    let receipt = registry.consume(token, payload, now)?;
    send_authorized(token, &receipt, draft_bytes, endpoint, retry, adapter, now)
}
