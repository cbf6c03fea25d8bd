//! The single canonical encoding used for every digest in the core.
//!
//! # Design
//!
//! Hash chains are only as good as the agreement between writer and
//! verifier on the exact bytes that were hashed. Every subsystem
//! (audit, confirmation binding, manifests) therefore goes through this
//! one encoding:
//!
//! - JSON with keys in lexicographic order (maps are `BTreeMap`-backed),
//! - UTF-8, compact separators,
//! - timestamps as ISO-8601 UTC with fixed millisecond precision,
//! - absent references encoded as explicit `null`, never omitted.
//!
//! A record's digest is SHA-256 over its canonical bytes; chained records
//! digest the canonical bytes of everything *except* their own hash field.

use chrono::{DateTime, SecondsFormat, TimeZone, Timelike, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::crypto::{Hash, sha256};

/// Canonical timestamp layout: ISO-8601 UTC, exactly three fractional
/// digits, `Z` suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Errors from canonical encoding.
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// The value could not be serialized to JSON.
    #[error("canonical serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A timestamp string did not match the canonical layout.
    #[error("non-canonical timestamp {value:?}")]
    BadTimestamp {
        /// The offending input.
        value: String,
    },

    /// The named hash field was absent when computing a chained preimage.
    #[error("record has no field {field:?} to exclude from its preimage")]
    MissingHashField {
        /// The field that was expected.
        field: &'static str,
    },
}

/// Formats a timestamp in the canonical layout.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a canonical timestamp.
///
/// # Errors
///
/// Returns [`CanonicalError::BadTimestamp`] when the input is not
/// RFC 3339 UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, CanonicalError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CanonicalError::BadTimestamp {
            value: s.to_string(),
        })
}

/// Truncates a timestamp to millisecond precision.
///
/// Records store timestamps already truncated so that
/// `decode(encode(r)) == r` holds exactly.
#[must_use]
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    let millis = ts.timestamp_subsec_millis();
    ts.with_nanosecond(millis * 1_000_000).unwrap_or(ts)
}

/// Returns the current UTC time at canonical (millisecond) precision.
#[must_use]
pub fn now() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

/// Serde adapter storing a timestamp at fixed millisecond precision.
pub mod ts_millis {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{DateTime, Utc, format_timestamp, parse_timestamp};

    /// Serializes in the canonical layout.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&format_timestamp(ts))
    }

    /// Deserializes from the canonical layout.
    ///
    /// # Errors
    ///
    /// Rejects non-RFC-3339 input.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(de)?;
        parse_timestamp(&s).map_err(serde::de::Error::custom)
    }
}

/// Encodes `value` as canonical JSON text.
///
/// `serde_json`'s map type is `BTreeMap`-backed, so object keys come out
/// lexicographically sorted; routing through [`Value`] applies that
/// ordering to struct fields as well.
///
/// # Errors
///
/// Returns [`CanonicalError::Serialize`] if the value cannot be
/// represented as JSON.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let tree = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&tree)?)
}

/// Computes the SHA-256 digest of the canonical encoding of `value`.
///
/// # Errors
///
/// Propagates [`CanonicalError::Serialize`].
pub fn digest<T: Serialize>(value: &T) -> Result<Hash, CanonicalError> {
    Ok(sha256(to_canonical_json(value)?.as_bytes()))
}

/// Computes the digest of `value` with the top-level field `exclude`
/// removed — the preimage form for self-hashing chained records.
///
/// # Errors
///
/// Returns [`CanonicalError::MissingHashField`] if `exclude` is not a
/// field of the serialized record; a typo here would silently change
/// every digest, so absence is treated as a defect.
pub fn digest_without_field<T: Serialize>(
    value: &T,
    exclude: &'static str,
) -> Result<Hash, CanonicalError> {
    let mut tree = serde_json::to_value(value)?;
    match tree {
        Value::Object(ref mut map) => {
            if map.remove(exclude).is_none() {
                return Err(CanonicalError::MissingHashField { field: exclude });
            }
        },
        _ => return Err(CanonicalError::MissingHashField { field: exclude }),
    }
    Ok(sha256(serde_json::to_string(&tree)?.as_bytes()))
}

/// Convenience constructor for a canonical timestamp from Unix millis.
///
/// Used by tests and the CLI envelope plumbing.
#[must_use]
pub fn from_unix_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
