//! Canonical UUIDv4 identifier validation.

use std::fmt;

use uuid::{Uuid, Variant, Version};

use super::ValidateError;

/// The identifier families accepted by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdKind {
    /// One browser-automation execution.
    Execution,
    /// One operator session.
    Session,
    /// One confirmation token.
    Confirmation,
    /// One platform submission.
    Submission,
    /// One execution manifest.
    Manifest,
}

impl IdKind {
    /// Returns the identifier family name used in error messages and
    /// audit records.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Session => "session",
            Self::Confirmation => "confirmation",
            Self::Submission => "submission",
            Self::Manifest => "manifest",
        }
    }
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substrings that must never appear in an identifier. These are checked
/// before UUID parsing so that an attacker-controlled id can never carry
/// traversal or injection payloads into an error message or a path join.
const DANGEROUS_ID_PATTERNS: &[&str] = &[
    "..", "/", "\\", "\0", "\n", "\r", "%2e", "%2f", "%5c", "%25",
];

/// Mints a fresh canonical (lowercase) UUIDv4 identifier.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Validates that `value` is a canonical UUIDv4.
///
/// Canonical means: 36 characters, lowercase hyphenated hex, version
/// nibble `4`, RFC-4122 variant bits. Uppercase input is rejected even
/// though it parses, because identifiers are embedded verbatim in
/// canonical encodings and on-disk layouts.
///
/// # Errors
///
/// Returns [`ValidateError::IdentifierInvalid`] describing the first
/// check that failed.
pub fn validate_uuid_v4(value: &str, kind: IdKind) -> Result<Uuid, ValidateError> {
    let fail = |reason: String| ValidateError::IdentifierInvalid { kind, reason };

    if value.is_empty() {
        return Err(fail("must not be empty".to_string()));
    }
    if value.len() != 36 {
        return Err(fail(format!("expected 36 chars, got {}", value.len())));
    }

    let lowered = value.to_ascii_lowercase();
    for pattern in DANGEROUS_ID_PATTERNS {
        if lowered.contains(pattern) {
            return Err(fail(format!("contains dangerous sequence {pattern:?}")));
        }
    }

    if value.bytes().any(|b| b.is_ascii_uppercase()) {
        return Err(fail("must be lowercase".to_string()));
    }

    let parsed =
        Uuid::try_parse(value).map_err(|e| fail(format!("not a UUID: {e}")))?;

    if parsed.get_version() != Some(Version::Random) {
        return Err(fail(format!(
            "version nibble is {:?}, expected 4",
            parsed.get_version_num()
        )));
    }
    if parsed.get_variant() != Variant::RFC4122 {
        return Err(fail("variant bits are not RFC 4122".to_string()));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshly_minted_ids_validate() {
        for _ in 0..32 {
            let id = new_id();
            validate_uuid_v4(&id, IdKind::Execution).unwrap();
        }
    }

    #[test]
    fn rejects_empty_and_short() {
        assert!(validate_uuid_v4("", IdKind::Session).is_err());
        assert!(validate_uuid_v4("abc", IdKind::Session).is_err());
    }

    #[test]
    fn rejects_uppercase() {
        let id = new_id().to_uppercase();
        let err = validate_uuid_v4(&id, IdKind::Confirmation).unwrap_err();
        assert!(err.to_string().contains("confirmation"));
    }

    #[test]
    fn rejects_wrong_version() {
        // UUIDv1-shaped: version nibble 1.
        let v1 = "f81d4fae-7dec-11d0-a765-00a0c91e6bf6";
        assert!(validate_uuid_v4(v1, IdKind::Manifest).is_err());
    }

    #[test]
    fn rejects_nil_uuid() {
        assert!(validate_uuid_v4("00000000-0000-0000-0000-000000000000", IdKind::Execution).is_err());
    }

    #[test]
    fn rejects_traversal_payloads() {
        assert!(validate_uuid_v4("../../etc/passwd-0000000000000000000", IdKind::Execution).is_err());
        assert!(validate_uuid_v4("%2e%2e%2f-0000-4000-8000-000000000000", IdKind::Execution).is_err());
    }

    #[test]
    fn rejects_embedded_control_bytes() {
        let mut id = new_id();
        id.replace_range(0..1, "\n");
        assert!(validate_uuid_v4(&id, IdKind::Submission).is_err());
    }
}
