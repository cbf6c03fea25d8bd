//! Artifact path validation and root confinement.
//!
//! Checks run in two stages. [`validate_relative_path`] is purely
//! lexical and rejects absolute paths, traversal components, control
//! bytes, and their percent-encoded or overlong-UTF-8 disguises.
//! [`confine_to_root`] then resolves the path under the artifact root
//! and refuses symlink escapes discovered on resolution.

use std::path::{Component, Path, PathBuf};

use super::ValidateError;

/// Lowercased substrings that mark an encoded traversal or injection
/// attempt. Checked against the raw input and against one round of
/// percent-decoding.
const ENCODED_ATTACK_PATTERNS: &[&str] = &[
    "%2e%2e", // encoded ".."
    "%2f",    // encoded "/"
    "%5c",    // encoded "\"
    "%252e",  // double-encoded "."
    "%c0%af", // overlong UTF-8 "/"
    "%c1%9c", // overlong UTF-8 "\"
];

fn reject(path: &str, reason: impl Into<String>) -> ValidateError {
    ValidateError::PathTraversal {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Decodes one round of percent-encoding, byte-wise, ignoring malformed
/// escapes. Used only for screening; the original string is what gets
/// resolved.
fn percent_decode_lossy(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(hex) = bytes.get(i + 1..i + 3) {
                if let Ok(s) = std::str::from_utf8(hex) {
                    if let Ok(b) = u8::from_str_radix(s, 16) {
                        out.push(b);
                        i += 3;
                        continue;
                    }
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Validates that `raw` is a safe relative path.
///
/// Rejects, in order: empty input; embedded NUL/CR/LF; absolute paths
/// (leading `/` or `\`, or a `X:` drive prefix); any `..` component;
/// percent-encoded traversal sequences in the raw input or after one
/// round of decoding.
///
/// # Errors
///
/// Returns [`ValidateError::PathTraversal`] naming the failed check.
pub fn validate_relative_path(raw: &str) -> Result<(), ValidateError> {
    if raw.trim().is_empty() {
        return Err(reject(raw, "empty path"));
    }
    if raw.contains('\0') || raw.contains('\n') || raw.contains('\r') {
        return Err(reject(raw, "control byte in path"));
    }
    if raw.starts_with('/') || raw.starts_with('\\') {
        return Err(reject(raw, "absolute path"));
    }
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(reject(raw, "drive-prefixed path"));
    }

    let lowered = raw.to_ascii_lowercase();
    let decoded = percent_decode_lossy(&lowered);
    for pattern in ENCODED_ATTACK_PATTERNS {
        if lowered.contains(pattern) {
            return Err(reject(raw, format!("encoded sequence {pattern:?}")));
        }
    }
    if decoded.contains("..") {
        return Err(reject(raw, "encoded parent-directory traversal"));
    }

    for component in Path::new(raw).components() {
        match component {
            Component::ParentDir => {
                return Err(reject(raw, "parent-directory component"));
            },
            Component::RootDir | Component::Prefix(_) => {
                return Err(reject(raw, "absolute component"));
            },
            Component::CurDir | Component::Normal(_) => {},
        }
    }

    // Backslash separators are not path separators on Unix, so `..\` would
    // survive the component walk above. Screen the raw text too.
    if raw.contains("..") {
        return Err(reject(raw, "parent-directory traversal"));
    }

    Ok(())
}

/// Resolves `relative` under `root` and verifies strict containment.
///
/// `root` must exist; the joined path need not. If any existing ancestor
/// of the joined path resolves (through symlinks) to a location outside
/// the canonicalized root, the path is rejected. Nothing is created or
/// written here.
///
/// # Errors
///
/// Returns [`ValidateError::PathTraversal`] on lexical rejection, a
/// non-resolvable root, or a symlink escape.
pub fn confine_to_root(root: &Path, relative: &str) -> Result<PathBuf, ValidateError> {
    validate_relative_path(relative)?;

    let canonical_root = root
        .canonicalize()
        .map_err(|e| reject(relative, format!("artifact root not resolvable: {e}")))?;

    let joined = canonical_root.join(relative);

    // Resolve the deepest existing ancestor; symlinked parents must still
    // land inside the root.
    let mut probe = joined.clone();
    let resolved_ancestor = loop {
        if probe.exists() {
            break probe
                .canonicalize()
                .map_err(|e| reject(relative, format!("resolution failed: {e}")))?;
        }
        match probe.parent() {
            Some(parent) => probe = parent.to_path_buf(),
            None => break canonical_root.clone(),
        }
    };

    if !resolved_ancestor.starts_with(&canonical_root) {
        return Err(reject(relative, "resolves outside the artifact root"));
    }
    if joined == canonical_root {
        return Err(reject(relative, "resolves to the artifact root itself"));
    }

    Ok(joined)
}
