//! Human-initiation envelope gathering.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Context;
use warrant_core::request::HumanInitiation;

/// Reads and validates an attestation file.
///
/// The file must deserialize to a [`HumanInitiation`] whose
/// `human_initiated` is literally `true` — the deserializer enforces
/// that, so a doctored envelope fails to parse at all.
pub fn read_attestation(path: &Path) -> anyhow::Result<HumanInitiation> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading attestation {}", path.display()))?;
    let initiation: HumanInitiation = serde_json::from_str(&raw)
        .with_context(|| format!("attestation {} is not a valid envelope", path.display()))?;
    initiation.validate()?;
    Ok(initiation)
}

/// Prompts the operator on the TTY and builds the envelope from their
/// typed confirmation.
pub fn prompt_interactive(command: &str, timestamp_millis: i64) -> anyhow::Result<HumanInitiation> {
    prompt_from(
        command,
        timestamp_millis,
        &mut std::io::stdin().lock(),
        &mut std::io::stderr(),
    )
}

/// Testable inner prompt: reads one line, requires a literal `yes`.
pub fn prompt_from<R: BufRead, W: Write>(
    command: &str,
    timestamp_millis: i64,
    input: &mut R,
    output: &mut W,
) -> anyhow::Result<HumanInitiation> {
    write!(output, "About to run `{command}`. Type 'yes' to confirm: ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    if line.trim() != "yes" {
        anyhow::bail!("operator declined {command}");
    }

    let initiation = HumanInitiation::new(&format!("cli:{command}"), timestamp_millis);
    initiation.validate()?;
    Ok(initiation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_yes_builds_envelope() {
        let mut input = std::io::Cursor::new(b"yes\n".to_vec());
        let mut output = Vec::new();
        let envelope = prompt_from("seal-phase", 1_767_225_600_000, &mut input, &mut output).unwrap();
        assert!(envelope.human_initiated);
        assert_eq!(envelope.element_id, "cli:seal-phase");
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("seal-phase"));
    }

    #[test]
    fn anything_else_declines() {
        for answer in ["no\n", "y\n", "\n", "YES!\n"] {
            let mut input = std::io::Cursor::new(answer.as_bytes().to_vec());
            let mut output = Vec::new();
            assert!(prompt_from("decommission", 0, &mut input, &mut output).is_err());
        }
    }

    #[test]
    fn attestation_file_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("attest.json");
        std::fs::write(
            &path,
            r#"{"human_initiated": true, "timestamp_millis": 1767225600000, "element_id": "approve-btn"}"#,
        )
        .unwrap();
        let envelope = read_attestation(&path).unwrap();
        assert_eq!(envelope.element_id, "approve-btn");
    }

    #[test]
    fn false_attestation_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("attest.json");
        std::fs::write(
            &path,
            r#"{"human_initiated": false, "timestamp_millis": 1, "element_id": "x"}"#,
        )
        .unwrap();
        assert!(read_attestation(&path).is_err());
    }
}
