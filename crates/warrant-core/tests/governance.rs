//! End-to-end governance scenarios: concurrency, replay, expiry,
//! traversal, redaction, state closure, and chain tampering.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tempfile::TempDir;
use warrant_core::actor::{Actor, ActorType, Operation, Role};
use warrant_core::audit::AuditOutcome;
use warrant_core::canonical;
use warrant_core::config::{EndpointConfig, GovernanceConfig};
use warrant_core::confirm::{ConfirmError, TokenKind};
use warrant_core::crypto::sha256;
use warrant_core::evidence::{ArtifactKind, EvidenceBundleBuilder, ManifestStore};
use warrant_core::orchestrator::{
    ActionExecutor, CallerContext, CapturedArtifact, ExecutorFailure, FailureKind, Orchestrator,
    OrchestratorError,
};
use warrant_core::redact::SecretRedactor;
use warrant_core::request::{ActionRequest, SafeAction, SubmissionRequest};
use warrant_core::submission::{SubmissionStatus, SubmissionStore, SubmissionRecord};
use warrant_core::transport::{PlatformAdapter, TransmitAttempt, TransportError};
use warrant_core::validate::new_id;

fn t0() -> DateTime<Utc> {
    canonical::parse_timestamp("2026-03-01T09:00:00.000Z").unwrap()
}

fn operator() -> Actor {
    Actor::new("op-1", "Operator One", ActorType::Human, Role::Operator)
}

fn caller() -> CallerContext {
    CallerContext {
        actor: operator(),
        session_id: new_id(),
    }
}

fn session_caller(orch: &Orchestrator) -> CallerContext {
    let actor = operator();
    let session_id = orch.start_session(&actor, t0()).unwrap();
    CallerContext { actor, session_id }
}

fn orchestrator(root: &TempDir) -> Orchestrator {
    let config = GovernanceConfig::new(root.path()).with_endpoint(
        EndpointConfig::new("https://api.example.com/v1", "generic").unwrap(),
    );
    Orchestrator::new(config).unwrap()
}

fn submission_request(draft: &[u8]) -> SubmissionRequest {
    SubmissionRequest {
        decision_id: "decision-7".to_string(),
        platform_tag: "generic".to_string(),
        draft_content_hash: sha256(draft),
        override_duplicate: false,
    }
}

/// Adapter that accepts everything.
struct AcceptingAdapter;

impl PlatformAdapter for AcceptingAdapter {
    fn submit(&mut self, attempt: &TransmitAttempt<'_>) -> Result<serde_json::Value, TransportError> {
        attempt.begin_request()?;
        Ok(json!({"submission_ref": "plat-1", "status": "accepted"}))
    }
}

// ===========================================================================
// Scenario 1: replay blocked under concurrency
// ===========================================================================

#[test]
fn replay_blocked_under_concurrency() {
    let root = TempDir::new().unwrap();
    let orch = Arc::new(orchestrator(&root));

    let draft = b"# Report\nXSS on /search".to_vec();
    let request = submission_request(&draft);
    let token = orch
        .authorize(&operator(), Operation::Transmit, &request, TokenKind::Single, t0())
        .unwrap();
    assert_eq!(token.expires_at() - token.issued_at(), Duration::minutes(15));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let orch = Arc::clone(&orch);
        let request = request.clone();
        let draft = draft.clone();
        let token = token.clone();
        handles.push(std::thread::spawn(move || {
            orch.transmit(&caller(), &request, &draft, &token, &mut AcceptingAdapter, t0())
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
    let replays = results
        .iter()
        .filter(|r| {
            matches!(
                r,
                Err(OrchestratorError::Confirm(ConfirmError::ReplayAttempt { .. }))
            )
        })
        .count();

    assert_eq!(successes.len(), 1);
    assert_eq!(replays, 9);

    let winner = results.into_iter().find_map(Result::ok).unwrap();
    let states: Vec<_> = winner.history.iter().map(|c| c.status).collect();
    assert_eq!(
        states,
        vec![
            SubmissionStatus::Pending,
            SubmissionStatus::Confirmed,
            SubmissionStatus::Submitted,
            SubmissionStatus::Acknowledged,
        ]
    );

    assert!(orch.submission_log().len() >= 10);
    assert!(orch.submission_log().verify());
    let outcomes: Vec<_> = orch
        .submission_log()
        .snapshot()
        .into_iter()
        .map(|e| e.outcome)
        .collect();
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == AuditOutcome::ReplayAttempt)
            .count(),
        9
    );
}

// ===========================================================================
// Scenario 2: expired token rejected
// ===========================================================================

#[test]
fn expired_token_rejected_and_not_consumed() {
    let root = TempDir::new().unwrap();
    let orch = orchestrator(&root);

    let draft = b"report body".to_vec();
    let request = submission_request(&draft);
    let token = orch
        .authorize(&operator(), Operation::Transmit, &request, TokenKind::Single, t0())
        .unwrap();

    let late = t0() + Duration::minutes(15) + Duration::seconds(1);
    let err = orch
        .transmit(&caller(), &request, &draft, &token, &mut AcceptingAdapter, late)
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Confirm(ConfirmError::TokenExpired { .. })
    ));
    assert_eq!(err.exit_code(), 5);
    assert!(!orch.registry().is_consumed(token.confirmation_id()));

    let entries = orch.submission_log().snapshot();
    assert!(entries.iter().any(|e| e.outcome == AuditOutcome::TokenExpired));
    assert!(orch.submission_log().verify());
}

// ===========================================================================
// Scenario 3: path traversal blocked
// ===========================================================================

#[test]
fn path_traversal_blocks_bundle_construction() {
    let mut builder = EvidenceBundleBuilder::new(&new_id(), SecretRedactor::new()).unwrap();
    let err = builder
        .add_artifact("../../etc/passwd", ArtifactKind::Screenshot, b"data", t0())
        .unwrap_err();
    assert!(err.to_string().contains("traversal"));
    assert!(builder.is_empty());
}

// ===========================================================================
// Scenario 4: unredacted HAR rejected, redacted HAR accepted
// ===========================================================================

#[test]
fn unredacted_har_rejected_then_accepted_after_redaction() {
    let har = json!({
        "log": {"entries": [{
            "request": {
                "headers": [{"name": "Authorization", "value": "Bearer abc.def.ghi"}],
                "cookies": []
            },
            "response": {"headers": [], "cookies": []}
        }]}
    })
    .to_string();

    let redactor = SecretRedactor::new();

    // Claiming the raw capture is already redacted fails construction.
    let mut strict = EvidenceBundleBuilder::new(&new_id(), redactor).unwrap();
    let err = strict
        .add_redacted_artifact("har/traffic.har", ArtifactKind::Har, har.as_bytes(), t0())
        .unwrap_err();
    assert!(err.to_string().contains("unredacted"));

    // Running it through the redactor first succeeds, and the stored
    // bytes carry the sentinel.
    let redacted = redactor.redact_archive(&har).unwrap();
    let mut builder = EvidenceBundleBuilder::new(&new_id(), redactor).unwrap();
    builder
        .add_redacted_artifact("har/traffic.har", ArtifactKind::Har, redacted.as_bytes(), t0())
        .unwrap();
    let bundle = builder.seal(t0());
    assert_eq!(bundle.artifacts.len(), 1);
    assert!(redacted.contains("[REDACTED]"));
    assert!(!redacted.contains("abc.def.ghi"));
}

// ===========================================================================
// Scenario 5: invalid transition rejected
// ===========================================================================

#[test]
fn invalid_transition_rejected_and_state_unchanged() {
    let store = SubmissionStore::new();
    let record = SubmissionRecord::new("decision-1", "generic", sha256(b"draft"), t0()).unwrap();
    let id = record.submission_id.clone();
    store.insert(record).unwrap();

    let err = store
        .transition(&id, SubmissionStatus::Submitted, t0(), None)
        .unwrap_err();
    assert!(err.to_string().contains("PENDING -> SUBMITTED"));

    let unchanged = store.get(&id).unwrap();
    assert_eq!(unchanged.status, SubmissionStatus::Pending);
    assert_eq!(unchanged.history.len(), 1);
}

// ===========================================================================
// Scenario 6: manifest chain tampering detected across a restart
// ===========================================================================

#[test]
fn manifest_chain_tampering_detected_with_index() {
    let root = TempDir::new().unwrap();
    let store = ManifestStore::with_artifact_root(root.path());
    let redactor = SecretRedactor::new();

    for label in ["m1", "m2", "m3"] {
        let mut builder = EvidenceBundleBuilder::new(&new_id(), redactor).unwrap();
        builder
            .add_artifact(
                "console_log/out.txt",
                ArtifactKind::ConsoleLog,
                label.as_bytes(),
                t0(),
            )
            .unwrap();
        let bundle = builder.seal(t0());
        store.generate(&bundle, vec![sha256(label.as_bytes())]).unwrap();
    }
    assert!(store.verify_chain(0, None).valid);

    // Tamper with one byte of M2's bundle hash in the persisted chain.
    let chain_path = root.path().join("manifests").join("chain.jsonl");
    let lines: Vec<String> = std::fs::read_to_string(&chain_path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect();
    assert_eq!(lines.len(), 3);
    let mut doc: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
    let mut hash = doc["bundle_hash"].as_str().unwrap().to_string();
    let flipped = if hash.starts_with('0') { "1" } else { "0" };
    hash.replace_range(0..1, flipped);
    doc["bundle_hash"] = serde_json::Value::String(hash);
    let tampered = [lines[0].clone(), doc.to_string(), lines[2].clone()].join("\n");
    std::fs::write(&chain_path, tampered + "\n").unwrap();

    let resumed = ManifestStore::resume(root.path()).unwrap();
    let verdict = resumed.verify_chain(0, None);
    assert!(!verdict.valid);
    assert_eq!(verdict.first_bad_index, Some(1));
    assert!(verdict.reason.unwrap().contains("HashChainMismatch"));
}

// ===========================================================================
// Execution flow: evidence, manifests, permissions, no-bypass
// ===========================================================================

struct RecordingExecutor {
    fail: Option<FailureKind>,
}

impl ActionExecutor for RecordingExecutor {
    fn perform(&mut self, action: &SafeAction) -> Result<Vec<CapturedArtifact>, ExecutorFailure> {
        let screenshot = CapturedArtifact {
            relative_path: "screenshot/step-01.png".to_string(),
            kind: ArtifactKind::Screenshot,
            content: b"png-bytes".to_vec(),
        };
        if let Some(kind) = self.fail {
            return Err(ExecutorFailure::new(kind, "engine fault").with_partial(vec![screenshot]));
        }
        let har = json!({
            "log": {"entries": [{
                "request": {
                    "headers": [
                        {"name": "Authorization", "value": "Bearer abc.def.ghi"},
                        {"name": "Accept", "value": "*/*"}
                    ],
                    "cookies": []
                },
                "response": {
                    "headers": [],
                    "cookies": [],
                    "content": {"text": format!("visited {}", action.target)}
                }
            }]}
        })
        .to_string();
        Ok(vec![
            screenshot,
            CapturedArtifact {
                relative_path: "har/traffic.har".to_string(),
                kind: ArtifactKind::Har,
                content: har.into_bytes(),
            },
        ])
    }
}

fn navigate_request() -> ActionRequest {
    ActionRequest {
        action_type: "NAVIGATE".to_string(),
        target: "https://target.example.org/products".to_string(),
        parameters: std::collections::BTreeMap::new(),
    }
}

#[test]
fn execute_seals_redacted_evidence_and_chains_a_manifest() {
    let root = TempDir::new().unwrap();
    let orch = orchestrator(&root);
    let request = navigate_request();

    let ctx = session_caller(&orch);
    let token = orch
        .authorize(&operator(), Operation::Execute, &request, TokenKind::Single, t0())
        .unwrap();
    let outcome = orch
        .execute(
            &ctx,
            &request,
            &token,
            &mut RecordingExecutor { fail: None },
            t0(),
        )
        .unwrap();

    assert_eq!(outcome.bundle.artifacts.len(), 2);
    assert_eq!(outcome.manifest.execution_id, outcome.execution_id);
    assert_eq!(outcome.manifest.bundle_hash, outcome.bundle.bundle_hash);
    assert_eq!(orch.manifests().len(), 1);
    assert!(orch.execution_log().verify());

    // The persisted manifest is on disk and verifies.
    let reloaded = orch.manifests().reload_persisted(&outcome.execution_id).unwrap();
    assert_eq!(reloaded, outcome.manifest);

    // A second execute with the same token is a replay.
    let err = orch
        .execute(
            &ctx,
            &request,
            &token,
            &mut RecordingExecutor { fail: None },
            t0(),
        )
        .unwrap_err();
    assert_eq!(err.exit_code(), 5);
}

#[test]
fn executor_failure_preserves_kind_and_partial_evidence() {
    let root = TempDir::new().unwrap();
    let orch = orchestrator(&root);
    let request = navigate_request();

    let ctx = session_caller(&orch);
    let token = orch
        .authorize(&operator(), Operation::Execute, &request, TokenKind::Single, t0())
        .unwrap();
    let err = orch
        .execute(
            &ctx,
            &request,
            &token,
            &mut RecordingExecutor {
                fail: Some(FailureKind::CspBlock),
            },
            t0(),
        )
        .unwrap_err();

    match err {
        OrchestratorError::Execution { failure } => {
            assert_eq!(failure.kind, FailureKind::CspBlock);
            assert_eq!(failure.detail, "engine fault");
        },
        other => panic!("expected Execution error, got {other}"),
    }

    // Partial evidence was manifested before the error propagated.
    assert_eq!(orch.manifests().len(), 1);
    // The confirmation is spent; retry needs a fresh authorization.
    assert!(orch.registry().is_consumed(token.confirmation_id()));
}

#[test]
fn forbidden_action_is_refused_before_consumption() {
    let root = TempDir::new().unwrap();
    let orch = orchestrator(&root);
    let request = ActionRequest {
        action_type: "EXECUTE_SCRIPT".to_string(),
        target: "https://target.example.org".to_string(),
        parameters: std::collections::BTreeMap::new(),
    };

    // Bind the token to the raw request; validation still refuses it.
    let ctx = session_caller(&orch);
    let token = orch
        .authorize(&operator(), Operation::Execute, &request, TokenKind::Single, t0())
        .unwrap();
    let err = orch
        .execute(
            &ctx,
            &request,
            &token,
            &mut RecordingExecutor { fail: None },
            t0(),
        )
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Request(_)));
    assert_eq!(err.exit_code(), 2);
    assert!(!orch.registry().is_consumed(token.confirmation_id()));
}

#[test]
fn auditor_cannot_execute_and_system_cannot_authorize() {
    let root = TempDir::new().unwrap();
    let orch = orchestrator(&root);
    let request = navigate_request();

    let auditor = Actor::new("aud-1", "Auditor", ActorType::Human, Role::Auditor);
    let err = orch
        .authorize(&auditor, Operation::Execute, &request, TokenKind::Single, t0())
        .unwrap_err();
    assert_eq!(err.exit_code(), 4);

    let system = Actor::new("sys-1", "Scheduler", ActorType::System, Role::Operator);
    let err = orch
        .authorize(&system, Operation::Transmit, &request, TokenKind::Single, t0())
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Confirm(ConfirmError::HumanConfirmationRequired { .. })
    ));
}

// ===========================================================================
// No-bypass ordering (P12) through the orchestrator
// ===========================================================================

struct ProbeAdapter {
    orch: Arc<Orchestrator>,
    confirmation_id: String,
    observed_consumed: bool,
}

impl PlatformAdapter for ProbeAdapter {
    fn submit(&mut self, attempt: &TransmitAttempt<'_>) -> Result<serde_json::Value, TransportError> {
        attempt.begin_request()?;
        self.observed_consumed = self.orch.registry().is_consumed(&self.confirmation_id);
        Ok(json!({"submission_ref": "plat-9", "status": "accepted"}))
    }
}

#[test]
fn consume_strictly_precedes_network_call() {
    let root = TempDir::new().unwrap();
    let orch = Arc::new(orchestrator(&root));
    let draft = b"draft".to_vec();
    let request = submission_request(&draft);
    let token = orch
        .authorize(&operator(), Operation::Transmit, &request, TokenKind::Single, t0())
        .unwrap();

    let mut adapter = ProbeAdapter {
        orch: Arc::clone(&orch),
        confirmation_id: token.confirmation_id().to_string(),
        observed_consumed: false,
    };
    orch.transmit(&caller(), &request, &draft, &token, &mut adapter, t0())
        .unwrap();
    assert!(adapter.observed_consumed);
}

/// Adapter that fires a second request under one attempt, ignoring the
/// counter's refusal.
struct DoubleSendingAdapter;

impl PlatformAdapter for DoubleSendingAdapter {
    fn submit(&mut self, attempt: &TransmitAttempt<'_>) -> Result<serde_json::Value, TransportError> {
        attempt.begin_request()?;
        let _ = attempt.begin_request();
        Ok(json!({"submission_ref": "plat-2", "status": "accepted"}))
    }
}

#[test]
fn double_sending_adapter_is_caught_and_audited() {
    let root = TempDir::new().unwrap();
    let orch = orchestrator(&root);
    let draft = b"double-send draft".to_vec();
    let request = submission_request(&draft);
    let token = orch
        .authorize(&operator(), Operation::Transmit, &request, TokenKind::Single, t0())
        .unwrap();

    let err = orch
        .transmit(&caller(), &request, &draft, &token, &mut DoubleSendingAdapter, t0())
        .unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::Transport(TransportError::ArchitecturalViolation { .. })
    ));
    assert_eq!(err.exit_code(), 2);

    // The failed transmission is in the audit trail and the chain
    // still verifies.
    let entries = orch.submission_log().snapshot();
    assert!(
        entries
            .iter()
            .any(|e| e.action == "transmission_failed" && e.outcome == AuditOutcome::Error)
    );
    assert!(orch.submission_log().verify());
    // The confirmation stays spent; no retry without a fresh token.
    assert!(orch.registry().is_consumed(token.confirmation_id()));
}

// ===========================================================================
// Tampered draft and duplicate handling
// ===========================================================================

#[test]
fn tampered_draft_is_blocked_before_any_network_access() {
    let root = TempDir::new().unwrap();
    let orch = orchestrator(&root);
    let draft = b"original draft".to_vec();
    let request = submission_request(&draft);
    let token = orch
        .authorize(&operator(), Operation::Transmit, &request, TokenKind::Single, t0())
        .unwrap();

    let err = orch
        .transmit(
            &caller(),
            &request,
            b"edited after confirmation",
            &token,
            &mut AcceptingAdapter,
            t0(),
        )
        .unwrap_err();
    assert_eq!(err.exit_code(), 3);
    assert!(!orch.registry().is_consumed(token.confirmation_id()));
    let entries = orch.submission_log().snapshot();
    assert!(entries.iter().any(|e| e.outcome == AuditOutcome::TamperDetected));
}

#[test]
fn exact_duplicate_blocks_without_override_and_passes_with_it() {
    let root = TempDir::new().unwrap();
    let orch = orchestrator(&root);
    let draft = b"dup draft".to_vec();
    let request = submission_request(&draft);

    let token = orch
        .authorize(&operator(), Operation::Transmit, &request, TokenKind::Single, t0())
        .unwrap();
    orch.transmit(&caller(), &request, &draft, &token, &mut AcceptingAdapter, t0())
        .unwrap();

    // Same triple again: blocked, exit 2.
    let token = orch
        .authorize(&operator(), Operation::Transmit, &request, TokenKind::Single, t0())
        .unwrap();
    let err = orch
        .transmit(&caller(), &request, &draft, &token, &mut AcceptingAdapter, t0())
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Duplicate(_)));
    assert_eq!(err.exit_code(), 2);

    // Human-authorized override: the flag is inside the bound payload.
    let mut override_request = request.clone();
    override_request.override_duplicate = true;
    let token = orch
        .authorize(
            &operator(),
            Operation::Transmit,
            &override_request,
            TokenKind::Single,
            t0(),
        )
        .unwrap();
    let record = orch
        .transmit(
            &caller(),
            &override_request,
            &draft,
            &token,
            &mut AcceptingAdapter,
            t0(),
        )
        .unwrap();
    assert_eq!(record.status, SubmissionStatus::Acknowledged);
}

// ===========================================================================
// Sessions, export, seal, decommission
// ===========================================================================

#[test]
fn execute_requires_an_active_session() {
    let root = TempDir::new().unwrap();
    let orch = orchestrator(&root);
    let request = navigate_request();
    let token = orch
        .authorize(&operator(), Operation::Execute, &request, TokenKind::Single, t0())
        .unwrap();

    // Session id is well-formed but was never started.
    let err = orch
        .execute(
            &caller(),
            &request,
            &token,
            &mut RecordingExecutor { fail: None },
            t0(),
        )
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::SessionNotActive { .. }));

    // An ended session is terminal.
    let actor = operator();
    let session_id = orch.start_session(&actor, t0()).unwrap();
    orch.end_session(&actor, &session_id, t0()).unwrap();
    let ctx = CallerContext {
        actor,
        session_id: session_id.clone(),
    };
    let err = orch
        .execute(
            &ctx,
            &request,
            &token,
            &mut RecordingExecutor { fail: None },
            t0(),
        )
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::SessionNotActive { .. }));
    assert!(orch.end_session(&operator(), &session_id, t0()).is_err());
}

#[test]
fn export_seal_and_decommission_lifecycle() {
    use warrant_core::orchestrator::{ExportRequest, GovernanceRequest};
    use warrant_core::request::HumanInitiation;

    let root = TempDir::new().unwrap();
    let orch = orchestrator(&root);
    let admin = Actor::new("adm-1", "Admin", ActorType::Human, Role::Administrator);
    let admin_ctx = CallerContext {
        actor: admin.clone(),
        session_id: new_id(),
    };
    let initiation = HumanInitiation::new("approve-btn", 1_767_225_600_000);

    // Export under operator authority.
    let export_request = ExportRequest {
        finding_refs: vec!["finding-1".to_string(), "finding-2".to_string()],
    };
    let op_ctx = CallerContext {
        actor: operator(),
        session_id: new_id(),
    };
    let token = orch
        .authorize(&operator(), Operation::Export, &export_request, TokenKind::Single, t0())
        .unwrap();
    let receipt = orch
        .export(&op_ctx, &initiation, &export_request, &token, t0())
        .unwrap();
    assert!(!receipt.export_id.is_empty());

    // Operators cannot seal.
    let err = orch
        .authorize(&operator(), Operation::Seal, &export_request, TokenKind::Single, t0())
        .unwrap_err();
    assert_eq!(err.exit_code(), 4);

    // Administrator seals; the export phase becomes terminal.
    let seal_payload = GovernanceRequest {
        operation: "seal".to_string(),
        initiation: initiation.clone(),
    };
    let token = orch
        .authorize(&admin, Operation::Seal, &seal_payload, TokenKind::Single, t0())
        .unwrap();
    orch.seal_phase(&admin_ctx, &initiation, &token, t0()).unwrap();

    let token = orch
        .authorize(&operator(), Operation::Export, &export_request, TokenKind::Single, t0())
        .unwrap();
    let err = orch
        .export(&op_ctx, &initiation, &export_request, &token, t0())
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::PhaseSealed));

    // Decommission verifies all chains and shuts the door.
    let decom_payload = GovernanceRequest {
        operation: "decommission".to_string(),
        initiation: initiation.clone(),
    };
    let token = orch
        .authorize(&admin, Operation::Decommission, &decom_payload, TokenKind::Single, t0())
        .unwrap();
    let report = orch
        .decommission(&admin_ctx, &initiation, &token, t0())
        .unwrap();
    assert!(report.chains.all_valid());
    assert!(report.total_audit_entries > 0);

    let err = orch
        .authorize(&operator(), Operation::Export, &export_request, TokenKind::Single, t0())
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Decommissioned));
    assert_eq!(err.exit_code(), 2);
}

// ===========================================================================
// Persistence: audit logs survive a restart, tampering refuses to load
// ===========================================================================

#[test]
fn persisted_audit_logs_resume_and_refuse_tampering() {
    let root = TempDir::new().unwrap();
    {
        let orch = orchestrator(&root);
        let request = navigate_request();
        let ctx = session_caller(&orch);
        let token = orch
            .authorize(&operator(), Operation::Execute, &request, TokenKind::Single, t0())
            .unwrap();
        orch.execute(
            &ctx,
            &request,
            &token,
            &mut RecordingExecutor { fail: None },
            t0(),
        )
        .unwrap();
        orch.persist_audit().unwrap();
    }

    // Clean resume verifies and keeps the entries.
    let config = GovernanceConfig::new(root.path());
    let resumed = Orchestrator::resume(config.clone()).unwrap();
    assert!(resumed.execution_log().len() >= 2);
    assert!(resumed.execution_log().verify());
    assert!(resumed.manifests().verify_chain(0, None).valid);

    // A tampered execution log refuses to load at all.
    let path = root.path().join("audit").join("execution.jsonl");
    let doctored = std::fs::read_to_string(&path).unwrap().replace("op-1", "op-2");
    std::fs::write(&path, doctored).unwrap();
    let err = Orchestrator::resume(config).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}
