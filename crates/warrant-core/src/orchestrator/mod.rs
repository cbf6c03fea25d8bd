//! The action orchestrator: front door for execute, transmit, export,
//! seal, and decommission.
//!
//! # Flow
//!
//! Every entry point walks the same ladder:
//!
//! 1. refuse if decommissioned;
//! 2. resolve the caller's role against the operation table;
//! 3. dry-run the state transition;
//! 4. consume the confirmation atomically;
//! 5. hold the single request slot across the outbound effect;
//! 6. collect evidence (validated, redacted, manifested);
//! 7. record audit entries in the owning subsystem's log;
//! 8. transition the state machine, recording the reason.
//!
//! Recovery never bypasses authorization: failures are classified,
//! partial evidence is preserved, the original error kind propagates
//! unchanged, and a retry needs a fresh human confirmation.

mod error;
mod executor;

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
pub use error::OrchestratorError;
pub use executor::{ActionExecutor, CapturedArtifact, ExecutorFailure, FailureKind};
use serde::Serialize;

use crate::actor::{Actor, Operation};
use crate::audit::{
    AuditAction, AuditEntrySeed, AuditLog, AuditOutcome, AuditRefs, ChainVerdict, LogScope,
};
use crate::canonical;
use crate::config::GovernanceConfig;
use crate::confirm::{ConfirmError, ConfirmationRegistry, ConfirmationToken, FileBackedConsumeLog, TokenKind};
use crate::crypto::{Hash, hashes_equal, sha256};
use crate::duplicate::{DuplicateGuard, DuplicateVerdict};
use crate::evidence::{EvidenceBundle, EvidenceBundleBuilder, ExecutionManifest, ManifestStore};
use crate::redact::SecretRedactor;
use crate::request::{ActionRequest, HumanInitiation, SafeAction, SubmissionRequest};
use crate::submission::{ExportState, SessionState, SubmissionRecord, SubmissionStatus, SubmissionStore};
use crate::transport::{AckStatus, PlatformAdapter, PlatformAck, send_authorized};
use crate::validate::{IdKind, new_id, validate_uuid_v4};

/// The caller presenting a request.
#[derive(Debug, Clone)]
pub struct CallerContext {
    /// The acting identity.
    pub actor: Actor,
    /// The operator session (UUIDv4).
    pub session_id: String,
}

/// Result of a successful execution.
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// The execution's identifier.
    pub execution_id: String,
    /// The sealed evidence bundle.
    pub bundle: EvidenceBundle,
    /// The chained manifest.
    pub manifest: ExecutionManifest,
}

/// Result of a successful export.
#[derive(Debug, Clone)]
pub struct ExportReceipt {
    /// Export identifier.
    pub export_id: String,
    /// Digest over the canonical finding references.
    pub content_hash: Hash,
    /// When the export happened.
    pub exported_at: DateTime<Utc>,
}

/// Payload a confirmation binds for an export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportRequest {
    /// The findings to export.
    pub finding_refs: Vec<String>,
}

/// Payload a confirmation binds for seal / decommission.
#[derive(Debug, Clone, Serialize)]
pub struct GovernanceRequest {
    /// Which governed operation this authorizes.
    pub operation: String,
    /// The attesting gesture.
    pub initiation: HumanInitiation,
}

/// Per-subsystem chain verification report.
#[derive(Debug)]
pub struct ChainReport {
    /// Execution log verdict.
    pub execution: ChainVerdict,
    /// Submission log verdict.
    pub submission: ChainVerdict,
    /// Export log verdict.
    pub export: ChainVerdict,
    /// Manifest chain verdict.
    pub manifests: ChainVerdict,
}

impl ChainReport {
    /// True when every chain verified.
    #[must_use]
    pub fn all_valid(&self) -> bool {
        self.execution.valid && self.submission.valid && self.export.valid && self.manifests.valid
    }
}

/// Summary returned by a successful decommission.
#[derive(Debug)]
pub struct DecommissionReport {
    /// The final chain verification.
    pub chains: ChainReport,
    /// Entries across all logs at shutdown.
    pub total_audit_entries: usize,
}

/// The governance front door.
pub struct Orchestrator {
    config: GovernanceConfig,
    registry: ConfirmationRegistry,
    duplicates: DuplicateGuard,
    manifests: ManifestStore,
    submissions: SubmissionStore,
    redactor: SecretRedactor,
    execution_log: AuditLog,
    submission_log: AuditLog,
    export_log: AuditLog,
    sessions: Mutex<HashMap<String, SessionState>>,
    export_state: Mutex<ExportState>,
    decommissioned: AtomicBool,
}

impl Orchestrator {
    /// Builds an orchestrator from a validated config.
    ///
    /// # Errors
    ///
    /// Config validation failures and consume-log open failures.
    pub fn new(config: GovernanceConfig) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let registry = match config.consume_log {
            Some(ref path) => {
                ConfirmationRegistry::with_durable_log(FileBackedConsumeLog::open(path)?)
            },
            None => ConfirmationRegistry::new(),
        };
        let manifests = ManifestStore::with_artifact_root(&config.artifact_root);
        Ok(Self {
            config,
            registry,
            duplicates: DuplicateGuard::new(),
            manifests,
            submissions: SubmissionStore::new(),
            redactor: SecretRedactor::new(),
            execution_log: AuditLog::new(LogScope::Execution),
            submission_log: AuditLog::new(LogScope::Submission),
            export_log: AuditLog::new(LogScope::Export),
            sessions: Mutex::new(HashMap::new()),
            export_state: Mutex::new(ExportState::Open),
            decommissioned: AtomicBool::new(false),
        })
    }

    /// Reopens an orchestrator over previously persisted state.
    ///
    /// Audit logs are reloaded from `{artifact_root}/audit/*.jsonl`
    /// with link-by-link verification — a tampered log refuses to load
    /// (hard stop). The manifest chain is reloaded unverified so that
    /// `verify-chain` can report the bad index. Sealed/decommissioned
    /// state is reconstructed from the export log.
    ///
    /// # Errors
    ///
    /// Config, I/O, and audit-integrity failures.
    pub fn resume(config: GovernanceConfig) -> Result<Self, OrchestratorError> {
        let mut orchestrator = Self::new(config)?;

        let audit_dir = orchestrator.config.artifact_root.join("audit");
        for (scope, slot) in [
            (LogScope::Execution, &mut orchestrator.execution_log),
            (LogScope::Submission, &mut orchestrator.submission_log),
            (LogScope::Export, &mut orchestrator.export_log),
        ] {
            let path = audit_dir.join(format!("{scope}.jsonl"));
            if path.is_file() {
                let file = std::fs::File::open(&path).map_err(crate::audit::AuditError::Io)?;
                *slot = AuditLog::load_jsonl(scope, std::io::BufReader::new(file))?;
            }
        }

        orchestrator.manifests = ManifestStore::resume(&orchestrator.config.artifact_root)?;

        for entry in orchestrator.export_log.snapshot() {
            if entry.outcome == AuditOutcome::Ok {
                if entry.action == AuditAction::PhaseSealed.as_str() {
                    *orchestrator
                        .export_state
                        .lock()
                        .expect("export state lock poisoned") = ExportState::Sealed;
                }
                if entry.action == AuditAction::Decommissioned.as_str() {
                    orchestrator.decommissioned.store(true, Ordering::SeqCst);
                }
            }
        }

        Ok(orchestrator)
    }

    /// Persists the three audit logs as JSONL under
    /// `{artifact_root}/audit/`.
    ///
    /// # Errors
    ///
    /// I/O and serialization failures.
    pub fn persist_audit(&self) -> Result<(), OrchestratorError> {
        let audit_dir = self.config.artifact_root.join("audit");
        std::fs::create_dir_all(&audit_dir).map_err(crate::audit::AuditError::Io)?;
        for (scope, log) in [
            (LogScope::Execution, &self.execution_log),
            (LogScope::Submission, &self.submission_log),
            (LogScope::Export, &self.export_log),
        ] {
            let path = audit_dir.join(format!("{scope}.jsonl"));
            let mut buf = Vec::new();
            log.write_jsonl(&mut buf)?;
            std::fs::write(&path, buf).map_err(crate::audit::AuditError::Io)?;
        }
        Ok(())
    }

    /// The confirmation registry (read access for callers and tests).
    #[must_use]
    pub const fn registry(&self) -> &ConfirmationRegistry {
        &self.registry
    }

    /// The execution audit log.
    #[must_use]
    pub const fn execution_log(&self) -> &AuditLog {
        &self.execution_log
    }

    /// The submission audit log.
    #[must_use]
    pub const fn submission_log(&self) -> &AuditLog {
        &self.submission_log
    }

    /// The export audit log.
    #[must_use]
    pub const fn export_log(&self) -> &AuditLog {
        &self.export_log
    }

    /// The manifest store.
    #[must_use]
    pub const fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// The submission record store.
    #[must_use]
    pub const fn submissions(&self) -> &SubmissionStore {
        &self.submissions
    }

    fn ensure_live(&self) -> Result<(), OrchestratorError> {
        if self.decommissioned.load(Ordering::SeqCst) {
            return Err(OrchestratorError::Decommissioned);
        }
        Ok(())
    }

    fn ensure_permitted(
        &self,
        scope: LogScope,
        log: &AuditLog,
        actor: &Actor,
        operation: Operation,
        now: DateTime<Utc>,
    ) -> Result<(), OrchestratorError> {
        if actor.role().permits(operation) {
            return Ok(());
        }
        let _ = log.append(
            scope,
            AuditEntrySeed::new(
                actor.actor_id(),
                actor.role(),
                AuditAction::PermissionDenied,
                AuditOutcome::PermissionDenied,
            ),
            now,
        );
        Err(OrchestratorError::InsufficientPermission {
            actor_id: actor.actor_id().to_string(),
            role: actor.role(),
            operation,
        })
    }

    /// Mints a confirmation for `operation` bound to `payload`.
    ///
    /// The mint itself is audited in the operation's owning log.
    ///
    /// # Errors
    ///
    /// Permission, liveness, and mint failures.
    pub fn authorize<T: Serialize>(
        &self,
        actor: &Actor,
        operation: Operation,
        payload: &T,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<ConfirmationToken, OrchestratorError> {
        self.ensure_live()?;
        let (scope, log) = self.log_for(operation);
        self.ensure_permitted(scope, log, actor, operation, now)?;

        let token = self.registry.mint(payload, actor, kind, now)?;
        log.append(
            scope,
            AuditEntrySeed::new(
                actor.actor_id(),
                actor.role(),
                AuditAction::ConfirmationMinted,
                AuditOutcome::Ok,
            )
            .with_refs(AuditRefs {
                confirmation_id: Some(token.confirmation_id().to_string()),
                ..AuditRefs::default()
            }),
            now,
        )?;
        Ok(token)
    }

    fn log_for(&self, operation: Operation) -> (LogScope, &AuditLog) {
        match operation {
            Operation::Execute => (LogScope::Execution, &self.execution_log),
            Operation::Transmit | Operation::Approve => {
                (LogScope::Submission, &self.submission_log)
            },
            Operation::Export
            | Operation::Seal
            | Operation::Decommission
            | Operation::VerifyChain => (LogScope::Export, &self.export_log),
        }
    }

    // =========================================================================
    // sessions
    // =========================================================================

    /// Starts an operator session, walking the session machine from
    /// `STARTED` to `ACTIVE`, and returns its id.
    ///
    /// # Errors
    ///
    /// Liveness failures and non-human actors.
    pub fn start_session(
        &self,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<String, OrchestratorError> {
        self.ensure_live()?;
        if !actor.can_authorize() {
            return Err(ConfirmError::HumanConfirmationRequired {
                actor_id: actor.actor_id().to_string(),
                actor_type: "SYSTEM",
            }
            .into());
        }

        let session_id = new_id();
        // STARTED -> ACTIVE happens at creation; credential validation
        // is the caller's act of constructing a HUMAN actor.
        let mut state = SessionState::Started;
        if state.can_transition_to(&SessionState::Active) {
            state = SessionState::Active;
        }
        self.sessions
            .lock()
            .expect("session table lock poisoned")
            .insert(session_id.clone(), state);

        let _ = self.execution_log.append(
            LogScope::Execution,
            AuditEntrySeed::new(
                actor.actor_id(),
                actor.role(),
                AuditAction::SessionStarted,
                AuditOutcome::Ok,
            )
            .with_refs(AuditRefs {
                session_id: Some(session_id.clone()),
                ..AuditRefs::default()
            }),
            now,
        );
        Ok(session_id)
    }

    /// Ends a session; `ENDED` is terminal.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::SessionNotActive`] when the session is
    /// unknown or already ended.
    pub fn end_session(
        &self,
        actor: &Actor,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OrchestratorError> {
        let mut sessions = self.sessions.lock().expect("session table lock poisoned");
        let state = sessions
            .get_mut(session_id)
            .ok_or_else(|| OrchestratorError::SessionNotActive {
                session_id: session_id.to_string(),
                state: "UNKNOWN",
            })?;
        if !state.can_transition_to(&SessionState::Ended) {
            return Err(OrchestratorError::SessionNotActive {
                session_id: session_id.to_string(),
                state: state.as_str(),
            });
        }
        *state = SessionState::Ended;
        drop(sessions);

        let _ = self.execution_log.append(
            LogScope::Execution,
            AuditEntrySeed::new(
                actor.actor_id(),
                actor.role(),
                AuditAction::SessionEnded,
                AuditOutcome::Ok,
            )
            .with_refs(AuditRefs {
                session_id: Some(session_id.to_string()),
                ..AuditRefs::default()
            }),
            now,
        );
        Ok(())
    }

    fn ensure_session_active(&self, session_id: &str) -> Result<(), OrchestratorError> {
        let sessions = self.sessions.lock().expect("session table lock poisoned");
        match sessions.get(session_id) {
            Some(SessionState::Active) => Ok(()),
            Some(state) => Err(OrchestratorError::SessionNotActive {
                session_id: session_id.to_string(),
                state: state.as_str(),
            }),
            None => Err(OrchestratorError::SessionNotActive {
                session_id: session_id.to_string(),
                state: "UNKNOWN",
            }),
        }
    }

    // =========================================================================
    // execute
    // =========================================================================

    /// Executes one confirmed browser action and collects its evidence.
    ///
    /// # Errors
    ///
    /// Permission, validation, confirmation, and executor failures; on
    /// an executor failure the original kind propagates unchanged and
    /// whatever evidence was captured first is preserved.
    pub fn execute<E: ActionExecutor>(
        &self,
        ctx: &CallerContext,
        request: &ActionRequest,
        token: &ConfirmationToken,
        executor: &mut E,
        now: DateTime<Utc>,
    ) -> Result<ExecutionOutcome, OrchestratorError> {
        self.ensure_live()?;
        self.ensure_permitted(
            LogScope::Execution,
            &self.execution_log,
            &ctx.actor,
            Operation::Execute,
            now,
        )?;
        if let Err(e) = validate_uuid_v4(&ctx.session_id, IdKind::Session) {
            let _ = self.execution_log.append(
                LogScope::Execution,
                AuditEntrySeed::new(
                    ctx.actor.actor_id(),
                    ctx.actor.role(),
                    AuditAction::ActionFailed,
                    AuditOutcome::Denied,
                ),
                now,
            );
            return Err(e.into());
        }
        self.ensure_session_active(&ctx.session_id)?;

        let safe_action = match SafeAction::from_request(request) {
            Ok(action) => action,
            Err(e) => {
                self.log_execution(ctx, AuditAction::ActionFailed, AuditOutcome::ForbiddenAction, None, now);
                return Err(e.into());
            },
        };

        if let Err(e) = self.registry.consume(token, request, now) {
            self.log_confirm_failure(LogScope::Execution, &self.execution_log, ctx, token, &e, now);
            return Err(e.into());
        }
        self.log_execution(
            ctx,
            AuditAction::ConfirmationConsumed,
            AuditOutcome::Consumed,
            Some(token.confirmation_id()),
            now,
        );

        let enforcer = crate::enforce::SingleRequestEnforcer::new(token.confirmation_id())?;
        let slot = enforcer.acquire()?;
        let execution_id = new_id();

        let performed = executor.perform(&safe_action);
        drop(slot);

        match performed {
            Ok(captured) => {
                let (bundle, manifest) =
                    match self.seal_evidence(&execution_id, &captured, request, now) {
                        Ok(sealed) => sealed,
                        Err(e) => {
                            self.log_execution(
                                ctx,
                                AuditAction::ActionFailed,
                                evidence_failure_outcome(&e),
                                Some(token.confirmation_id()),
                                now,
                            );
                            return Err(e);
                        },
                    };
                self.log_execution(
                    ctx,
                    AuditAction::ActionExecuted,
                    AuditOutcome::Ok,
                    Some(token.confirmation_id()),
                    now,
                );
                self.log_manifest(ctx, &manifest, now);
                Ok(ExecutionOutcome {
                    execution_id,
                    bundle,
                    manifest,
                })
            },
            Err(failure) => {
                // Preserve whatever was captured before the fault; the
                // original failure still propagates unchanged.
                if !failure.partial.is_empty() {
                    if let Ok((_, manifest)) =
                        self.seal_evidence(&execution_id, &failure.partial, request, now)
                    {
                        self.log_manifest(ctx, &manifest, now);
                    }
                }
                self.log_execution(
                    ctx,
                    AuditAction::ActionFailed,
                    AuditOutcome::Error,
                    Some(token.confirmation_id()),
                    now,
                );
                Err(OrchestratorError::Execution { failure })
            },
        }
    }

    fn seal_evidence(
        &self,
        execution_id: &str,
        captured: &[CapturedArtifact],
        request: &ActionRequest,
        now: DateTime<Utc>,
    ) -> Result<(EvidenceBundle, ExecutionManifest), OrchestratorError> {
        let mut builder = EvidenceBundleBuilder::new(execution_id, self.redactor)?;
        for artifact in captured {
            let final_bytes =
                builder.add_artifact(&artifact.relative_path, artifact.kind, &artifact.content, now)?;

            // On-disk layout: {root}/{execution_id}/{kind}/{file}. The
            // confinement check runs before anything is created.
            let on_disk = crate::validate::confine_to_root(
                &self.config.artifact_root,
                &format!("{execution_id}/{}", artifact.relative_path),
            )?;
            if let Some(parent) = on_disk.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(crate::evidence::EvidenceError::Io)?;
            }
            std::fs::write(&on_disk, &final_bytes).map_err(crate::evidence::EvidenceError::Io)?;
        }
        let bundle = builder.seal(now);
        let action_hash = canonical::digest(request)?;
        let manifest = self.manifests.generate(&bundle, vec![action_hash])?;
        Ok((bundle, manifest))
    }

    fn log_execution(
        &self,
        ctx: &CallerContext,
        action: AuditAction,
        outcome: AuditOutcome,
        confirmation_id: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let _ = self.execution_log.append(
            LogScope::Execution,
            AuditEntrySeed::new(ctx.actor.actor_id(), ctx.actor.role(), action, outcome)
                .with_refs(AuditRefs {
                    session_id: Some(ctx.session_id.clone()),
                    confirmation_id: confirmation_id.map(String::from),
                    ..AuditRefs::default()
                }),
            now,
        );
    }

    fn log_manifest(&self, ctx: &CallerContext, manifest: &ExecutionManifest, now: DateTime<Utc>) {
        let _ = self.execution_log.append(
            LogScope::Execution,
            AuditEntrySeed::new(
                ctx.actor.actor_id(),
                ctx.actor.role(),
                AuditAction::ManifestWritten,
                AuditOutcome::Ok,
            )
            .with_refs(AuditRefs {
                session_id: Some(ctx.session_id.clone()),
                manifest_id: Some(manifest.manifest_id.clone()),
                ..AuditRefs::default()
            }),
            now,
        );
    }

    fn log_confirm_failure(
        &self,
        scope: LogScope,
        log: &AuditLog,
        ctx: &CallerContext,
        token: &ConfirmationToken,
        error: &ConfirmError,
        now: DateTime<Utc>,
    ) {
        let (action, outcome) = match error {
            ConfirmError::ReplayAttempt { .. } => {
                (AuditAction::ReplayBlocked, AuditOutcome::ReplayAttempt)
            },
            ConfirmError::TokenExpired { .. } => {
                (AuditAction::NetworkAccessDenied, AuditOutcome::TokenExpired)
            },
            ConfirmError::TokenTampered { .. } => {
                (AuditAction::TamperDetected, AuditOutcome::TamperDetected)
            },
            _ => (AuditAction::NetworkAccessDenied, AuditOutcome::Denied),
        };
        let _ = log.append(
            scope,
            AuditEntrySeed::new(ctx.actor.actor_id(), ctx.actor.role(), action, outcome)
                .with_refs(AuditRefs {
                    session_id: Some(ctx.session_id.clone()),
                    confirmation_id: Some(token.confirmation_id().to_string()),
                    ..AuditRefs::default()
                }),
            now,
        );
    }

    // =========================================================================
    // transmit
    // =========================================================================

    /// Transmits a confirmed draft to the configured platform.
    ///
    /// # Errors
    ///
    /// Confirmation failures leave the record `PENDING`; transport
    /// failures after consumption move it `CONFIRMED -> FAILED`. Both
    /// propagate with their original kind.
    #[allow(clippy::too_many_lines)]
    pub fn transmit<A: PlatformAdapter>(
        &self,
        ctx: &CallerContext,
        request: &SubmissionRequest,
        draft_bytes: &[u8],
        token: &ConfirmationToken,
        adapter: &mut A,
        now: DateTime<Utc>,
    ) -> Result<SubmissionRecord, OrchestratorError> {
        self.ensure_live()?;
        self.ensure_permitted(
            LogScope::Submission,
            &self.submission_log,
            &ctx.actor,
            Operation::Transmit,
            now,
        )?;

        let endpoint = self.config.endpoint.clone().ok_or_else(|| {
            OrchestratorError::Config(crate::config::ConfigError::ConfigurationError {
                detail: "no platform endpoint configured".to_string(),
            })
        })?;

        // Draft tamper check before anything is consumed.
        let draft_hash = sha256(draft_bytes);
        if !hashes_equal(&draft_hash, &request.draft_content_hash) {
            self.log_submission(
                ctx,
                AuditAction::TamperDetected,
                AuditOutcome::TamperDetected,
                Some(token.confirmation_id()),
                now,
            );
            return Err(OrchestratorError::Confirm(ConfirmError::TokenTampered {
                confirmation_id: token.confirmation_id().to_string(),
            }));
        }

        let record = SubmissionRecord::new(
            &request.decision_id,
            &request.platform_tag,
            request.draft_content_hash,
            now,
        )?;
        let submission_id = record.submission_id.clone();
        self.submissions.insert(record)?;
        self.log_submission(
            ctx,
            AuditAction::RequestCreated,
            AuditOutcome::Ok,
            Some(token.confirmation_id()),
            now,
        );

        // Dry-run the confirmation transition before consuming.
        self.submissions
            .dry_run(&submission_id, SubmissionStatus::Confirmed)?;

        // Consume first: replay and expiry are decided before the
        // duplicate index is even consulted.
        let receipt = match self.registry.consume(token, request, now) {
            Ok(receipt) => receipt,
            Err(e) => {
                self.log_confirm_failure(
                    LogScope::Submission,
                    &self.submission_log,
                    ctx,
                    token,
                    &e,
                    now,
                );
                return Err(e.into());
            },
        };
        self.submissions
            .transition(&submission_id, SubmissionStatus::Confirmed, now, None)?;
        self.log_submission(
            ctx,
            AuditAction::ConfirmationConsumed,
            AuditOutcome::Consumed,
            Some(token.confirmation_id()),
            now,
        );

        // Duplicate guard: exact matches block unless the human
        // authorized an override; partial matches warn and proceed.
        match self.duplicates.check(request) {
            Ok(DuplicateVerdict::Clear) => {},
            Ok(DuplicateVerdict::OverrideAuthorized) => {
                self.log_submission(
                    ctx,
                    AuditAction::DuplicateBlocked,
                    AuditOutcome::Advisory,
                    Some(token.confirmation_id()),
                    now,
                );
            },
            Ok(DuplicateVerdict::Advisory { warning }) => {
                tracing::warn!(%warning, "near-duplicate submission");
                self.log_submission(
                    ctx,
                    AuditAction::DuplicateBlocked,
                    AuditOutcome::Advisory,
                    Some(token.confirmation_id()),
                    now,
                );
            },
            Err(e) => {
                self.submissions.transition(
                    &submission_id,
                    SubmissionStatus::Failed,
                    now,
                    Some(e.to_string()),
                )?;
                self.log_submission(
                    ctx,
                    AuditAction::DuplicateBlocked,
                    AuditOutcome::DuplicateBlocked,
                    Some(token.confirmation_id()),
                    now,
                );
                return Err(e.into());
            },
        }

        let transmitted = send_authorized(
            token,
            &receipt,
            draft_bytes,
            &endpoint,
            &self.config.retry,
            adapter,
            now,
        );

        match transmitted {
            Ok(ack) => {
                self.submissions.transition(
                    &submission_id,
                    SubmissionStatus::Submitted,
                    now,
                    None,
                )?;
                self.log_submission(
                    ctx,
                    AuditAction::Transmitted,
                    AuditOutcome::Ok,
                    Some(token.confirmation_id()),
                    now,
                );
                self.duplicates.record(request);

                for warning in &ack.warnings {
                    tracing::warn!(%warning, "platform response warning");
                    self.log_submission(
                        ctx,
                        AuditAction::Transmitted,
                        AuditOutcome::Advisory,
                        Some(token.confirmation_id()),
                        now,
                    );
                }

                let final_record = self.finish_ack(ctx, &submission_id, &ack, token, now)?;
                Ok(final_record)
            },
            Err(transport_error) => {
                // The confirmation was consumed; the attempt failed.
                self.submissions.transition(
                    &submission_id,
                    SubmissionStatus::Failed,
                    now,
                    Some(transport_error.to_string()),
                )?;
                self.log_submission(
                    ctx,
                    AuditAction::TransmissionFailed,
                    AuditOutcome::Error,
                    Some(token.confirmation_id()),
                    now,
                );
                Err(transport_error.into())
            },
        }
    }

    fn finish_ack(
        &self,
        ctx: &CallerContext,
        submission_id: &str,
        ack: &PlatformAck,
        token: &ConfirmationToken,
        now: DateTime<Utc>,
    ) -> Result<SubmissionRecord, OrchestratorError> {
        let (status, action) = match ack.status {
            AckStatus::Accepted => (
                SubmissionStatus::Acknowledged,
                AuditAction::PlatformAcknowledged,
            ),
            AckStatus::Rejected => (SubmissionStatus::Rejected, AuditAction::PlatformRejected),
        };
        let record = self.submissions.transition(
            submission_id,
            status,
            now,
            Some(format!("platform ref {}", ack.submission_ref)),
        )?;
        self.log_submission(ctx, action, AuditOutcome::Ok, Some(token.confirmation_id()), now);
        Ok(record)
    }

    fn log_submission(
        &self,
        ctx: &CallerContext,
        action: AuditAction,
        outcome: AuditOutcome,
        confirmation_id: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let _ = self.submission_log.append(
            LogScope::Submission,
            AuditEntrySeed::new(ctx.actor.actor_id(), ctx.actor.role(), action, outcome)
                .with_refs(AuditRefs {
                    session_id: Some(ctx.session_id.clone()),
                    confirmation_id: confirmation_id.map(String::from),
                    ..AuditRefs::default()
                }),
            now,
        );
    }

    // =========================================================================
    // export / seal / decommission
    // =========================================================================

    /// Exports finding references under an explicit human initiation.
    ///
    /// # Errors
    ///
    /// Permission, initiation, seal-state, and confirmation failures.
    pub fn export(
        &self,
        ctx: &CallerContext,
        initiation: &HumanInitiation,
        request: &ExportRequest,
        token: &ConfirmationToken,
        now: DateTime<Utc>,
    ) -> Result<ExportReceipt, OrchestratorError> {
        self.ensure_live()?;
        self.ensure_permitted(
            LogScope::Export,
            &self.export_log,
            &ctx.actor,
            Operation::Export,
            now,
        )?;
        initiation.validate()?;

        {
            let state = self.export_state.lock().expect("export state lock poisoned");
            if state.is_terminal() {
                return Err(OrchestratorError::PhaseSealed);
            }
        }

        if let Err(e) = self.registry.consume(token, request, now) {
            self.log_confirm_failure(LogScope::Export, &self.export_log, ctx, token, &e, now);
            return Err(e.into());
        }

        let content_hash = canonical::digest(&request.finding_refs)?;
        let receipt = ExportReceipt {
            export_id: new_id(),
            content_hash,
            exported_at: canonical::truncate_to_millis(now),
        };

        self.export_log.append(
            LogScope::Export,
            AuditEntrySeed::new(
                ctx.actor.actor_id(),
                ctx.actor.role(),
                AuditAction::ExportCompleted,
                AuditOutcome::Ok,
            )
            .with_refs(AuditRefs {
                session_id: Some(ctx.session_id.clone()),
                confirmation_id: Some(token.confirmation_id().to_string()),
                ..AuditRefs::default()
            }),
            now,
        )?;

        Ok(receipt)
    }

    /// Seals the export phase; later exports and seals refuse.
    ///
    /// # Errors
    ///
    /// Permission, initiation, confirmation, and already-sealed
    /// failures.
    pub fn seal_phase(
        &self,
        ctx: &CallerContext,
        initiation: &HumanInitiation,
        token: &ConfirmationToken,
        now: DateTime<Utc>,
    ) -> Result<(), OrchestratorError> {
        self.ensure_live()?;
        self.ensure_permitted(
            LogScope::Export,
            &self.export_log,
            &ctx.actor,
            Operation::Seal,
            now,
        )?;
        initiation.validate()?;

        let payload = GovernanceRequest {
            operation: Operation::Seal.as_str().to_string(),
            initiation: initiation.clone(),
        };
        if let Err(e) = self.registry.consume(token, &payload, now) {
            self.log_confirm_failure(LogScope::Export, &self.export_log, ctx, token, &e, now);
            return Err(e.into());
        }

        {
            let mut state = self.export_state.lock().expect("export state lock poisoned");
            if !state.can_transition_to(&ExportState::Sealed) {
                return Err(OrchestratorError::PhaseSealed);
            }
            *state = ExportState::Sealed;
        }

        self.export_log.append(
            LogScope::Export,
            AuditEntrySeed::new(
                ctx.actor.actor_id(),
                ctx.actor.role(),
                AuditAction::PhaseSealed,
                AuditOutcome::Ok,
            )
            .with_refs(AuditRefs {
                session_id: Some(ctx.session_id.clone()),
                confirmation_id: Some(token.confirmation_id().to_string()),
                ..AuditRefs::default()
            }),
            now,
        )?;
        Ok(())
    }

    /// Verifies every chain. Read-only; any role with `VerifyChain`.
    ///
    /// # Errors
    ///
    /// Permission failures only; a failed verification is reported in
    /// the returned [`ChainReport`], not as an error.
    pub fn verify_chains(&self, actor: &Actor) -> Result<ChainReport, OrchestratorError> {
        if !actor.role().permits(Operation::VerifyChain) {
            return Err(OrchestratorError::InsufficientPermission {
                actor_id: actor.actor_id().to_string(),
                role: actor.role(),
                operation: Operation::VerifyChain,
            });
        }
        Ok(ChainReport {
            execution: self.execution_log.verify_with_reason(),
            submission: self.submission_log.verify_with_reason(),
            export: self.export_log.verify_with_reason(),
            manifests: self.manifests.verify_chain(0, None),
        })
    }

    /// Decommissions the system: verifies all chains, writes the final
    /// entries, and refuses every further operation.
    ///
    /// # Errors
    ///
    /// Permission, initiation, confirmation, and chain-verification
    /// failures; a broken chain aborts the decommission as an integrity
    /// fault.
    pub fn decommission(
        &self,
        ctx: &CallerContext,
        initiation: &HumanInitiation,
        token: &ConfirmationToken,
        now: DateTime<Utc>,
    ) -> Result<DecommissionReport, OrchestratorError> {
        self.ensure_live()?;
        self.ensure_permitted(
            LogScope::Export,
            &self.export_log,
            &ctx.actor,
            Operation::Decommission,
            now,
        )?;
        initiation.validate()?;

        let payload = GovernanceRequest {
            operation: Operation::Decommission.as_str().to_string(),
            initiation: initiation.clone(),
        };
        if let Err(e) = self.registry.consume(token, &payload, now) {
            self.log_confirm_failure(LogScope::Export, &self.export_log, ctx, token, &e, now);
            return Err(e.into());
        }

        let chains = ChainReport {
            execution: self.execution_log.verify_with_reason(),
            submission: self.submission_log.verify_with_reason(),
            export: self.export_log.verify_with_reason(),
            manifests: self.manifests.verify_chain(0, None),
        };
        if !chains.all_valid() {
            return Err(OrchestratorError::AuditIntegrityFailure {
                detail: "chain verification failed during decommission".to_string(),
            });
        }

        // Each subsystem writes its own closing entry.
        for (scope, log) in [
            (LogScope::Execution, &self.execution_log),
            (LogScope::Submission, &self.submission_log),
            (LogScope::Export, &self.export_log),
        ] {
            log.append(
                scope,
                AuditEntrySeed::new(
                    ctx.actor.actor_id(),
                    ctx.actor.role(),
                    AuditAction::Decommissioned,
                    AuditOutcome::Ok,
                )
                .with_refs(AuditRefs {
                    session_id: Some(ctx.session_id.clone()),
                    confirmation_id: Some(token.confirmation_id().to_string()),
                    ..AuditRefs::default()
                }),
                now,
            )?;
        }

        self.decommissioned.store(true, Ordering::SeqCst);

        Ok(DecommissionReport {
            chains,
            total_audit_entries: self.execution_log.len()
                + self.submission_log.len()
                + self.export_log.len(),
        })
    }
}

/// Maps an evidence-path failure to its audit outcome.
fn evidence_failure_outcome(error: &OrchestratorError) -> AuditOutcome {
    match error {
        OrchestratorError::Validate(crate::validate::ValidateError::PathTraversal { .. })
        | OrchestratorError::Evidence(crate::evidence::EvidenceError::Path(
            crate::validate::ValidateError::PathTraversal { .. },
        )) => AuditOutcome::PathTraversal,
        OrchestratorError::Evidence(crate::evidence::EvidenceError::Unredacted(_)) => {
            AuditOutcome::UnredactedEvidence
        },
        _ => AuditOutcome::Error,
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("artifact_root", &self.config.artifact_root)
            .field("decommissioned", &self.decommissioned.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
