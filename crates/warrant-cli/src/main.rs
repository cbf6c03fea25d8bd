//! warrant - governance command surface.
//!
//! Thin, governance-focused CLI over the warrant core. Every command
//! requires an explicit human-initiation envelope: interactive by
//! default (a typed confirmation on a TTY), or a signed attestation
//! file for terminals the operator has already authenticated. None of
//! the commands can be scripted bypass-free — a non-TTY stdin without
//! an attestation file refuses with a governance violation.
//!
//! Exit codes: 0 success, 2 governance violation, 3 integrity or
//! verification failure, 4 permission denied, 5 expired or replayed
//! token.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use warrant_core::actor::{Actor, ActorType, Operation, Role};
use warrant_core::canonical;
use warrant_core::config::GovernanceConfig;
use warrant_core::confirm::TokenKind;
use warrant_core::orchestrator::{
    CallerContext, ExportRequest, GovernanceRequest, Orchestrator, OrchestratorError,
};
use warrant_core::request::HumanInitiation;
use warrant_core::validate::{IdKind, new_id, validate_uuid_v4};

mod envelope;

/// Exit code for integrity/verification failures.
const EXIT_INTEGRITY: u8 = 3;

/// warrant - human-authorized governance core
#[derive(Parser, Debug)]
#[command(name = "warrant")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the governance configuration file
    #[arg(short, long, default_value = "governance.json")]
    config: PathBuf,

    /// Acting identity recorded in the audit trail
    #[arg(long, default_value = "cli-operator")]
    actor_id: String,

    /// Attestation file carrying a human-initiation envelope
    /// (`{"human_initiated": true, ...}`); without it, stdin must be a
    /// TTY and the command prompts interactively
    #[arg(long)]
    attest_human: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify every audit log and the manifest chain
    VerifyChain,

    /// Export one execution's manifest after verifying it
    ExportManifest {
        /// The execution whose manifest to export
        #[arg(long)]
        execution_id: String,

        /// Write to this path instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Seal the export phase; later exports refuse
    SealPhase,

    /// Verify all chains, write closing entries, and shut the system
    /// down for good
    Decommission,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code_for(&e))
        },
    }
}

fn exit_code_for(error: &anyhow::Error) -> u8 {
    if let Some(core) = error.downcast_ref::<OrchestratorError>() {
        return u8::try_from(core.exit_code()).unwrap_or(1);
    }
    1
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = GovernanceConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let command_name = match &cli.command {
        Commands::VerifyChain => "verify-chain",
        Commands::ExportManifest { .. } => "export-manifest",
        Commands::SealPhase => "seal-phase",
        Commands::Decommission => "decommission",
    };
    let initiation = gather_initiation(command_name, cli.attest_human.as_deref())?;

    let orchestrator = Orchestrator::resume(config)?;
    let session_id = new_id();

    match cli.command {
        Commands::VerifyChain => {
            let auditor = Actor::new(&cli.actor_id, &cli.actor_id, ActorType::Human, Role::Auditor);
            let report = orchestrator.verify_chains(&auditor)?;
            print_verdict("execution audit log", &report.execution);
            print_verdict("submission audit log", &report.submission);
            print_verdict("export audit log", &report.export);
            print_verdict("manifest chain", &report.manifests);
            if report.all_valid() {
                println!("all chains verified");
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_INTEGRITY))
            }
        },

        Commands::ExportManifest { execution_id, out } => {
            validate_uuid_v4(&execution_id, IdKind::Execution)
                .map_err(OrchestratorError::Validate)?;
            let operator =
                Actor::new(&cli.actor_id, &cli.actor_id, ActorType::Human, Role::Operator);
            let ctx = CallerContext {
                actor: operator.clone(),
                session_id,
            };

            let request = ExportRequest {
                finding_refs: vec![execution_id.clone()],
            };
            let now = canonical::now();
            let token = orchestrator.authorize(
                &operator,
                Operation::Export,
                &request,
                TokenKind::Single,
                now,
            )?;
            let receipt = orchestrator.export(&ctx, &initiation, &request, &token, now)?;

            let manifest = orchestrator.manifests().reload_persisted(&execution_id)?;
            let json = serde_json::to_string_pretty(&manifest)?;
            match out {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("writing manifest to {}", path.display()))?,
                None => println!("{json}"),
            }
            eprintln!("export {} recorded", receipt.export_id);
            orchestrator.persist_audit()?;
            Ok(ExitCode::SUCCESS)
        },

        Commands::SealPhase => {
            let administrator = Actor::new(
                &cli.actor_id,
                &cli.actor_id,
                ActorType::Human,
                Role::Administrator,
            );
            let ctx = CallerContext {
                actor: administrator.clone(),
                session_id,
            };
            let now = canonical::now();
            let payload = GovernanceRequest {
                operation: Operation::Seal.as_str().to_string(),
                initiation: initiation.clone(),
            };
            let token = orchestrator.authorize(
                &administrator,
                Operation::Seal,
                &payload,
                TokenKind::Single,
                now,
            )?;
            orchestrator.seal_phase(&ctx, &initiation, &token, now)?;
            orchestrator.persist_audit()?;
            println!("phase sealed");
            Ok(ExitCode::SUCCESS)
        },

        Commands::Decommission => {
            let administrator = Actor::new(
                &cli.actor_id,
                &cli.actor_id,
                ActorType::Human,
                Role::Administrator,
            );
            let ctx = CallerContext {
                actor: administrator.clone(),
                session_id,
            };
            let now = canonical::now();
            let payload = GovernanceRequest {
                operation: Operation::Decommission.as_str().to_string(),
                initiation: initiation.clone(),
            };
            let token = orchestrator.authorize(
                &administrator,
                Operation::Decommission,
                &payload,
                TokenKind::Single,
                now,
            )?;
            let report = orchestrator.decommission(&ctx, &initiation, &token, now)?;
            orchestrator.persist_audit()?;
            println!(
                "decommissioned; {} audit entries across all logs, every chain verified",
                report.total_audit_entries
            );
            Ok(ExitCode::SUCCESS)
        },
    }
}

fn print_verdict(label: &str, verdict: &warrant_core::audit::ChainVerdict) {
    if verdict.valid {
        println!("{label}: ok");
    } else {
        println!(
            "{label}: INVALID at index {} ({})",
            verdict.first_bad_index.unwrap_or(0),
            verdict.reason.as_deref().unwrap_or("unknown"),
        );
    }
}

/// Gathers the human-initiation envelope: attestation file if supplied,
/// interactive TTY prompt otherwise. Refuses non-interactive stdin.
fn gather_initiation(
    command: &str,
    attest_file: Option<&std::path::Path>,
) -> anyhow::Result<HumanInitiation> {
    if let Some(path) = attest_file {
        return envelope::read_attestation(path);
    }

    if !std::io::stdin().is_terminal() {
        return Err(OrchestratorError::Request(
            warrant_core::request::RequestError::HumanInitiationRequired {
                detail: format!(
                    "{command} requires an interactive terminal or an --attest-human envelope"
                ),
            },
        )
        .into());
    }

    envelope::prompt_interactive(command, Utc::now().timestamp_millis())
}
