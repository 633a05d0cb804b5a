//! contract-gate: contract governance for staged artifact pipelines.
//!
//! A multi-stage pipeline (business manifest -> export contract -> plan
//! ingestion -> code generation -> finalize) hands documents from one stage to
//! the next. This crate keeps those hand-offs honest:
//!
//! - **Contracts** (`core::contracts`, `core::schemas`): four closed, versioned
//!   document shapes: TaskSpan, Handoff, ArtifactIntent and GateResult.
//! - **Validator** (`core::validate`): reports every structural violation with
//!   a JSON pointer and a concrete next action.
//! - **Boundary enforcement** (`core::boundary`): mandatory validation at send
//!   and receive time; rejections are typed errors carrying the full list.
//! - **Gates** (`core::gates`): named invariant checks (checksum chain,
//!   mapping completeness, gap parity, ...) producing `GateResult` values.
//! - **Pipeline checker** (`plugins::pipeline`): a fixed battery of gates over
//!   one export directory.
//! - **Diagnostic** (`plugins::diagnose`): export / ingestion / execution
//!   questions, evaluated in order and halted at the first failure.
//! - **Pilot** (`plugins::pilot`): a deterministic ten-span trace with fault
//!   injection.
//!
//! Nothing here retries. Every failure is deterministic for a fixed input:
//! fix the input, re-run.
//!
//! ```bash
//! contract-gate validate Handoff handoff.json
//! contract-gate gate gap '{"gap_ids":["a"],"feature_ids":["a"]}' --gate-id gp --task-id T-1
//! contract-gate check-pipeline out/export --fail-on-unhealthy
//! contract-gate diagnose out/export --ingestion-dir out/plan --artisan-dir out/artisan
//! contract-gate pilot --source-checksum sha256:STALE
//! ```

pub mod cli;
pub mod core;
pub mod plugins;

use crate::cli::{Cli, Command, GateCli, SchemaCli, ValidateCli};
use crate::core::boundary::BoundaryEnforcer;
use crate::core::config::GatesConfig;
use crate::core::contracts::Severity;
use crate::core::error::ContractGateError;
use crate::core::schemas::ContractKind;
use crate::core::{assets, gates, output, payload};
use crate::plugins::{diagnose, pilot, pipeline};

use clap::Parser;

pub use crate::core::error;

pub fn run() -> Result<(), ContractGateError> {
    let cli = Cli::parse();
    let config = GatesConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Validate(args) => run_validate_cli(args, &config),
        Command::Gate(args) => run_gate_cli(args),
        Command::CheckPipeline(args) => pipeline::run_check_pipeline_cli(args, &config),
        Command::Diagnose(args) => diagnose::run_diagnose_cli(args, &config),
        Command::Pilot(args) => pilot::run_pilot_cli(args, &config),
        Command::Schema(args) => run_schema_cli(args),
    }
}

fn run_validate_cli(args: ValidateCli, config: &GatesConfig) -> Result<(), ContractGateError> {
    let value = payload::read_payload(&args.payload)?;
    let enforcer = match config.telemetry.event_sink() {
        Some(sink) => BoundaryEnforcer::with_sink(sink),
        None => BoundaryEnforcer::new(),
    };

    match enforcer.validate_inbound(&args.contract, &value) {
        Ok(()) => {
            if args.format == "json" {
                let body = serde_json::json!({
                    "valid": true,
                    "contract": args.contract,
                    "violations": [],
                });
                println!("{}", body);
            } else {
                println!("OK: payload conforms to {} v1", args.contract);
            }
            Ok(())
        }
        Err(e) => {
            if args.format == "json" {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "valid": false,
                        "contract": e.contract(),
                        "violations": e.violations(),
                    }))?
                );
            } else {
                for v in e.violations() {
                    println!("{}", v);
                }
            }
            Err(ContractGateError::CheckFailed(format!(
                "{} violation(s) against {}",
                e.violations().len(),
                e.contract()
            )))
        }
    }
}

fn run_gate_cli(args: GateCli) -> Result<(), ContractGateError> {
    let value = payload::read_payload(&args.payload)?;
    let mut result = gates::evaluate_payload(args.kind, &args.gate_id, &args.task_id, &value)?;
    if let Some(phase) = &args.phase {
        result = result.with_phase(phase);
    }

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "{} {} ({})",
            output::status_word(result.passed, result.severity == Severity::Blocking),
            result.gate_id,
            result.phase
        );
        println!("  reason: {}", output::reason_line(&result.reason));
        if !result.passed {
            println!("  next action: {}", result.next_action);
        }
    }

    if result.is_blocking_failure() {
        return Err(ContractGateError::CheckFailed(format!(
            "gate {} failed",
            result.gate_id
        )));
    }
    Ok(())
}

fn run_schema_cli(args: SchemaCli) -> Result<(), ContractGateError> {
    match args.contract {
        Some(name) => {
            let kind = ContractKind::from_name(&name)?;
            println!("{}", serde_json::to_string_pretty(&assets::load_schema(kind)?)?);
        }
        None => {
            for file in assets::list_schema_files() {
                println!("{}", file);
            }
        }
    }
    Ok(())
}
