//! CLI struct definitions for the contract-gate command-line interface.
//!
//! Top-level clap types live here. Plugin commands own their argument
//! structs; dispatch lives in `lib.rs`.

use crate::core::gates::GateKind;
use crate::plugins::{diagnose, pilot, pipeline};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "contract-gate",
    version = env!("CARGO_PKG_VERSION"),
    about = "Contract validation, boundary enforcement and gate checks for staged artifact pipelines"
)]
pub(crate) struct Cli {
    /// Config file (default: $CONTRACT_GATE_CONFIG, then ./contract-gate.toml).
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Validate a payload against a v1 contract
    Validate(ValidateCli),

    /// Run a single gate over a JSON payload
    Gate(GateCli),

    /// Run the integrity battery over an export directory
    #[clap(name = "check-pipeline")]
    CheckPipeline(pipeline::CheckPipelineCli),

    /// Ordered export / ingestion / execution diagnostic
    Diagnose(diagnose::DiagnoseCli),

    /// Run the ten-span pilot trace with optional fault injection
    Pilot(pilot::PilotCli),

    /// Print embedded JSON Schema documents
    Schema(SchemaCli),
}

#[derive(clap::Args, Debug)]
pub(crate) struct ValidateCli {
    /// Contract name: TaskSpan, Handoff, ArtifactIntent, GateResult (or snake_case).
    pub contract: String,
    /// Payload: file path, '-' for stdin, or inline JSON.
    pub payload: String,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct GateCli {
    #[clap(value_enum)]
    pub kind: GateKind,
    /// Gate input: file path, '-' for stdin, or inline JSON.
    pub payload: String,
    #[clap(long)]
    pub gate_id: String,
    #[clap(long)]
    pub task_id: String,
    /// Override the gate's default phase.
    #[clap(long)]
    pub phase: Option<String>,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct SchemaCli {
    /// Contract to print; lists the embedded schema files when omitted.
    pub contract: Option<String>,
}
