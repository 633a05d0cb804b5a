//! Ordered diagnostic: the three questions.
//!
//! Q1 export ("is the contract complete?"), Q2 ingestion ("was it faithfully
//! translated?"), Q3 execution ("was it faithfully executed?") are evaluated
//! strictly in that order. Once a layer fails the diagnostic halts: every
//! later question is marked skipped with cause `upstream_failed` and is never
//! evaluated. Layers whose input directory was not supplied are skipped with
//! cause `input_not_supplied`, which is not a failure.

use crate::core::checksum::{self, Rehash};
use crate::core::config::GatesConfig;
use crate::core::contracts::{GateResult, SchemaVersion};
use crate::core::error::ContractGateError;
use crate::core::gates::{self, GateChecker, PHASE_EXECUTION, PHASE_INGESTION};
use crate::core::output;
use crate::core::payload;
use crate::core::time;
use crate::plugins::pipeline::{self, ExportBundle};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

pub const PLAN_FILE: &str = "plan.json";
pub const EXECUTION_FILE: &str = "execution.json";

pub const GATE_PLAN_EXPORT_IDENTITY: &str = "plan-export-identity";
pub const GATE_PLAN_CHECKSUM_CHAIN: &str = "plan-checksum-chain";
pub const GATE_PLAN_MAPPING: &str = "plan-mapping-completeness";
pub const GATE_PLAN_GAP_PARITY: &str = "plan-gap-parity";
pub const GATE_EXECUTION_PLAN_IDENTITY: &str = "execution-plan-identity";
pub const GATE_ARTIFACT_PRODUCTION: &str = "artifact-production";
pub const GATE_OUTPUT_CONTAINMENT: &str = "output-containment";
pub const GATE_OUTPUT_CHECKSUMS: &str = "output-checksums";
pub const GATE_TEST_OUTCOME: &str = "test-outcome";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Export,
    Ingestion,
    Execution,
}

impl Layer {
    pub const ORDER: [Layer; 3] = [Layer::Export, Layer::Ingestion, Layer::Execution];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Export => "export",
            Layer::Ingestion => "ingestion",
            Layer::Execution => "execution",
        }
    }

    pub fn question(&self) -> &'static str {
        match self {
            Layer::Export => "Is the contract complete?",
            Layer::Ingestion => "Was it faithfully translated?",
            Layer::Execution => "Was it faithfully executed?",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipCause {
    UpstreamFailed,
    InputNotSupplied,
}

// ===== Ingestion / execution documents =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestionPlan {
    pub schema_version: SchemaVersion,
    pub plan_id: String,
    pub export_id: String,
    pub source_checksums: BTreeMap<String, String>,
    pub tasks: Vec<PlannedTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedTask {
    pub task_id: String,
    pub feature_ids: Vec<String>,
    pub artifact_ids: Vec<String>,
}

impl IngestionPlan {
    /// artifact_id -> task ids that claim it.
    pub fn artifact_mapping(&self) -> BTreeMap<String, Vec<String>> {
        let mut mapping: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for task in &self.tasks {
            for artifact in &task.artifact_ids {
                mapping
                    .entry(artifact.clone())
                    .or_default()
                    .push(task.task_id.clone());
            }
        }
        mapping
    }

    pub fn feature_ids(&self) -> BTreeSet<String> {
        self.tasks
            .iter()
            .flat_map(|t| t.feature_ids.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionRecord {
    pub schema_version: SchemaVersion,
    pub plan_id: String,
    pub outputs: Vec<ProducedOutput>,
    pub tests: TestOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProducedOutput {
    pub artifact_id: String,
    /// Relative to the artisan directory.
    pub path: String,
    pub checksum: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestOutcome {
    pub passed: u64,
    pub failed: u64,
}

// ===== Result =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question: String,
    pub layer: Layer,
    pub passed: bool,
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_cause: Option<SkipCause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_gate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
}

impl QuestionOutcome {
    fn passed(layer: Layer) -> Self {
        Self {
            question: layer.question().to_string(),
            layer,
            passed: true,
            skipped: false,
            skip_cause: None,
            failed_gate: None,
            reason: None,
            next_action: None,
        }
    }

    fn failed(
        layer: Layer,
        failed_gate: Option<String>,
        reason: String,
        next_action: String,
    ) -> Self {
        Self {
            passed: false,
            failed_gate,
            reason: Some(reason),
            next_action: Some(next_action),
            ..Self::passed(layer)
        }
    }

    fn skipped(layer: Layer, cause: SkipCause) -> Self {
        Self {
            passed: false,
            skipped: true,
            skip_cause: Some(cause),
            ..Self::passed(layer)
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.passed && !self.skipped
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub all_passed: bool,
    pub start_here: Option<Layer>,
    pub questions: Vec<QuestionOutcome>,
    pub gate_results: Vec<GateResult>,
}

impl DiagnosticResult {
    pub fn question(&self, layer: Layer) -> Option<&QuestionOutcome> {
        self.questions.iter().find(|q| q.layer == layer)
    }

    pub fn has_issue(&self) -> bool {
        self.questions.iter().any(QuestionOutcome::is_failure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Halted(Layer),
}

/// Inputs for one diagnostic run.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticInputs<'a> {
    pub export_dir: &'a Path,
    pub ingestion_dir: Option<&'a Path>,
    pub artisan_dir: Option<&'a Path>,
}

/// Per-run context threaded through the layers.
struct Run<'a> {
    inputs: DiagnosticInputs<'a>,
    config: &'a GatesConfig,
    checker: GateChecker,
    bundle: Option<ExportBundle>,
    plan: Option<IngestionPlan>,
}

pub fn diagnose(inputs: DiagnosticInputs<'_>, config: &GatesConfig) -> DiagnosticResult {
    let mut run = Run {
        inputs,
        config,
        checker: GateChecker::new(&time::new_event_id()),
        bundle: None,
        plan: None,
    };

    let mut state = State::Open;
    let mut questions = Vec::with_capacity(Layer::ORDER.len());
    for layer in Layer::ORDER {
        let outcome = match state {
            State::Halted(_) => QuestionOutcome::skipped(layer, SkipCause::UpstreamFailed),
            State::Open => run.evaluate(layer),
        };
        if outcome.is_failure() {
            tracing::info!(layer = %layer, "diagnostic halted");
            state = State::Halted(layer);
        }
        questions.push(outcome);
    }

    let start_here = match state {
        State::Halted(layer) => Some(layer),
        State::Open => None,
    };
    DiagnosticResult {
        all_passed: start_here.is_none(),
        start_here,
        questions,
        gate_results: run.checker.into_results(),
    }
}

impl Run<'_> {
    fn evaluate(&mut self, layer: Layer) -> QuestionOutcome {
        match layer {
            Layer::Export => self.export_layer(),
            Layer::Ingestion => match self.inputs.ingestion_dir {
                Some(dir) => self.ingestion_layer(dir),
                None => QuestionOutcome::skipped(layer, SkipCause::InputNotSupplied),
            },
            Layer::Execution => match self.inputs.artisan_dir {
                Some(dir) => self.execution_layer(dir),
                None => QuestionOutcome::skipped(layer, SkipCause::InputNotSupplied),
            },
        }
    }

    fn export_layer(&mut self) -> QuestionOutcome {
        let (report, bundle) = match pipeline::inspect_export(self.inputs.export_dir, self.config) {
            Ok(found) => found,
            Err(e) => {
                return QuestionOutcome::failed(
                    Layer::Export,
                    None,
                    e.to_string(),
                    "point diagnose at a readable export directory".to_string(),
                );
            }
        };
        for entry in &report.gates {
            if let Some(result) = &entry.result {
                self.checker.record(result.clone());
            }
        }
        self.bundle = Some(bundle);
        if report.is_healthy() {
            QuestionOutcome::passed(Layer::Export)
        } else {
            QuestionOutcome::failed(
                Layer::Export,
                report.failed_gate,
                report.reason.unwrap_or_default(),
                report.next_action.unwrap_or_default(),
            )
        }
    }

    fn ingestion_layer(&mut self, dir: &Path) -> QuestionOutcome {
        let plan = match load_layer_document::<IngestionPlan>(dir, PLAN_FILE) {
            Ok(plan) => plan,
            Err(reason) => {
                return QuestionOutcome::failed(
                    Layer::Ingestion,
                    None,
                    reason,
                    format!("re-run plan ingestion so {} is written", PLAN_FILE),
                );
            }
        };
        let Some(bundle) = &self.bundle else {
            return QuestionOutcome::skipped(Layer::Ingestion, SkipCause::UpstreamFailed);
        };
        let export_id = bundle.export_id().unwrap_or_default();
        let mark = self.checker.len();

        let identity = if plan.export_id == export_id {
            gates::gate_result(
                GATE_PLAN_EXPORT_IDENTITY,
                &plan.plan_id,
                PHASE_INGESTION,
                true,
                format!("plan targets export {}", export_id),
                gates::NEXT_ACTION_NONE.to_string(),
            )
        } else {
            gates::gate_result(
                GATE_PLAN_EXPORT_IDENTITY,
                &plan.plan_id,
                PHASE_INGESTION,
                false,
                format!(
                    "plan targets export {} but the export is {}",
                    plan.export_id, export_id
                ),
                "ingest the current export".to_string(),
            )
        };
        self.checker.record(identity);

        if let Some(ledger) = &bundle.checksums {
            self.checker.record(gates::checksum_chain(
                GATE_PLAN_CHECKSUM_CHAIN,
                &plan.plan_id,
                &ledger.files,
                &plan.source_checksums,
            ));
        }
        if let Some(artifact_ids) = bundle.artifact_ids() {
            self.checker.record(gates::mapping_completeness(
                GATE_PLAN_MAPPING,
                &plan.plan_id,
                &artifact_ids,
                &plan.artifact_mapping(),
            ));
        }
        if let Some(gap_ids) = bundle.gap_ids() {
            let features = plan.feature_ids();
            self.checker.record(
                gates::gap_parity(GATE_PLAN_GAP_PARITY, &plan.plan_id, &gap_ids, &features)
                    .with_phase(PHASE_INGESTION),
            );
        }

        self.plan = Some(plan);
        self.layer_verdict(Layer::Ingestion, mark)
    }

    fn execution_layer(&mut self, dir: &Path) -> QuestionOutcome {
        let record = match load_layer_document::<ExecutionRecord>(dir, EXECUTION_FILE) {
            Ok(record) => record,
            Err(reason) => {
                return QuestionOutcome::failed(
                    Layer::Execution,
                    None,
                    reason,
                    format!("re-run code generation so {} is written", EXECUTION_FILE),
                );
            }
        };
        let Some(bundle) = &self.bundle else {
            return QuestionOutcome::skipped(Layer::Execution, SkipCause::UpstreamFailed);
        };
        let task_id = record.plan_id.clone();
        let mark = self.checker.len();

        if let Some(plan) = &self.plan {
            let matches = plan.plan_id == record.plan_id;
            self.checker.record(gates::gate_result(
                GATE_EXECUTION_PLAN_IDENTITY,
                &task_id,
                PHASE_EXECUTION,
                matches,
                if matches {
                    format!("execution ran plan {}", plan.plan_id)
                } else {
                    format!(
                        "execution ran plan {} but ingestion produced {}",
                        record.plan_id, plan.plan_id
                    )
                },
                if matches {
                    gates::NEXT_ACTION_NONE.to_string()
                } else {
                    "re-run execution against the current plan".to_string()
                },
            ));
        }

        if let Some(artifact_ids) = bundle.artifact_ids() {
            let produced: BTreeMap<String, &str> = record
                .outputs
                .iter()
                .map(|o| (o.artifact_id.clone(), o.path.as_str()))
                .collect();
            self.checker.record(
                gates::mapping_completeness(
                    GATE_ARTIFACT_PRODUCTION,
                    &task_id,
                    &artifact_ids,
                    &produced,
                )
                .with_phase(PHASE_EXECUTION),
            );
        }

        let escaping: Vec<&str> = record
            .outputs
            .iter()
            .map(|o| o.path.as_str())
            .filter(|p| checksum::escapes_root(p))
            .collect();
        self.checker.record(gates::gate_result(
            GATE_OUTPUT_CONTAINMENT,
            &task_id,
            PHASE_EXECUTION,
            escaping.is_empty(),
            if escaping.is_empty() {
                format!(
                    "{} output path(s) stay inside {}",
                    record.outputs.len(),
                    dir.display()
                )
            } else {
                format!(
                    "output path(s) escape the artisan directory: {}",
                    escaping.join(", ")
                )
            },
            if escaping.is_empty() {
                gates::NEXT_ACTION_NONE.to_string()
            } else {
                "record outputs as paths relative to the artisan directory".to_string()
            },
        ));

        let expected: BTreeMap<String, String> = record
            .outputs
            .iter()
            .map(|o| (o.path.clone(), o.checksum.clone()))
            .collect();
        let actual: BTreeMap<String, String> = checksum::rehash_files(dir, expected.keys())
            .into_iter()
            .filter_map(|(path, outcome)| match outcome {
                Rehash::Hashed(h) => Some((path, h)),
                Rehash::Missing | Rehash::OutsideRoot | Rehash::Unreadable(_) => None,
            })
            .collect();
        self.checker.record(
            gates::checksum_chain(GATE_OUTPUT_CHECKSUMS, &task_id, &expected, &actual)
                .with_phase(PHASE_EXECUTION),
        );
        self.checker.record(gates::zero_failures(
            GATE_TEST_OUTCOME,
            &task_id,
            record.tests.passed,
            record.tests.failed,
        ));

        self.layer_verdict(Layer::Execution, mark)
    }

    /// Verdict over the results recorded since `mark`.
    fn layer_verdict(&self, layer: Layer, mark: usize) -> QuestionOutcome {
        match self.checker.results()[mark..]
            .iter()
            .find(|r| r.is_blocking_failure())
        {
            None => QuestionOutcome::passed(layer),
            Some(r) => QuestionOutcome::failed(
                layer,
                Some(r.gate_id.clone()),
                r.reason.clone(),
                r.next_action.clone(),
            ),
        }
    }
}

fn load_layer_document<T: serde::de::DeserializeOwned>(
    dir: &Path,
    name: &str,
) -> Result<T, String> {
    let path = dir.join(name);
    if !path.is_file() {
        return Err(format!("{} not found in {}", name, dir.display()));
    }
    payload::read_json_file(&path).map_err(|e| format!("{} does not parse: {}", name, e))
}

// ===== CLI =====

#[derive(Parser, Debug)]
pub struct DiagnoseCli {
    /// Export directory (Q1).
    pub export_dir: PathBuf,
    /// Plan ingestion output directory (Q2); skipped when absent.
    #[clap(long)]
    pub ingestion_dir: Option<PathBuf>,
    /// Code generation output directory (Q3); skipped when absent.
    #[clap(long)]
    pub artisan_dir: Option<PathBuf>,
    /// Exit 1 when any evaluated question failed.
    #[clap(long)]
    pub fail_on_issue: bool,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

pub fn run_diagnose_cli(cli: DiagnoseCli, config: &GatesConfig) -> Result<(), ContractGateError> {
    let result = diagnose(
        DiagnosticInputs {
            export_dir: &cli.export_dir,
            ingestion_dir: cli.ingestion_dir.as_deref(),
            artisan_dir: cli.artisan_dir.as_deref(),
        },
        config,
    );

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_text(&result));
    }

    if cli.fail_on_issue && result.has_issue() {
        return Err(ContractGateError::CheckFailed(format!(
            "diagnose: start here -> {} layer",
            result.start_here.map(|l| l.as_str()).unwrap_or("unknown")
        )));
    }
    Ok(())
}

pub fn render_text(result: &DiagnosticResult) -> String {
    let mut out = String::new();
    for (i, q) in result.questions.iter().enumerate() {
        let word = if q.skipped {
            output::skip_word()
        } else {
            output::status_word(q.passed, true)
        };
        out.push_str(&format!("Q{} [{}] {}: {}", i + 1, word, q.layer, q.question));
        match q.skip_cause {
            Some(SkipCause::UpstreamFailed) => out.push_str(" (upstream failed)"),
            Some(SkipCause::InputNotSupplied) => out.push_str(" (input not supplied)"),
            None => {}
        }
        out.push('\n');
        if let Some(reason) = &q.reason {
            out.push_str(&format!("    reason: {}\n", output::reason_line(reason)));
        }
    }
    match result.start_here {
        Some(layer) => {
            out.push_str(&format!("Start here: {} layer\n", layer));
            if let Some(action) = result
                .question(layer)
                .and_then(|q| q.next_action.as_deref())
            {
                out.push_str(&format!("  next action: {}\n", action));
            }
        }
        None => out.push_str("All evaluated layers passed.\n"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_export_fails_q1_and_skips_downstream() {
        let tmp = TempDir::new().unwrap();
        let export = tmp.path().join("missing");
        let result = diagnose(
            DiagnosticInputs {
                export_dir: &export,
                ingestion_dir: Some(tmp.path()),
                artisan_dir: None,
            },
            &GatesConfig::default(),
        );
        assert!(!result.all_passed);
        assert_eq!(result.start_here, Some(Layer::Export));
        let q2 = result.question(Layer::Ingestion).unwrap();
        assert!(q2.skipped);
        assert_eq!(q2.skip_cause, Some(SkipCause::UpstreamFailed));
        let q3 = result.question(Layer::Execution).unwrap();
        assert_eq!(q3.skip_cause, Some(SkipCause::UpstreamFailed));
    }

    #[test]
    fn plan_mapping_collects_every_claiming_task() {
        let plan = IngestionPlan {
            schema_version: SchemaVersion::V1,
            plan_id: "P-1".into(),
            export_id: "E-1".into(),
            source_checksums: BTreeMap::new(),
            tasks: vec![
                PlannedTask {
                    task_id: "T-1".into(),
                    feature_ids: vec!["F-1".into()],
                    artifact_ids: vec!["A-1".into()],
                },
                PlannedTask {
                    task_id: "T-2".into(),
                    feature_ids: vec!["F-2".into()],
                    artifact_ids: vec!["A-1".into(), "A-2".into()],
                },
            ],
        };
        let mapping = plan.artifact_mapping();
        assert_eq!(mapping["A-1"], vec!["T-1".to_string(), "T-2".to_string()]);
        assert_eq!(plan.feature_ids().len(), 2);
    }

    #[test]
    fn text_names_start_here_layer() {
        let result = DiagnosticResult {
            all_passed: false,
            start_here: Some(Layer::Ingestion),
            questions: vec![
                QuestionOutcome::passed(Layer::Export),
                QuestionOutcome::failed(Layer::Ingestion, None, "r".into(), "fix plan".into()),
                QuestionOutcome::skipped(Layer::Execution, SkipCause::UpstreamFailed),
            ],
            gate_results: vec![],
        };
        let text = render_text(&result);
        assert!(text.contains("Start here: ingestion layer"));
        assert!(text.contains("next action: fix plan"));
        assert!(text.contains("(upstream failed)"));
    }
}
