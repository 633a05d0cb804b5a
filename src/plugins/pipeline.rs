//! Pipeline integrity checker.
//!
//! Runs a fixed, ordered battery of gates over one export directory:
//!
//! 1. `structural-integrity`: required documents exist, parse, and are closed.
//! 2. `checksum-chain`: recomputed file hashes vs. `checksums.json`.
//! 3. `provenance-consistency`: skipped when `provenance.json` is absent.
//! 4. `mapping-completeness`: every artifact is mapped to a task.
//! 5. `gap-parity`: declared gaps vs. exported features.
//! 6. `design-calibration`: warning only, never affects health.
//!
//! Every gate's outcome is recorded, including gates skipped because their
//! inputs did not load. The report is healthy iff no blocking gate failed.

use crate::core::boundary::BoundaryEnforcer;
use crate::core::checksum::{self, Rehash, SHA256_PREFIX};
use crate::core::config::{
    ARTIFACTS_FILE, CHECKSUMS_FILE, EXPORT_CONTRACT_FILE, GatesConfig, PipelineConfig,
    TASK_MAPPING_FILE,
};
use crate::core::contracts::{ArtifactIntent, GateResult, SchemaVersion, Severity};
use crate::core::error::ContractGateError;
use crate::core::gates::{self, GateChecker, PHASE_EXPORT};
use crate::core::output;
use crate::core::payload;
use crate::core::schemas::ContractKind;
use crate::core::time;
use clap::Parser;
use rustc_hash::FxHashSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const GATE_STRUCTURAL_INTEGRITY: &str = "structural-integrity";
pub const GATE_CHECKSUM_CHAIN: &str = "checksum-chain";
pub const GATE_PROVENANCE_CONSISTENCY: &str = "provenance-consistency";
pub const GATE_MAPPING_COMPLETENESS: &str = "mapping-completeness";
pub const GATE_GAP_PARITY: &str = "gap-parity";
pub const GATE_DESIGN_CALIBRATION: &str = "design-calibration";

pub const PIPELINE_GATES: [&str; 6] = [
    GATE_STRUCTURAL_INTEGRITY,
    GATE_CHECKSUM_CHAIN,
    GATE_PROVENANCE_CONSISTENCY,
    GATE_MAPPING_COMPLETENESS,
    GATE_GAP_PARITY,
    GATE_DESIGN_CALIBRATION,
];

const UNKNOWN_EXPORT: &str = "unknown-export";

// ===== Export documents =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportContract {
    pub schema_version: SchemaVersion,
    pub export_id: String,
    pub source_checksum: String,
    pub gaps: Vec<GapEntry>,
    pub features: Vec<FeatureEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GapEntry {
    pub gap_id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureEntry {
    pub feature_id: String,
    pub title: String,
}

/// `artifacts.json`. Entries stay raw until each passes the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactsDocument {
    pub schema_version: SchemaVersion,
    pub artifacts: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskMappingDocument {
    pub schema_version: SchemaVersion,
    pub mapping: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecksumLedger {
    pub schema_version: SchemaVersion,
    pub algorithm: String,
    /// Relative path -> `sha256:<hex>`.
    pub files: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvenanceDocument {
    pub schema_version: SchemaVersion,
    pub source_checksum: String,
    pub generator: String,
    pub inputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesignCalibration {
    pub schema_version: SchemaVersion,
    pub baseline_score: f64,
    pub current_score: f64,
    pub tolerance: f64,
}

/// Export documents as loaded from disk, plus every loading problem.
///
/// A document is `None` when it is absent or did not load cleanly.
#[derive(Debug, Clone, Default)]
pub struct ExportBundle {
    pub contract: Option<ExportContract>,
    pub artifacts: Option<Vec<ArtifactIntent>>,
    pub task_mapping: Option<TaskMappingDocument>,
    pub checksums: Option<ChecksumLedger>,
    pub problems: Vec<String>,
}

impl ExportBundle {
    pub fn load(
        export_dir: &Path,
        config: &PipelineConfig,
        enforcer: &BoundaryEnforcer,
    ) -> Self {
        let mut bundle = ExportBundle::default();

        for name in &config.required_files {
            if !export_dir.join(name).is_file() {
                bundle.problems.push(format!("missing required file {}", name));
            }
        }

        bundle.contract = load_document::<ExportContract>(
            export_dir,
            EXPORT_CONTRACT_FILE,
            &mut bundle.problems,
        );
        bundle.task_mapping = load_document::<TaskMappingDocument>(
            export_dir,
            TASK_MAPPING_FILE,
            &mut bundle.problems,
        );
        bundle.checksums =
            load_document::<ChecksumLedger>(export_dir, CHECKSUMS_FILE, &mut bundle.problems)
                .and_then(|ledger| check_ledger(ledger, &mut bundle.problems));
        bundle.artifacts =
            load_document::<ArtifactsDocument>(export_dir, ARTIFACTS_FILE, &mut bundle.problems)
                .and_then(|doc| admit_artifacts(doc, enforcer, &mut bundle.problems));

        // Required files outside the known set only need to parse.
        let known = [
            EXPORT_CONTRACT_FILE,
            ARTIFACTS_FILE,
            TASK_MAPPING_FILE,
            CHECKSUMS_FILE,
        ];
        for name in &config.required_files {
            if !known.contains(&name.as_str()) {
                load_document::<Value>(export_dir, name, &mut bundle.problems);
            }
        }

        if let Some(contract) = &bundle.contract {
            report_duplicates(
                EXPORT_CONTRACT_FILE,
                "gap_id",
                contract.gaps.iter().map(|g| g.gap_id.as_str()),
                &mut bundle.problems,
            );
            report_duplicates(
                EXPORT_CONTRACT_FILE,
                "feature_id",
                contract.features.iter().map(|f| f.feature_id.as_str()),
                &mut bundle.problems,
            );
        }
        if let Some(artifacts) = &bundle.artifacts {
            report_duplicates(
                ARTIFACTS_FILE,
                "artifact_id",
                artifacts.iter().map(|a| a.artifact_id.as_str()),
                &mut bundle.problems,
            );
        }

        bundle
    }

    pub fn export_id(&self) -> Option<&str> {
        self.contract.as_ref().map(|c| c.export_id.as_str())
    }

    pub fn gap_ids(&self) -> Option<BTreeSet<String>> {
        self.contract
            .as_ref()
            .map(|c| c.gaps.iter().map(|g| g.gap_id.clone()).collect())
    }

    pub fn feature_ids(&self) -> Option<BTreeSet<String>> {
        self.contract
            .as_ref()
            .map(|c| c.features.iter().map(|f| f.feature_id.clone()).collect())
    }

    pub fn artifact_ids(&self) -> Option<BTreeSet<String>> {
        self.artifacts
            .as_ref()
            .map(|a| a.iter().map(|x| x.artifact_id.clone()).collect())
    }
}

fn load_document<T: DeserializeOwned>(
    dir: &Path,
    name: &str,
    problems: &mut Vec<String>,
) -> Option<T> {
    let path = dir.join(name);
    if !path.is_file() {
        return None;
    }
    match payload::read_json_file::<T>(&path) {
        Ok(doc) => Some(doc),
        Err(e) => {
            problems.push(format!("{} does not parse: {}", name, e));
            None
        }
    }
}

fn check_ledger(ledger: ChecksumLedger, problems: &mut Vec<String>) -> Option<ChecksumLedger> {
    let mut usable = true;
    if ledger.algorithm != "sha256" {
        problems.push(format!(
            "{} uses unsupported algorithm `{}`",
            CHECKSUMS_FILE, ledger.algorithm
        ));
        usable = false;
    }
    for (path, hash) in &ledger.files {
        if checksum::escapes_root(path) {
            problems.push(format!(
                "{} entry `{}` escapes the export directory",
                CHECKSUMS_FILE, path
            ));
            usable = false;
        }
        if !hash.starts_with(SHA256_PREFIX) {
            problems.push(format!(
                "{} entry `{}` is not a {}<hex> hash",
                CHECKSUMS_FILE, path, SHA256_PREFIX
            ));
        }
    }
    usable.then_some(ledger)
}

fn admit_artifacts(
    doc: ArtifactsDocument,
    enforcer: &BoundaryEnforcer,
    problems: &mut Vec<String>,
) -> Option<Vec<ArtifactIntent>> {
    let mut admitted = Vec::with_capacity(doc.artifacts.len());
    let mut clean = true;
    for (index, raw) in doc.artifacts.into_iter().enumerate() {
        if let Err(e) = enforcer.validate_inbound(ContractKind::ArtifactIntent.name(), &raw) {
            clean = false;
            for v in e.violations() {
                let pointer = if v.json_pointer == "/" {
                    format!("/artifacts/{}", index)
                } else {
                    format!("/artifacts/{}{}", index, v.json_pointer)
                };
                problems.push(format!(
                    "{} [{}] {}: {}",
                    ARTIFACTS_FILE, v.error_code, pointer, v.message
                ));
            }
            continue;
        }
        match serde_json::from_value::<ArtifactIntent>(raw) {
            Ok(a) => admitted.push(a),
            Err(e) => {
                clean = false;
                problems.push(format!("{} /artifacts/{}: {}", ARTIFACTS_FILE, index, e));
            }
        }
    }
    clean.then_some(admitted)
}

fn report_duplicates<'a>(
    file: &str,
    field: &str,
    ids: impl Iterator<Item = &'a str>,
    problems: &mut Vec<String>,
) {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut dups = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            dups.insert(id);
        }
    }
    if !dups.is_empty() {
        let dups: Vec<&str> = dups.into_iter().collect();
        problems.push(format!("{} has duplicate {}: {}", file, field, dups.join(", ")));
    }
}

// ===== Report =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineGateEntry {
    pub gate_id: String,
    pub status: GateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GateResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl PipelineGateEntry {
    fn evaluated(result: GateResult) -> Self {
        Self {
            gate_id: result.gate_id.clone(),
            status: if result.passed {
                GateStatus::Passed
            } else {
                GateStatus::Failed
            },
            result: Some(result),
            skip_reason: None,
        }
    }

    fn skipped(gate_id: &str, reason: String) -> Self {
        Self {
            gate_id: gate_id.to_string(),
            status: GateStatus::Skipped,
            result: None,
            skip_reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub export_dir: String,
    pub export_id: Option<String>,
    pub healthy: bool,
    pub failed_gate: Option<String>,
    pub reason: Option<String>,
    pub next_action: Option<String>,
    /// Gate ids that failed at warning severity.
    pub warnings: Vec<String>,
    pub gates: Vec<PipelineGateEntry>,
    pub run_id: String,
    pub generated_at: String,
}

impl PipelineReport {
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn gate(&self, gate_id: &str) -> Option<&PipelineGateEntry> {
        self.gates.iter().find(|g| g.gate_id == gate_id)
    }

    /// Serialized report without run id or timestamps. Identical for
    /// identical inputs.
    pub fn canonical_json_bytes(&self) -> Result<Vec<u8>, ContractGateError> {
        let mut stable = self.clone();
        stable.run_id = String::new();
        stable.generated_at = String::new();
        for entry in &mut stable.gates {
            entry.result = entry.result.as_ref().map(GateResult::without_timestamp);
        }
        Ok(checksum::canonical_json_bytes(&serde_json::to_value(&stable)?)?)
    }
}

// ===== Checker =====

pub fn check_pipeline(
    export_dir: &Path,
    config: &GatesConfig,
) -> Result<PipelineReport, ContractGateError> {
    Ok(inspect_export(export_dir, config)?.0)
}

/// Run the battery and hand back the loaded documents alongside the report.
pub fn inspect_export(
    export_dir: &Path,
    config: &GatesConfig,
) -> Result<(PipelineReport, ExportBundle), ContractGateError> {
    if !export_dir.is_dir() {
        return Err(ContractGateError::NotFound(format!(
            "export directory {}",
            export_dir.display()
        )));
    }
    let enforcer = match config.telemetry.event_sink() {
        Some(sink) => BoundaryEnforcer::with_sink(sink),
        None => BoundaryEnforcer::new(),
    };
    let bundle = ExportBundle::load(export_dir, &config.pipeline, &enforcer);
    let task_id = bundle.export_id().unwrap_or(UNKNOWN_EXPORT).to_string();
    let run_id = time::new_event_id();
    tracing::info!(export_dir = %export_dir.display(), run_id = %run_id, "checking pipeline");

    let structural = Ok(structural_integrity(&task_id, &bundle));
    let checksum = checksum_gate(export_dir, &task_id, &bundle);
    let provenance = provenance_gate(export_dir, &task_id, &bundle, &config.pipeline);
    let mapping = mapping_gate(&task_id, &bundle);
    let gap = gap_gate(&task_id, &bundle);
    let calibration = Ok(calibration_gate(export_dir, &task_id, &config.pipeline));
    let outcomes = [
        (GATE_STRUCTURAL_INTEGRITY, structural),
        (GATE_CHECKSUM_CHAIN, checksum),
        (GATE_PROVENANCE_CONSISTENCY, provenance),
        (GATE_MAPPING_COMPLETENESS, mapping),
        (GATE_GAP_PARITY, gap),
        (GATE_DESIGN_CALIBRATION, calibration),
    ];

    let mut checker = GateChecker::new(&run_id);
    let mut entries = Vec::with_capacity(PIPELINE_GATES.len());
    for (gate_id, outcome) in outcomes {
        match outcome {
            Ok(result) => {
                let recorded = checker.record(result).clone();
                entries.push(PipelineGateEntry::evaluated(recorded));
            }
            Err(reason) => {
                tracing::debug!(gate = gate_id, reason = %reason, "gate skipped");
                entries.push(PipelineGateEntry::skipped(gate_id, reason));
            }
        }
    }

    let first = checker.first_blocking_failure();
    let report = PipelineReport {
        export_dir: export_dir.display().to_string(),
        export_id: bundle.export_id().map(str::to_string),
        healthy: !checker.has_blocking_failure(),
        failed_gate: first.map(|r| r.gate_id.clone()),
        reason: first.map(|r| r.reason.clone()),
        next_action: first.map(|r| r.next_action.clone()),
        warnings: checker.warnings().iter().map(|r| r.gate_id.clone()).collect(),
        gates: entries,
        run_id,
        generated_at: time::now_epoch_z(),
    };
    Ok((report, bundle))
}

fn not_loaded(inputs: &[(&str, bool)]) -> String {
    let missing: Vec<&str> = inputs
        .iter()
        .filter(|(_, loaded)| !loaded)
        .map(|(name, _)| *name)
        .collect();
    format!("input not loaded: {}", missing.join(", "))
}

fn structural_integrity(task_id: &str, bundle: &ExportBundle) -> GateResult {
    if bundle.problems.is_empty() {
        return gates::gate_result(
            GATE_STRUCTURAL_INTEGRITY,
            task_id,
            PHASE_EXPORT,
            true,
            "all export documents are present and well-formed".to_string(),
            gates::NEXT_ACTION_NONE.to_string(),
        );
    }
    gates::gate_result(
        GATE_STRUCTURAL_INTEGRITY,
        task_id,
        PHASE_EXPORT,
        false,
        format!(
            "{} structural problem(s): {}",
            bundle.problems.len(),
            output::preview_messages(&bundle.problems, 3, 200)
        ),
        "regenerate the export so every required document is present and matches its closed shape"
            .to_string(),
    )
}

fn checksum_gate(
    export_dir: &Path,
    task_id: &str,
    bundle: &ExportBundle,
) -> Result<GateResult, String> {
    let Some(ledger) = &bundle.checksums else {
        return Err(not_loaded(&[(CHECKSUMS_FILE, false)]));
    };
    let actual: BTreeMap<String, String> = checksum::rehash_files(export_dir, ledger.files.keys())
        .into_iter()
        .filter_map(|(path, outcome)| match outcome {
            Rehash::Hashed(h) => Some((path, h)),
            Rehash::Missing | Rehash::OutsideRoot => None,
            Rehash::Unreadable(e) => {
                tracing::warn!(path = %path, error = %e, "could not rehash export file");
                None
            }
        })
        .collect();
    Ok(
        gates::checksum_chain(GATE_CHECKSUM_CHAIN, task_id, &ledger.files, &actual)
            .with_phase(PHASE_EXPORT),
    )
}

fn provenance_gate(
    export_dir: &Path,
    task_id: &str,
    bundle: &ExportBundle,
    config: &PipelineConfig,
) -> Result<GateResult, String> {
    let path = export_dir.join(&config.provenance_file);
    if !path.is_file() {
        return Err(format!("{} not present", config.provenance_file));
    }
    let provenance = match payload::read_json_file::<ProvenanceDocument>(&path) {
        Ok(p) => p,
        Err(e) => {
            return Ok(gates::gate_result(
                GATE_PROVENANCE_CONSISTENCY,
                task_id,
                PHASE_EXPORT,
                false,
                format!("{} does not parse: {}", config.provenance_file, e),
                format!("regenerate {}", config.provenance_file),
            ));
        }
    };
    let (Some(contract), Some(ledger)) = (&bundle.contract, &bundle.checksums) else {
        return Err(not_loaded(&[
            (EXPORT_CONTRACT_FILE, bundle.contract.is_some()),
            (CHECKSUMS_FILE, bundle.checksums.is_some()),
        ]));
    };

    if provenance.source_checksum != contract.source_checksum {
        return Ok(gates::gate_result(
            GATE_PROVENANCE_CONSISTENCY,
            task_id,
            PHASE_EXPORT,
            false,
            format!(
                "provenance source checksum {} differs from export source checksum {}",
                provenance.source_checksum, contract.source_checksum
            ),
            format!(
                "re-export from the source recorded by {} or regenerate provenance",
                provenance.generator
            ),
        ));
    }
    Ok(gates::checksum_chain(
        GATE_PROVENANCE_CONSISTENCY,
        task_id,
        &provenance.inputs,
        &ledger.files,
    )
    .with_phase(PHASE_EXPORT))
}

fn mapping_gate(task_id: &str, bundle: &ExportBundle) -> Result<GateResult, String> {
    let (Some(artifact_ids), Some(mapping)) = (bundle.artifact_ids(), &bundle.task_mapping) else {
        return Err(not_loaded(&[
            (ARTIFACTS_FILE, bundle.artifacts.is_some()),
            (TASK_MAPPING_FILE, bundle.task_mapping.is_some()),
        ]));
    };
    Ok(gates::mapping_completeness(
        GATE_MAPPING_COMPLETENESS,
        task_id,
        &artifact_ids,
        &mapping.mapping,
    )
    .with_phase(PHASE_EXPORT))
}

fn gap_gate(task_id: &str, bundle: &ExportBundle) -> Result<GateResult, String> {
    let (Some(gaps), Some(features)) = (bundle.gap_ids(), bundle.feature_ids()) else {
        return Err(not_loaded(&[(EXPORT_CONTRACT_FILE, false)]));
    };
    Ok(gates::gap_parity(GATE_GAP_PARITY, task_id, &gaps, &features))
}

fn calibration_gate(export_dir: &Path, task_id: &str, config: &PipelineConfig) -> GateResult {
    let path = export_dir.join(&config.design_calibration_file);
    let missing = |reason: String| {
        gates::gate_result(
            GATE_DESIGN_CALIBRATION,
            task_id,
            PHASE_EXPORT,
            false,
            reason,
            format!("run design calibration and write {}", config.design_calibration_file),
        )
        .with_severity(Severity::Warning)
    };
    if !path.is_file() {
        return missing(format!("{} not present", config.design_calibration_file));
    }
    match payload::read_json_file::<DesignCalibration>(&path) {
        Ok(c) => gates::design_calibration(
            GATE_DESIGN_CALIBRATION,
            task_id,
            c.baseline_score,
            c.current_score,
            c.tolerance,
        ),
        Err(e) => missing(format!(
            "{} does not parse: {}",
            config.design_calibration_file, e
        )),
    }
}

// ===== CLI =====

#[derive(Parser, Debug)]
pub struct CheckPipelineCli {
    /// Export directory to check.
    pub export_dir: PathBuf,
    /// Exit 1 when any blocking gate failed.
    #[clap(long)]
    pub fail_on_unhealthy: bool,
    /// Also write the JSON report to this path.
    #[clap(long)]
    pub report: Option<PathBuf>,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

pub fn run_check_pipeline_cli(
    cli: CheckPipelineCli,
    config: &GatesConfig,
) -> Result<(), ContractGateError> {
    let report = check_pipeline(&cli.export_dir, config)?;

    if let Some(path) = &cli.report {
        payload::write_json_file(path, &report)?;
    }

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report));
    }

    if cli.fail_on_unhealthy && !report.is_healthy() {
        return Err(ContractGateError::CheckFailed(format!(
            "pipeline unhealthy: {} failed",
            report.failed_gate.as_deref().unwrap_or("a blocking gate")
        )));
    }
    Ok(())
}

pub fn render_text(report: &PipelineReport) -> String {
    let mut out = format!(
        "Pipeline integrity: {} (export {})\n",
        report.export_dir,
        report.export_id.as_deref().unwrap_or(UNKNOWN_EXPORT)
    );
    for entry in &report.gates {
        match (&entry.result, &entry.skip_reason) {
            (Some(r), _) => out.push_str(&format!(
                "  [{}] {}: {}\n",
                output::status_word(r.passed, r.severity == Severity::Blocking),
                entry.gate_id,
                output::reason_line(&r.reason)
            )),
            (None, reason) => out.push_str(&format!(
                "  [{}] {}: {}\n",
                output::skip_word(),
                entry.gate_id,
                reason.as_deref().unwrap_or("skipped")
            )),
        }
    }
    if report.healthy {
        out.push_str("HEALTHY\n");
    } else {
        out.push_str("UNHEALTHY\n");
        if let Some(gate) = &report.failed_gate {
            out.push_str(&format!("  failed gate: {}\n", gate));
        }
        if let Some(reason) = &report.reason {
            out.push_str(&format!("  reason: {}\n", output::reason_line(reason)));
        }
        if let Some(action) = &report.next_action {
            out.push_str(&format!("  next action: {}\n", action));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        fs::write(dir.join(name), serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    }

    fn minimal_export(dir: &Path) {
        write(
            dir,
            EXPORT_CONTRACT_FILE,
            serde_json::json!({
                "schema_version": "v1",
                "export_id": "EXP-1",
                "source_checksum": "sha256:abc",
                "gaps": [{"gap_id": "G-1", "title": "one"}],
                "features": [{"feature_id": "G-1", "title": "one"}]
            }),
        );
        write(
            dir,
            ARTIFACTS_FILE,
            serde_json::json!({"schema_version": "v1", "artifacts": []}),
        );
        write(
            dir,
            TASK_MAPPING_FILE,
            serde_json::json!({"schema_version": "v1", "mapping": {}}),
        );
        write(
            dir,
            CHECKSUMS_FILE,
            serde_json::json!({"schema_version": "v1", "algorithm": "sha256", "files": {}}),
        );
    }

    #[test]
    fn ledger_paths_may_not_escape() {
        let tmp = TempDir::new().unwrap();
        minimal_export(tmp.path());
        write(
            tmp.path(),
            CHECKSUMS_FILE,
            serde_json::json!({
                "schema_version": "v1",
                "algorithm": "sha256",
                "files": {"../secret": "sha256:00"}
            }),
        );
        let report = check_pipeline(tmp.path(), &GatesConfig::default()).unwrap();
        assert!(!report.healthy);
        assert_eq!(report.failed_gate.as_deref(), Some(GATE_STRUCTURAL_INTEGRITY));
        assert_eq!(
            report.gate(GATE_CHECKSUM_CHAIN).unwrap().status,
            GateStatus::Skipped
        );
    }

    #[test]
    fn duplicate_gap_ids_are_structural() {
        let tmp = TempDir::new().unwrap();
        minimal_export(tmp.path());
        write(
            tmp.path(),
            EXPORT_CONTRACT_FILE,
            serde_json::json!({
                "schema_version": "v1",
                "export_id": "EXP-1",
                "source_checksum": "sha256:abc",
                "gaps": [{"gap_id": "G-1", "title": "a"}, {"gap_id": "G-1", "title": "b"}],
                "features": [{"feature_id": "G-1", "title": "one"}]
            }),
        );
        let report = check_pipeline(tmp.path(), &GatesConfig::default()).unwrap();
        let reason = report.reason.unwrap();
        assert!(reason.contains("duplicate gap_id: G-1"));
    }

    #[test]
    fn text_rendering_names_failed_gate() {
        let tmp = TempDir::new().unwrap();
        minimal_export(tmp.path());
        fs::remove_file(tmp.path().join(TASK_MAPPING_FILE)).unwrap();
        let report = check_pipeline(tmp.path(), &GatesConfig::default()).unwrap();
        let text = render_text(&report);
        assert!(text.contains("UNHEALTHY"));
        assert!(text.contains("failed gate: structural-integrity"));
        assert!(text.contains("mapping-completeness: input not loaded: task_mapping.json"));
    }

    #[test]
    fn missing_export_dir_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = check_pipeline(&tmp.path().join("nope"), &GatesConfig::default()).unwrap_err();
        assert!(matches!(err, ContractGateError::NotFound(_)));
    }
}
