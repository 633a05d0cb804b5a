//! Gate library: named, independent invariant checks.
//!
//! Every gate is a pure function over its typed inputs that returns one
//! `GateResult`. Results are blocking unless the gate says otherwise;
//! `with_phase` / `with_severity` adjust a result before it is recorded.
//!
//! `GateChecker` is the per-run accumulator. It is an ordinary value owned by
//! one run, never shared between runs.

use crate::core::contracts::{GateResult, SchemaVersion, Severity};
use crate::core::error::ContractGateError;
use crate::core::output;
use crate::core::schemas::ContractKind;
use crate::core::time::{self, Clock};
use crate::core::validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub const PHASE_EXPORT: &str = "export";
pub const PHASE_INGESTION: &str = "ingestion";
pub const PHASE_EXECUTION: &str = "execution";

pub const NEXT_ACTION_NONE: &str = "none";

/// Blocking result stamped with the wall clock. Building block for gates
/// defined outside this module.
pub fn gate_result(
    gate_id: &str,
    task_id: &str,
    phase: &str,
    passed: bool,
    reason: String,
    next_action: String,
) -> GateResult {
    GateResult {
        schema_version: SchemaVersion::V1,
        gate_id: gate_id.to_string(),
        task_id: task_id.to_string(),
        phase: phase.to_string(),
        passed,
        severity: Severity::Blocking,
        reason,
        next_action,
        checked_at: time::SystemClock.now(),
    }
}

fn pass(gate_id: &str, task_id: &str, phase: &str, reason: String) -> GateResult {
    gate_result(gate_id, task_id, phase, true, reason, NEXT_ACTION_NONE.to_string())
}

/// Every key in `expected` must carry an identical value in `actual`.
///
/// Keys only present in `actual` are ignored.
pub fn checksum_chain(
    gate_id: &str,
    task_id: &str,
    expected: &BTreeMap<String, String>,
    actual: &BTreeMap<String, String>,
) -> GateResult {
    let mut mismatched = Vec::new();
    let mut missing = Vec::new();
    for (key, want) in expected {
        match actual.get(key) {
            None => missing.push(key.as_str()),
            Some(got) if got != want => mismatched.push(key.as_str()),
            Some(_) => {}
        }
    }

    if mismatched.is_empty() && missing.is_empty() {
        return pass(
            gate_id,
            task_id,
            PHASE_INGESTION,
            format!("all {} recorded checksum(s) match", expected.len()),
        );
    }

    let mut parts = Vec::new();
    if !mismatched.is_empty() {
        parts.push(format!("checksum mismatch for: {}", mismatched.join(", ")));
    }
    if !missing.is_empty() {
        parts.push(format!("missing from actual: {}", missing.join(", ")));
    }
    let offenders: Vec<&str> = mismatched.iter().chain(missing.iter()).copied().collect();
    gate_result(
        gate_id,
        task_id,
        PHASE_INGESTION,
        false,
        parts.join("; "),
        format!(
            "re-run the upstream stage so recorded and actual checksums agree for: {}",
            offenders.join(", ")
        ),
    )
}

/// Every artifact id must be a key of `task_mapping`.
pub fn mapping_completeness<V>(
    gate_id: &str,
    task_id: &str,
    artifact_ids: &BTreeSet<String>,
    task_mapping: &BTreeMap<String, V>,
) -> GateResult {
    let unmapped: Vec<&str> = artifact_ids
        .iter()
        .filter(|id| !task_mapping.contains_key(id.as_str()))
        .map(String::as_str)
        .collect();

    if unmapped.is_empty() {
        return pass(
            gate_id,
            task_id,
            PHASE_INGESTION,
            format!("all {} artifact(s) are mapped to tasks", artifact_ids.len()),
        );
    }
    gate_result(
        gate_id,
        task_id,
        PHASE_INGESTION,
        false,
        format!(
            "{} of {} artifact(s) unmapped: {}",
            unmapped.len(),
            artifact_ids.len(),
            unmapped.join(", ")
        ),
        format!("add task mappings for: {}", unmapped.join(", ")),
    )
}

/// Declared gaps and produced features must be the same set.
///
/// A difference in either direction fails; both sides are named.
pub fn gap_parity(
    gate_id: &str,
    task_id: &str,
    gap_ids: &BTreeSet<String>,
    feature_ids: &BTreeSet<String>,
) -> GateResult {
    let dropped: Vec<&str> = gap_ids.difference(feature_ids).map(String::as_str).collect();
    let extra: Vec<&str> = feature_ids.difference(gap_ids).map(String::as_str).collect();

    if dropped.is_empty() && extra.is_empty() {
        return pass(
            gate_id,
            task_id,
            PHASE_EXPORT,
            format!("{} gap(s) and feature(s) match one to one", gap_ids.len()),
        );
    }

    let mut parts = Vec::new();
    let mut actions = Vec::new();
    if !dropped.is_empty() {
        parts.push(format!("dropped (gap without feature): {}", dropped.join(", ")));
        actions.push(format!("restore features for {}", dropped.join(", ")));
    }
    if !extra.is_empty() {
        parts.push(format!("extra (feature without gap): {}", extra.join(", ")));
        actions.push(format!("declare gaps for or remove {}", extra.join(", ")));
    }
    gate_result(
        gate_id,
        task_id,
        PHASE_EXPORT,
        false,
        parts.join("; "),
        actions.join("; "),
    )
}

/// Structural validation of one payload, reported as a gate.
pub fn schema_conformance(
    gate_id: &str,
    task_id: &str,
    kind: ContractKind,
    payload: &Value,
) -> GateResult {
    let violations = validate::validate(kind, payload);
    if violations.is_empty() {
        return pass(
            gate_id,
            task_id,
            PHASE_INGESTION,
            format!("payload conforms to {} v1", kind),
        );
    }
    let headlines: Vec<String> = violations.iter().map(|v| v.headline()).collect();
    gate_result(
        gate_id,
        task_id,
        PHASE_INGESTION,
        false,
        format!(
            "{} violation(s) against {} v1: {}",
            violations.len(),
            kind,
            output::preview_messages(&headlines, 3, 160)
        ),
        violations[0].next_action.clone(),
    )
}

/// Share of `required` present in `covered` must reach `min_ratio`.
pub fn coverage(
    gate_id: &str,
    task_id: &str,
    required: &BTreeSet<String>,
    covered: &BTreeSet<String>,
    min_ratio: f64,
) -> GateResult {
    let uncovered: Vec<&str> = required.difference(covered).map(String::as_str).collect();
    let ratio = if required.is_empty() {
        1.0
    } else {
        (required.len() - uncovered.len()) as f64 / required.len() as f64
    };

    if ratio >= min_ratio {
        return pass(
            gate_id,
            task_id,
            PHASE_EXPORT,
            format!(
                "coverage {:.2} meets threshold {:.2} ({} required)",
                ratio,
                min_ratio,
                required.len()
            ),
        );
    }
    gate_result(
        gate_id,
        task_id,
        PHASE_EXPORT,
        false,
        format!(
            "coverage {:.2} below threshold {:.2}; uncovered: {}",
            ratio,
            min_ratio,
            uncovered.join(", ")
        ),
        format!(
            "cover the remaining requirement(s): {}",
            uncovered.join(", ")
        ),
    )
}

/// Every path must match the naming convention.
pub fn output_convention(
    gate_id: &str,
    task_id: &str,
    paths: &[String],
    convention: &Regex,
) -> GateResult {
    let offenders: Vec<&str> = paths
        .iter()
        .filter(|p| !convention.is_match(p))
        .map(String::as_str)
        .collect();

    if offenders.is_empty() {
        return pass(
            gate_id,
            task_id,
            PHASE_EXECUTION,
            format!("{} output path(s) follow the convention", paths.len()),
        );
    }
    gate_result(
        gate_id,
        task_id,
        PHASE_EXECUTION,
        false,
        format!(
            "{} path(s) violate `{}`: {}",
            offenders.len(),
            convention.as_str(),
            offenders.join(", ")
        ),
        "rename the outputs to match the output convention and regenerate".to_string(),
    )
}

pub fn zero_failures(gate_id: &str, task_id: &str, passed: u64, failed: u64) -> GateResult {
    if failed == 0 {
        return pass(
            gate_id,
            task_id,
            PHASE_EXECUTION,
            format!("{} test(s) passed, none failed", passed),
        );
    }
    gate_result(
        gate_id,
        task_id,
        PHASE_EXECUTION,
        false,
        format!("{} test(s) failed ({} passed)", failed, passed),
        "fix the failing tests in the generated code before finalizing".to_string(),
    )
}

/// Drift between baseline and current design scores. Warning severity.
pub fn design_calibration(
    gate_id: &str,
    task_id: &str,
    baseline: f64,
    current: f64,
    tolerance: f64,
) -> GateResult {
    let result = if !(baseline.is_finite() && current.is_finite() && tolerance.is_finite()) {
        gate_result(
            gate_id,
            task_id,
            PHASE_EXPORT,
            false,
            "calibration scores are not finite numbers".to_string(),
            "re-run design calibration".to_string(),
        )
    } else {
        let drift = (current - baseline).abs();
        if drift <= tolerance {
            pass(
                gate_id,
                task_id,
                PHASE_EXPORT,
                format!("design drift {:.3} within tolerance {:.3}", drift, tolerance),
            )
        } else {
            gate_result(
                gate_id,
                task_id,
                PHASE_EXPORT,
                false,
                format!(
                    "design drift {:.3} exceeds tolerance {:.3} (baseline {:.3}, current {:.3})",
                    drift, tolerance, baseline, current
                ),
                "review the design deltas and recalibrate the baseline if intended".to_string(),
            )
        }
    };
    result.with_severity(Severity::Warning)
}

/// Ordered accumulation of gate results for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GateChecker {
    run_id: String,
    results: Vec<GateResult>,
}

impl GateChecker {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            results: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn record(&mut self, result: GateResult) -> &GateResult {
        if result.passed {
            tracing::debug!(gate = %result.gate_id, task = %result.task_id, "gate passed");
        } else {
            tracing::info!(
                gate = %result.gate_id,
                task = %result.task_id,
                severity = %result.severity,
                reason = %result.reason,
                "gate failed"
            );
        }
        self.results.push(result);
        &self.results[self.results.len() - 1]
    }

    pub fn results(&self) -> &[GateResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<GateResult> {
        self.results
    }

    pub fn has_blocking_failure(&self) -> bool {
        self.results.iter().any(GateResult::is_blocking_failure)
    }

    pub fn blocking_failures(&self) -> Vec<&GateResult> {
        self.results
            .iter()
            .filter(|r| r.is_blocking_failure())
            .collect()
    }

    pub fn first_blocking_failure(&self) -> Option<&GateResult> {
        self.results.iter().find(|r| r.is_blocking_failure())
    }

    pub fn warnings(&self) -> Vec<&GateResult> {
        self.results
            .iter()
            .filter(|r| !r.passed && r.severity == Severity::Warning)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Gates exposed on the `gate` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GateKind {
    Checksum,
    Mapping,
    Gap,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChecksumGateInput {
    expected: BTreeMap<String, String>,
    actual: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingGateInput {
    artifact_ids: BTreeSet<String>,
    task_mapping: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GapGateInput {
    gap_ids: BTreeSet<String>,
    feature_ids: BTreeSet<String>,
}

/// Decode a gate payload document and evaluate the gate.
pub fn evaluate_payload(
    kind: GateKind,
    gate_id: &str,
    task_id: &str,
    payload: &Value,
) -> Result<GateResult, ContractGateError> {
    let decode_err = |e: serde_json::Error| {
        ContractGateError::ValidationError(format!("{:?} gate payload: {}", kind, e))
    };
    let result = match kind {
        GateKind::Checksum => {
            let input: ChecksumGateInput =
                serde_json::from_value(payload.clone()).map_err(decode_err)?;
            checksum_chain(gate_id, task_id, &input.expected, &input.actual)
        }
        GateKind::Mapping => {
            let input: MappingGateInput =
                serde_json::from_value(payload.clone()).map_err(decode_err)?;
            mapping_completeness(gate_id, task_id, &input.artifact_ids, &input.task_mapping)
        }
        GateKind::Gap => {
            let input: GapGateInput = serde_json::from_value(payload.clone()).map_err(decode_err)?;
            gap_parity(gate_id, task_id, &input.gap_ids, &input.feature_ids)
        }
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn coverage_of_empty_requirement_set_passes() {
        let r = coverage("cov", "t", &set(&[]), &set(&["a"]), 1.0);
        assert!(r.passed);
    }

    #[test]
    fn coverage_names_uncovered_ids() {
        let r = coverage("cov", "t", &set(&["a", "b"]), &set(&["a"]), 1.0);
        assert!(!r.passed);
        assert!(r.reason.contains("uncovered: b"));
    }

    #[test]
    fn output_convention_lists_offenders() {
        let re = Regex::new(r"^src/[a-z_]+\.rs$").unwrap();
        let paths = vec!["src/ok.rs".to_string(), "src/Bad.rs".to_string()];
        let r = output_convention("conv", "t", &paths, &re);
        assert!(!r.passed);
        assert!(r.reason.contains("src/Bad.rs"));
        assert!(!r.reason.contains("src/ok.rs,"));
    }

    #[test]
    fn design_calibration_never_blocks() {
        let r = design_calibration("design", "t", 0.9, 0.5, 0.05);
        assert!(!r.passed);
        assert_eq!(r.severity, Severity::Warning);
        assert!(!r.is_blocking_failure());
        let nan = design_calibration("design", "t", f64::NAN, 0.5, 0.05);
        assert!(!nan.passed);
        assert_eq!(nan.severity, Severity::Warning);
    }

    #[test]
    fn zero_failures_blocks_on_any_failure() {
        assert!(zero_failures("tests", "t", 10, 0).passed);
        assert!(zero_failures("tests", "t", 10, 2).is_blocking_failure());
    }

    #[test]
    fn schema_conformance_uses_first_violation_action() {
        let r = schema_conformance(
            "handoff-schema",
            "t",
            ContractKind::Handoff,
            &serde_json::json!({"schema_version": "v1"}),
        );
        assert!(!r.passed);
        assert!(r.reason.contains("MISSING_REQUIRED_FIELD"));
        assert!(r.next_action.starts_with("add `handoff_id`"));
    }

    #[test]
    fn evaluate_payload_rejects_unknown_keys() {
        let payload = serde_json::json!({"gap_ids": [], "feature_ids": [], "extra": 1});
        assert!(evaluate_payload(GateKind::Gap, "g", "t", &payload).is_err());
    }
}
