//! Pilot simulator: a deterministic ten-span trace driven through the gates.
//!
//! Spans run in order S1..S10 under a single trace root. High-risk checks run
//! as named child spans under their phase. The first blocking gate failure
//! blocks its span and halts the trace; every later span stays `not_started`.
//!
//! Fault injection:
//! - `source_checksum`: a tampered source hash blocks S3 (checksum chain).
//! - `drop_feature`: a declared feature missing from the plan blocks S4.
//! - `test_failures`: any failed test blocks S8.
//!
//! Timestamps come from a logical clock, so the evidence file is byte-stable.

use crate::core::checksum;
use crate::core::config::{GatesConfig, PilotConfig};
use crate::core::contracts::{
    Contract, ExpectedOutput, GateResult, Handoff, SchemaVersion, SpanStatus, TaskSpan,
};
use crate::core::error::ContractGateError;
use crate::core::gates::{self, GateChecker, PHASE_EXECUTION};
use crate::core::output;
use crate::core::payload;
use crate::core::schemas::ContractKind;
use crate::core::time::{Clock, LogicalClock};
use crate::plugins::pilot_fixture::PilotScenario;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const PILOT_TASK_PREFIX: &str = "PILOT";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PilotParams {
    pub source_checksum: Option<String>,
    pub drop_feature: Option<String>,
    pub test_failures: u64,
}

impl PilotParams {
    /// `trace-<16 hex>` derived from the parameters.
    pub fn trace_id(&self) -> Result<String, ContractGateError> {
        let bytes = checksum::canonical_json_bytes(&serde_json::to_value(self)?)?;
        let digest = checksum::sha256_hex(&bytes);
        let hex = digest.trim_start_matches(checksum::SHA256_PREFIX);
        Ok(format!("trace-{}", &hex[..16]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    InitBaseline,
    ManifestCoverage,
    ExportContract,
    PlanIngest,
    TaskDecompose,
    AgentHandoff,
    CodeGenerate,
    TestExecute,
    ArtifactPackage,
    FinalizeVerify,
}

impl Phase {
    pub const ALL: [Phase; 10] = [
        Phase::InitBaseline,
        Phase::ManifestCoverage,
        Phase::ExportContract,
        Phase::PlanIngest,
        Phase::TaskDecompose,
        Phase::AgentHandoff,
        Phase::CodeGenerate,
        Phase::TestExecute,
        Phase::ArtifactPackage,
        Phase::FinalizeVerify,
    ];

    pub fn span_id(&self) -> &'static str {
        match self {
            Phase::InitBaseline => "S1",
            Phase::ManifestCoverage => "S2",
            Phase::ExportContract => "S3",
            Phase::PlanIngest => "S4",
            Phase::TaskDecompose => "S5",
            Phase::AgentHandoff => "S6",
            Phase::CodeGenerate => "S7",
            Phase::TestExecute => "S8",
            Phase::ArtifactPackage => "S9",
            Phase::FinalizeVerify => "S10",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::InitBaseline => "INIT_BASELINE",
            Phase::ManifestCoverage => "MANIFEST_COVERAGE",
            Phase::ExportContract => "EXPORT_CONTRACT",
            Phase::PlanIngest => "PLAN_INGEST",
            Phase::TaskDecompose => "TASK_DECOMPOSE",
            Phase::AgentHandoff => "AGENT_HANDOFF",
            Phase::CodeGenerate => "CODE_GENERATE",
            Phase::TestExecute => "TEST_EXECUTE",
            Phase::ArtifactPackage => "ARTIFACT_PACKAGE",
            Phase::FinalizeVerify => "FINALIZE_VERIFY",
        }
    }

    /// Named child checks nested under this phase.
    pub fn children(&self) -> &'static [&'static str] {
        match self {
            Phase::ManifestCoverage => &["coverage"],
            Phase::ExportContract => &["mapping_completeness", "checksum_chain"],
            Phase::PlanIngest => &["gap_parity"],
            Phase::AgentHandoff => &["handoff_schema"],
            Phase::CodeGenerate => &["output_convention"],
            Phase::FinalizeVerify => &["reconciliation"],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildCheck {
    pub span_id: String,
    pub parent_span_id: String,
    pub gate_id: String,
    pub status: SpanStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub span_id: String,
    pub parent_span_id: String,
    pub phase: String,
    pub status: SpanStatus,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub children: Vec<ChildCheck>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl Span {
    fn new(phase: Phase, trace_id: &str) -> Self {
        Self {
            span_id: phase.span_id().to_string(),
            parent_span_id: trace_id.to_string(),
            phase: phase.name().to_string(),
            status: SpanStatus::NotStarted,
            started_at: None,
            ended_at: None,
            children: phase
                .children()
                .iter()
                .map(|child| ChildCheck {
                    span_id: format!("{}.{}", phase.span_id(), child),
                    parent_span_id: phase.span_id().to_string(),
                    gate_id: child.replace('_', "-"),
                    status: SpanStatus::NotStarted,
                })
                .collect(),
            attributes: Map::new(),
        }
    }

    fn transition(&mut self, next: SpanStatus, clock: &dyn Clock) -> Result<(), ContractGateError> {
        if !self.status.can_transition_to(next) {
            return Err(ContractGateError::PilotError(format!(
                "span {} cannot move from {} to {}",
                self.span_id, self.status, next
            )));
        }
        match next {
            SpanStatus::InProgress => self.started_at = Some(clock.now()),
            _ => self.ended_at = Some(clock.now()),
        }
        self.status = next;
        Ok(())
    }

    fn child_mut(&mut self, gate_id: &str) -> Option<&mut ChildCheck> {
        self.children.iter_mut().find(|c| c.gate_id == gate_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedSpan {
    pub span_id: String,
    pub phase: String,
    pub gate_id: String,
    pub reason: String,
    pub next_action: String,
}

/// Evidence document written by `pilot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PilotTrace {
    pub schema_version: SchemaVersion,
    pub trace_id: String,
    pub params: PilotParams,
    pub completed: bool,
    pub blocked: bool,
    pub blocked_span: Option<BlockedSpan>,
    pub spans: Vec<Span>,
    pub gate_results: Vec<GateResult>,
}

impl PilotTrace {
    pub fn span(&self, span_id: &str) -> Option<&Span> {
        self.spans.iter().find(|s| s.span_id == span_id)
    }

    /// The trace as `TaskSpan` contracts: root first, then each span
    /// followed by its child checks.
    pub fn task_spans(&self) -> Vec<TaskSpan> {
        let root_status = if self.blocked {
            SpanStatus::Blocked
        } else if self.completed {
            SpanStatus::Completed
        } else {
            SpanStatus::InProgress
        };
        let first_start = self.spans.first().and_then(|s| s.started_at.clone());
        let last_end = self.spans.iter().rev().find_map(|s| s.ended_at.clone());

        let mut out = vec![TaskSpan {
            schema_version: SchemaVersion::V1,
            trace_id: self.trace_id.clone(),
            span_id: self.trace_id.clone(),
            parent_span_id: None,
            phase: "PILOT".to_string(),
            task_id: PILOT_TASK_PREFIX.to_string(),
            status: root_status,
            started_at: first_start.unwrap_or_default(),
            ended_at: last_end,
            attributes: None,
        }];
        for span in &self.spans {
            let task_id = format!("{}-{}", PILOT_TASK_PREFIX, span.span_id);
            out.push(TaskSpan {
                schema_version: SchemaVersion::V1,
                trace_id: self.trace_id.clone(),
                span_id: span.span_id.clone(),
                parent_span_id: Some(span.parent_span_id.clone()),
                phase: span.phase.clone(),
                task_id: task_id.clone(),
                status: span.status,
                started_at: span.started_at.clone().unwrap_or_default(),
                ended_at: span.ended_at.clone(),
                attributes: (!span.attributes.is_empty()).then(|| span.attributes.clone()),
            });
            for child in &span.children {
                let mut attributes = Map::new();
                attributes.insert("gate_id".to_string(), json!(child.gate_id));
                out.push(TaskSpan {
                    schema_version: SchemaVersion::V1,
                    trace_id: self.trace_id.clone(),
                    span_id: child.span_id.clone(),
                    parent_span_id: Some(child.parent_span_id.clone()),
                    phase: span.phase.clone(),
                    task_id: task_id.clone(),
                    status: child.status,
                    started_at: span.started_at.clone().unwrap_or_default(),
                    ended_at: span.ended_at.clone(),
                    attributes: Some(attributes),
                });
            }
        }
        out
    }
}

/// A gate evaluated within one span, optionally on behalf of a child check.
struct Check {
    child: Option<&'static str>,
    result: GateResult,
}

struct Pilot<'a> {
    scenario: &'a PilotScenario,
    config: &'a PilotConfig,
    clock: LogicalClock,
    checker: GateChecker,
}

pub fn run_pilot(
    params: &PilotParams,
    config: &PilotConfig,
) -> Result<PilotTrace, ContractGateError> {
    let scenario = PilotScenario::build(params)?;
    let trace_id = params.trace_id()?;
    let mut pilot = Pilot {
        scenario: &scenario,
        config,
        clock: LogicalClock::new(),
        checker: GateChecker::new(&trace_id),
    };

    let mut spans: Vec<Span> = Phase::ALL.iter().map(|p| Span::new(*p, &trace_id)).collect();
    let mut blocked_span = None;

    for (phase, span) in Phase::ALL.iter().zip(spans.iter_mut()) {
        span.transition(SpanStatus::InProgress, &pilot.clock)?;
        let (checks, attributes) = pilot.step(*phase, &trace_id)?;
        span.attributes = attributes;

        let mut first_failure: Option<GateResult> = None;
        for check in checks {
            let result = check.result.with_checked_at(pilot.clock.now());
            let failed = result.is_blocking_failure();
            if let Some(child) = check.child {
                let gate_id = child.replace('_', "-");
                if let Some(c) = span.child_mut(&gate_id) {
                    c.status = if failed {
                        SpanStatus::Blocked
                    } else {
                        SpanStatus::Completed
                    };
                }
            }
            if failed && first_failure.is_none() {
                first_failure = Some(result.clone());
            }
            pilot.checker.record(result);
        }

        if let Some(failure) = first_failure {
            span.transition(SpanStatus::Blocked, &pilot.clock)?;
            tracing::info!(span = %span.span_id, gate = %failure.gate_id, "pilot trace halted");
            blocked_span = Some(BlockedSpan {
                span_id: span.span_id.clone(),
                phase: span.phase.clone(),
                gate_id: failure.gate_id,
                reason: failure.reason,
                next_action: failure.next_action,
            });
            break;
        }
        span.transition(SpanStatus::Completed, &pilot.clock)?;
    }

    let blocked = blocked_span.is_some();
    Ok(PilotTrace {
        schema_version: SchemaVersion::V1,
        trace_id,
        params: params.clone(),
        completed: spans.iter().all(|s| s.status == SpanStatus::Completed),
        blocked,
        blocked_span,
        spans,
        gate_results: pilot.checker.into_results(),
    })
}

impl Pilot<'_> {
    fn step(
        &self,
        phase: Phase,
        trace_id: &str,
    ) -> Result<(Vec<Check>, Map<String, Value>), ContractGateError> {
        let s = self.scenario;
        let task = phase.span_id();
        let mut attributes = Map::new();
        let checks = match phase {
            Phase::InitBaseline => {
                attributes.insert("baseline_checksum".into(), json!(s.baseline_checksum));
                attributes.insert("gap_count".into(), json!(s.export.gaps.len()));
                vec![]
            }
            Phase::ManifestCoverage => {
                let required = s.gap_ids();
                let covered = s.export_feature_ids();
                vec![Check {
                    child: Some("coverage"),
                    result: gates::coverage("coverage", task, &required, &covered, 1.0),
                }]
            }
            Phase::ExportContract => {
                let expected =
                    BTreeMap::from([("source".to_string(), s.baseline_checksum.clone())]);
                let actual = BTreeMap::from([("source".to_string(), s.observed_checksum.clone())]);
                vec![
                    Check {
                        child: Some("mapping_completeness"),
                        result: gates::mapping_completeness(
                            "mapping-completeness",
                            task,
                            &s.artifact_ids(),
                            &s.task_mapping.mapping,
                        )
                        .with_phase(gates::PHASE_EXPORT),
                    },
                    Check {
                        child: Some("checksum_chain"),
                        result: gates::checksum_chain("checksum-chain", task, &expected, &actual)
                            .with_phase(gates::PHASE_EXPORT),
                    },
                ]
            }
            Phase::PlanIngest => vec![Check {
                child: Some("gap_parity"),
                result: gates::gap_parity("gap-parity", task, &s.gap_ids(), &s.plan.feature_ids())
                    .with_phase(gates::PHASE_INGESTION),
            }],
            Phase::TaskDecompose => {
                attributes.insert("task_count".into(), json!(s.plan.tasks.len()));
                vec![]
            }
            Phase::AgentHandoff => {
                let handoff = Handoff {
                    schema_version: SchemaVersion::V1,
                    handoff_id: format!("H-{}", task),
                    from_agent: "planner".to_string(),
                    to_agent: "artisan".to_string(),
                    capability_id: "codegen.rust".to_string(),
                    inputs: [("plan_id".to_string(), json!(s.plan.plan_id))].into_iter().collect(),
                    expected_output: ExpectedOutput {
                        artifact_type: "module".to_string(),
                        artifact_ids: s.artifact_ids().into_iter().collect(),
                        schema_ref: Some(ContractKind::ArtifactIntent.schema_file().to_string()),
                    },
                    constraints: vec![format!("paths match {}", self.config.output_convention)],
                    trace_id: Some(trace_id.to_string()),
                };
                attributes.insert("handoff_id".into(), json!(handoff.handoff_id));
                vec![Check {
                    child: Some("handoff_schema"),
                    result: gates::schema_conformance(
                        "handoff-schema",
                        task,
                        ContractKind::Handoff,
                        &handoff.to_payload()?,
                    ),
                }]
            }
            Phase::CodeGenerate => {
                let paths: Vec<String> = s.outputs.iter().map(|o| o.path.clone()).collect();
                attributes.insert("outputs".into(), json!(paths.len()));
                vec![Check {
                    child: Some("output_convention"),
                    result: gates::output_convention(
                        "output-convention",
                        task,
                        &paths,
                        &self.config.output_convention_regex()?,
                    ),
                }]
            }
            Phase::TestExecute => vec![Check {
                child: None,
                result: gates::zero_failures("test-outcome", task, s.tests.passed, s.tests.failed),
            }],
            Phase::ArtifactPackage => {
                attributes.insert("packaged".into(), json!(s.package_ledger().len()));
                vec![]
            }
            Phase::FinalizeVerify => {
                let recomputed: BTreeMap<String, String> = s
                    .outputs
                    .iter()
                    .map(|o| (o.path.clone(), checksum::sha256_hex(o.content.as_bytes())))
                    .collect();
                let ledger = s.package_ledger();
                vec![Check {
                    child: Some("reconciliation"),
                    result: gates::checksum_chain("reconciliation", task, &ledger, &recomputed)
                        .with_phase(PHASE_EXECUTION),
                }]
            }
        };
        Ok((checks, attributes))
    }
}

// ===== CLI =====

#[derive(Parser, Debug)]
pub struct PilotCli {
    /// Inject a source checksum (e.g. sha256:STALE); a mismatch blocks S3.
    #[clap(long)]
    pub source_checksum: Option<String>,
    /// Drop a declared feature from the plan; blocks S4.
    #[clap(long)]
    pub drop_feature: Option<String>,
    /// Inject failed tests; any nonzero count blocks S8.
    #[clap(long, default_value_t = 0)]
    pub test_failures: u64,
    /// Evidence path (defaults to pilot.trace_out).
    #[clap(long)]
    pub out: Option<PathBuf>,
    /// Materialize the scenario's export directory here.
    #[clap(long)]
    pub export_dir: Option<PathBuf>,
    /// Materialize the scenario's plan ingestion directory here.
    #[clap(long)]
    pub ingestion_dir: Option<PathBuf>,
    /// Materialize the scenario's code generation directory here.
    #[clap(long)]
    pub artisan_dir: Option<PathBuf>,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

pub fn run_pilot_cli(cli: PilotCli, config: &GatesConfig) -> Result<(), ContractGateError> {
    let params = PilotParams {
        source_checksum: cli.source_checksum,
        drop_feature: cli.drop_feature,
        test_failures: cli.test_failures,
    };
    let trace = run_pilot(&params, &config.pilot)?;

    let out = cli.out.unwrap_or_else(|| config.pilot.trace_out.clone());
    payload::write_json_file(&out, &trace)?;

    if cli.export_dir.is_some() || cli.ingestion_dir.is_some() || cli.artisan_dir.is_some() {
        let scenario = PilotScenario::build(&params)?;
        if let Some(dir) = &cli.export_dir {
            scenario.write_export(dir, &config.pipeline)?;
        }
        if let Some(dir) = &cli.ingestion_dir {
            scenario.write_ingestion(dir)?;
        }
        if let Some(dir) = &cli.artisan_dir {
            scenario.write_artisan(dir)?;
        }
    }

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&trace)?);
        return Ok(());
    }

    println!("Pilot trace {} -> {}", trace.trace_id, out.display());
    for span in &trace.spans {
        println!("  {:<4} {:<18} {}", span.span_id, span.phase, span.status);
    }
    match &trace.blocked_span {
        Some(b) => {
            println!(
                "[{}] halted at {} ({}) by {}",
                output::status_word(false, true),
                b.span_id,
                b.phase,
                b.gate_id
            );
            println!("  reason: {}", output::reason_line(&b.reason));
            println!("  next action: {}", b.next_action);
        }
        None => println!(
            "[{}] all {} spans completed",
            output::status_word(true, true),
            trace.spans.len()
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validate;

    #[test]
    fn trace_id_depends_on_params() {
        let a = PilotParams::default().trace_id().unwrap();
        let b = PilotParams {
            test_failures: 1,
            ..PilotParams::default()
        }
        .trace_id()
        .unwrap();
        assert!(a.starts_with("trace-"));
        assert_eq!(a.len(), "trace-".len() + 16);
        assert_ne!(a, b);
    }

    #[test]
    fn span_rejects_skipping_in_progress() {
        let clock = LogicalClock::new();
        let mut span = Span::new(Phase::InitBaseline, "trace-x");
        assert!(span.transition(SpanStatus::Completed, &clock).is_err());
        span.transition(SpanStatus::InProgress, &clock).unwrap();
        span.transition(SpanStatus::Completed, &clock).unwrap();
        assert!(span.transition(SpanStatus::Blocked, &clock).is_err());
    }

    #[test]
    fn exported_task_spans_validate() {
        let trace = run_pilot(
            &PilotParams {
                test_failures: 2,
                ..PilotParams::default()
            },
            &PilotConfig::default(),
        )
        .unwrap();
        let spans = trace.task_spans();
        assert_eq!(spans[0].span_id, trace.trace_id);
        for span in &spans {
            let payload = span.to_payload().unwrap();
            assert!(validate::is_valid(ContractKind::TaskSpan, &payload), "{:?}", span);
        }
    }

    #[test]
    fn child_checks_nest_under_their_phase() {
        let span = Span::new(Phase::ExportContract, "trace-x");
        let ids: Vec<&str> = span.children.iter().map(|c| c.span_id.as_str()).collect();
        assert_eq!(ids, vec!["S3.mapping_completeness", "S3.checksum_chain"]);
        assert!(span.children.iter().all(|c| c.parent_span_id == "S3"));
    }
}
