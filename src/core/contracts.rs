//! Strict Rust types for the four v1 contracts.
//!
//! Each struct mirrors its `SchemaDescriptor` one to one and rejects unknown
//! fields on deserialization. Optional fields are omitted rather than written
//! as `null`, so a serialized contract always re-validates cleanly.

use crate::core::error::ContractGateError;
use crate::core::output;
use crate::core::schemas::ContractKind;
use crate::core::validate::{self, ValidationViolation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[default]
    #[serde(rename = "v1")]
    V1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    NotStarted,
    InProgress,
    Blocked,
    Completed,
}

impl SpanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatus::NotStarted => "not_started",
            SpanStatus::InProgress => "in_progress",
            SpanStatus::Blocked => "blocked",
            SpanStatus::Completed => "completed",
        }
    }

    /// `not_started -> in_progress -> completed | blocked`; terminal states stay put.
    pub fn can_transition_to(&self, next: SpanStatus) -> bool {
        matches!(
            (self, next),
            (SpanStatus::NotStarted, SpanStatus::InProgress)
                | (SpanStatus::InProgress, SpanStatus::Completed)
                | (SpanStatus::InProgress, SpanStatus::Blocked)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SpanStatus::Completed | SpanStatus::Blocked)
    }
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocking,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Blocking => "blocking",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Module,
    Test,
    Config,
    Doc,
    Schema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskSpan {
    pub schema_version: SchemaVersion,
    pub trace_id: String,
    pub span_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub phase: String,
    pub task_id: String,
    pub status: SpanStatus,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectedOutput {
    pub artifact_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifact_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Handoff {
    pub schema_version: SchemaVersion,
    pub handoff_id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub capability_id: String,
    pub inputs: Map<String, Value>,
    pub expected_output: ExpectedOutput,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactIntent {
    pub schema_version: SchemaVersion,
    pub artifact_id: String,
    pub artifact_type: ArtifactType,
    pub feature_id: String,
    pub target_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Outcome of exactly one gate invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateResult {
    pub schema_version: SchemaVersion,
    pub gate_id: String,
    pub task_id: String,
    pub phase: String,
    pub passed: bool,
    pub severity: Severity,
    pub reason: String,
    pub next_action: String,
    pub checked_at: String,
}

impl GateResult {
    pub fn is_blocking_failure(&self) -> bool {
        !self.passed && self.severity == Severity::Blocking
    }

    pub fn with_phase(mut self, phase: &str) -> Self {
        self.phase = phase.to_string();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_checked_at(mut self, checked_at: String) -> Self {
        self.checked_at = checked_at;
        self
    }

    /// Copy with `checked_at` cleared, for comparing runs.
    pub fn without_timestamp(&self) -> Self {
        let mut out = self.clone();
        out.checked_at = String::new();
        out
    }
}

/// A closed, versioned document exchanged at a trust boundary.
pub trait Contract: Serialize + DeserializeOwned {
    const KIND: ContractKind;

    fn to_payload(&self) -> Result<Value, ContractGateError> {
        Ok(serde_json::to_value(self)?)
    }

    fn violations(&self) -> Result<Vec<ValidationViolation>, ContractGateError> {
        Ok(validate::validate(Self::KIND, &self.to_payload()?))
    }

    /// Validate first, then deserialize.
    fn from_payload(payload: &Value) -> Result<Self, ContractGateError> {
        let violations = validate::validate(Self::KIND, payload);
        if !violations.is_empty() {
            let lines: Vec<String> = violations.iter().map(|v| v.headline()).collect();
            return Err(ContractGateError::ValidationError(format!(
                "{} payload has {} violation(s): {}",
                Self::KIND,
                violations.len(),
                output::preview_messages(&lines, 3, 160)
            )));
        }
        Ok(serde_json::from_value(payload.clone())?)
    }
}

impl Contract for TaskSpan {
    const KIND: ContractKind = ContractKind::TaskSpan;
}

impl Contract for Handoff {
    const KIND: ContractKind = ContractKind::Handoff;
}

impl Contract for ArtifactIntent {
    const KIND: ContractKind = ContractKind::ArtifactIntent;
}

impl Contract for GateResult {
    const KIND: ContractKind = ContractKind::GateResult;
}
