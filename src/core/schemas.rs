//! Centralized schema definitions for the four v1 contracts.
//!
//! Each contract is described once, as a static `SchemaDescriptor`. The
//! validator walks these descriptors, and the JSON Schema documents shipped
//! under `schemas/` are rendered from them (see `to_json_schema`).
//!
//! 1. TaskSpan: one unit of traced pipeline work.
//! 2. Handoff: a request passed from one agent to another.
//! 3. ArtifactIntent: a declared output of code generation.
//! 4. GateResult: the outcome of one gate invocation.

use crate::core::error::ContractGateError;
use serde_json::{Map, Value, json};
use std::fmt;

pub const SCHEMA_VERSION_V1: &str = "v1";
pub const JSON_SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

pub const SPAN_STATUSES: &[&str] = &["not_started", "in_progress", "blocked", "completed"];
pub const ARTIFACT_TYPES: &[&str] = &["module", "test", "config", "doc", "schema"];
pub const SEVERITIES: &[&str] = &["blocking", "warning"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Fixed string literal.
    Const(&'static str),
    /// Non-empty string.
    Id,
    /// Any string.
    Text,
    Bool,
    Enum(&'static [&'static str]),
    StringArray,
    /// Object with no declared shape; any keys allowed.
    OpenObject,
    /// Closed nested object.
    Object(&'static SchemaDescriptor),
}

impl FieldKind {
    pub fn expected_type(&self) -> &'static str {
        match self {
            FieldKind::Const(_) | FieldKind::Id | FieldKind::Text | FieldKind::Enum(_) => "string",
            FieldKind::Bool => "boolean",
            FieldKind::StringArray => "array of strings",
            FieldKind::OpenObject | FieldKind::Object(_) => "object",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub title: &'static str,
    pub fields: &'static [FieldSpec],
}

impl SchemaDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }
}

const fn req(name: &'static str, kind: FieldKind, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
        description,
    }
}

const fn opt(name: &'static str, kind: FieldKind, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
        description,
    }
}

const SCHEMA_VERSION_FIELD: FieldSpec = req(
    "schema_version",
    FieldKind::Const(SCHEMA_VERSION_V1),
    "Contract version",
);

pub static TASK_SPAN: SchemaDescriptor = SchemaDescriptor {
    title: "TaskSpan",
    fields: &[
        SCHEMA_VERSION_FIELD,
        req("trace_id", FieldKind::Id, "Trace this span belongs to"),
        req("span_id", FieldKind::Id, "Span identifier, unique within the trace"),
        opt("parent_span_id", FieldKind::Id, "Parent span; the trace root when absent"),
        req("phase", FieldKind::Id, "Pipeline phase the span executes"),
        req("task_id", FieldKind::Id, "Task the span works on"),
        req("status", FieldKind::Enum(SPAN_STATUSES), "Lifecycle status"),
        req("started_at", FieldKind::Text, "Start timestamp"),
        opt("ended_at", FieldKind::Text, "End timestamp"),
        opt("attributes", FieldKind::OpenObject, "Free-form span attributes"),
    ],
};

pub static EXPECTED_OUTPUT: SchemaDescriptor = SchemaDescriptor {
    title: "ExpectedOutput",
    fields: &[
        req("artifact_type", FieldKind::Id, "Kind of artifact expected back"),
        opt("artifact_ids", FieldKind::StringArray, "Artifacts the output must cover"),
        opt("schema_ref", FieldKind::Text, "Schema the output must satisfy"),
    ],
};

pub static HANDOFF: SchemaDescriptor = SchemaDescriptor {
    title: "Handoff",
    fields: &[
        SCHEMA_VERSION_FIELD,
        req("handoff_id", FieldKind::Id, "Handoff identifier"),
        req("from_agent", FieldKind::Id, "Sending agent"),
        req("to_agent", FieldKind::Id, "Receiving agent"),
        req("capability_id", FieldKind::Id, "Capability the receiver is asked to exercise"),
        req("inputs", FieldKind::OpenObject, "Inputs passed to the receiver"),
        req(
            "expected_output",
            FieldKind::Object(&EXPECTED_OUTPUT),
            "Shape of the output the sender expects",
        ),
        opt("constraints", FieldKind::StringArray, "Constraints the receiver must honor"),
        opt("trace_id", FieldKind::Id, "Trace the handoff belongs to"),
    ],
};

pub static ARTIFACT_INTENT: SchemaDescriptor = SchemaDescriptor {
    title: "ArtifactIntent",
    fields: &[
        SCHEMA_VERSION_FIELD,
        req("artifact_id", FieldKind::Id, "Artifact identifier"),
        req("artifact_type", FieldKind::Enum(ARTIFACT_TYPES), "Artifact category"),
        req("feature_id", FieldKind::Id, "Feature the artifact realizes"),
        req("target_path", FieldKind::Id, "Repository-relative output path"),
        opt("source_refs", FieldKind::StringArray, "Upstream references the artifact derives from"),
        opt("rationale", FieldKind::Text, "Why the artifact exists"),
    ],
};

pub static GATE_RESULT: SchemaDescriptor = SchemaDescriptor {
    title: "GateResult",
    fields: &[
        SCHEMA_VERSION_FIELD,
        req("gate_id", FieldKind::Id, "Gate identifier"),
        req("task_id", FieldKind::Id, "Task or run the gate evaluated"),
        req("phase", FieldKind::Id, "Pipeline phase of the check"),
        req("passed", FieldKind::Bool, "Whether the invariant held"),
        req(
            "severity",
            FieldKind::Enum(SEVERITIES),
            "Blocking failures halt the pipeline; warnings do not",
        ),
        req("reason", FieldKind::Text, "What was observed"),
        req("next_action", FieldKind::Text, "What to do next"),
        req("checked_at", FieldKind::Text, "Evaluation timestamp"),
    ],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContractKind {
    TaskSpan,
    Handoff,
    ArtifactIntent,
    GateResult,
}

impl ContractKind {
    pub const ALL: [ContractKind; 4] = [
        ContractKind::TaskSpan,
        ContractKind::Handoff,
        ContractKind::ArtifactIntent,
        ContractKind::GateResult,
    ];

    pub fn name(&self) -> &'static str {
        self.descriptor().title
    }

    pub fn descriptor(&self) -> &'static SchemaDescriptor {
        match self {
            ContractKind::TaskSpan => &TASK_SPAN,
            ContractKind::Handoff => &HANDOFF,
            ContractKind::ArtifactIntent => &ARTIFACT_INTENT,
            ContractKind::GateResult => &GATE_RESULT,
        }
    }

    pub fn schema_file(&self) -> &'static str {
        match self {
            ContractKind::TaskSpan => "task_span.v1.schema.json",
            ContractKind::Handoff => "handoff.v1.schema.json",
            ContractKind::ArtifactIntent => "artifact_intent.v1.schema.json",
            ContractKind::GateResult => "gate_result.v1.schema.json",
        }
    }

    /// Accepts `TaskSpan`, `task_span`, `task-span` and the schema file stem.
    pub fn from_name(name: &str) -> Result<Self, ContractGateError> {
        let key: String = name
            .trim()
            .trim_end_matches(".schema.json")
            .trim_end_matches(".v1")
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "taskspan" => Ok(ContractKind::TaskSpan),
            "handoff" => Ok(ContractKind::Handoff),
            "artifactintent" => Ok(ContractKind::ArtifactIntent),
            "gateresult" => Ok(ContractKind::GateResult),
            _ => Err(ContractGateError::UnknownContract(name.to_string())),
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Render the JSON Schema document for a contract.
pub fn to_json_schema(kind: ContractKind) -> Value {
    let mut doc = object_schema(kind.descriptor());
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("$schema".to_string(), json!(JSON_SCHEMA_DIALECT));
        obj.insert(
            "$id".to_string(),
            json!(format!("contract-gate/{}", kind.schema_file())),
        );
        obj.insert("title".to_string(), json!(kind.name()));
    }
    doc
}

fn object_schema(descriptor: &SchemaDescriptor) -> Value {
    let mut properties = Map::new();
    for field in descriptor.fields {
        properties.insert(field.name.to_string(), field_schema(field));
    }
    let required: Vec<&str> = descriptor.required_fields().map(|f| f.name).collect();
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": required,
        "properties": properties,
    })
}

fn field_schema(field: &FieldSpec) -> Value {
    let mut schema = match field.kind {
        FieldKind::Const(value) => return json!({ "const": value }),
        FieldKind::Id => json!({ "type": "string", "minLength": 1 }),
        FieldKind::Text => json!({ "type": "string" }),
        FieldKind::Bool => json!({ "type": "boolean" }),
        FieldKind::Enum(values) => json!({ "type": "string", "enum": values }),
        FieldKind::StringArray => json!({ "type": "array", "items": { "type": "string" } }),
        FieldKind::OpenObject => json!({ "type": "object" }),
        FieldKind::Object(nested) => object_schema(nested),
    };
    if let Some(obj) = schema.as_object_mut() {
        obj.insert("description".to_string(), json!(field.description));
    }
    schema
}
