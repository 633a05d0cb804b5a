//! Closed-schema validation for v1 contracts.
//!
//! `validate(kind, payload)` walks the contract's `SchemaDescriptor` over an
//! in-memory JSON tree and returns every structural defect it finds. It never
//! stops at the first one: callers get the full list in a stable order
//! (declared fields in declaration order, then undeclared keys sorted).
//!
//! Pointers follow RFC 6901 escaping, with the document root rendered as `/`.

use crate::core::error::ContractGateError;
use crate::core::schemas::{ContractKind, FieldKind, FieldSpec, SchemaDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const ROOT_POINTER: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    MissingRequiredField,
    ConstViolation,
    UnknownField,
    TypeMismatch,
    EnumViolation,
    EmptyValue,
    UnknownContract,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ViolationCode::ConstViolation => "CONST_VIOLATION",
            ViolationCode::UnknownField => "UNKNOWN_FIELD",
            ViolationCode::TypeMismatch => "TYPE_MISMATCH",
            ViolationCode::EnumViolation => "ENUM_VIOLATION",
            ViolationCode::EmptyValue => "EMPTY_VALUE",
            ViolationCode::UnknownContract => "UNKNOWN_CONTRACT",
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural defect in a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub error_code: ViolationCode,
    pub json_pointer: String,
    pub message: String,
    pub next_action: String,
}

impl ValidationViolation {
    /// `[CODE] pointer: message`
    pub fn headline(&self) -> String {
        format!("[{}] {}: {}", self.error_code, self.json_pointer, self.message)
    }
}

impl fmt::Display for ValidationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n-> {}", self.headline(), self.next_action)
    }
}

/// Validate `payload` against the named contract (`TaskSpan`, `handoff`, ...).
pub fn validate_named(
    schema_id: &str,
    payload: &Value,
) -> Result<Vec<ValidationViolation>, ContractGateError> {
    let kind = ContractKind::from_name(schema_id)?;
    Ok(validate(kind, payload))
}

pub fn validate(kind: ContractKind, payload: &Value) -> Vec<ValidationViolation> {
    validate_against(kind.descriptor(), payload)
}

pub fn validate_against(
    descriptor: &SchemaDescriptor,
    payload: &Value,
) -> Vec<ValidationViolation> {
    let mut out = Vec::new();
    walk_object(descriptor, payload, ROOT_POINTER, &mut out);
    out
}

pub fn is_valid(kind: ContractKind, payload: &Value) -> bool {
    validate(kind, payload).is_empty()
}

fn walk_object(
    descriptor: &SchemaDescriptor,
    value: &Value,
    pointer: &str,
    out: &mut Vec<ValidationViolation>,
) {
    let Some(map) = value.as_object() else {
        out.push(type_mismatch(pointer, "object", value));
        return;
    };

    for field in descriptor.fields {
        match map.get(field.name) {
            None if field.required => out.push(ValidationViolation {
                error_code: ViolationCode::MissingRequiredField,
                json_pointer: pointer.to_string(),
                message: format!("missing required field `{}`", field.name),
                next_action: format!(
                    "add `{}` ({}) to the object at {}",
                    field.name,
                    field.kind.expected_type(),
                    pointer
                ),
            }),
            None => {}
            Some(v) => check_field(field, v, &pointer_join(pointer, field.name), out),
        }
    }

    let mut undeclared: Vec<&String> = map
        .keys()
        .filter(|k| descriptor.field(k).is_none())
        .collect();
    undeclared.sort();
    for key in undeclared {
        out.push(ValidationViolation {
            error_code: ViolationCode::UnknownField,
            json_pointer: pointer_join(pointer, key),
            message: format!("field `{}` is not declared by {}", key, descriptor.title),
            next_action: format!(
                "remove `{}`; {} v1 is closed and admits no extra fields",
                key, descriptor.title
            ),
        });
    }
}

fn check_field(
    field: &FieldSpec,
    value: &Value,
    pointer: &str,
    out: &mut Vec<ValidationViolation>,
) {
    match field.kind {
        FieldKind::Const(expected) => {
            if value.as_str() != Some(expected) {
                out.push(ValidationViolation {
                    error_code: ViolationCode::ConstViolation,
                    json_pointer: pointer.to_string(),
                    message: format!("`{}` must be \"{}\", found {}", field.name, expected, value),
                    next_action: format!(
                        "set `{}` to \"{}\"; a new contract version needs a new schema, never a widened {}",
                        field.name, expected, expected
                    ),
                });
            }
        }
        FieldKind::Id => match value.as_str() {
            None => out.push(type_mismatch(pointer, "string", value)),
            Some(s) if s.trim().is_empty() => out.push(ValidationViolation {
                error_code: ViolationCode::EmptyValue,
                json_pointer: pointer.to_string(),
                message: format!("`{}` must not be empty", field.name),
                next_action: format!("provide a non-empty value for `{}`", field.name),
            }),
            Some(_) => {}
        },
        FieldKind::Text => {
            if !value.is_string() {
                out.push(type_mismatch(pointer, "string", value));
            }
        }
        FieldKind::Bool => {
            if !value.is_boolean() {
                out.push(type_mismatch(pointer, "boolean", value));
            }
        }
        FieldKind::Enum(allowed) => match value.as_str() {
            None => out.push(type_mismatch(pointer, "string", value)),
            Some(s) if !allowed.contains(&s) => out.push(ValidationViolation {
                error_code: ViolationCode::EnumViolation,
                json_pointer: pointer.to_string(),
                message: format!("`{}` is not a permitted {}", s, field.name),
                next_action: format!("use one of: {}", allowed.join(", ")),
            }),
            Some(_) => {}
        },
        FieldKind::StringArray => match value.as_array() {
            None => out.push(type_mismatch(pointer, "array", value)),
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        out.push(type_mismatch(&format!("{}/{}", pointer, i), "string", item));
                    }
                }
            }
        },
        FieldKind::OpenObject => {
            if !value.is_object() {
                out.push(type_mismatch(pointer, "object", value));
            }
        }
        FieldKind::Object(nested) => walk_object(nested, value, pointer, out),
    }
}

fn type_mismatch(pointer: &str, expected: &str, found: &Value) -> ValidationViolation {
    ValidationViolation {
        error_code: ViolationCode::TypeMismatch,
        json_pointer: pointer.to_string(),
        message: format!("expected {}, found {}", expected, json_type_name(found)),
        next_action: format!("change the value at {} to a {}", pointer, expected),
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn pointer_join(parent: &str, key: &str) -> String {
    let escaped = key.replace('~', "~0").replace('/', "~1");
    if parent == ROOT_POINTER {
        format!("/{}", escaped)
    } else {
        format!("{}/{}", parent, escaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gate_result() -> Value {
        json!({
            "schema_version": "v1",
            "gate_id": "checksum-chain",
            "task_id": "EXP-1",
            "phase": "export",
            "passed": true,
            "severity": "blocking",
            "reason": "all 3 checksums match",
            "next_action": "none",
            "checked_at": "0Z"
        })
    }

    #[test]
    fn valid_gate_result_has_no_violations() {
        assert!(validate(ContractKind::GateResult, &gate_result()).is_empty());
    }

    #[test]
    fn reports_every_defect_without_short_circuit() {
        let mut payload = gate_result();
        let obj = payload.as_object_mut().unwrap();
        obj.remove("gate_id");
        obj.insert("schema_version".into(), json!("v2"));
        obj.insert("passed".into(), json!("yes"));
        obj.insert("severity".into(), json!("fatal"));
        obj.insert("zeta".into(), json!(1));
        obj.insert("alpha".into(), json!(1));

        let codes: Vec<(ViolationCode, String)> = validate(ContractKind::GateResult, &payload)
            .into_iter()
            .map(|v| (v.error_code, v.json_pointer))
            .collect();
        assert_eq!(
            codes,
            vec![
                (ViolationCode::ConstViolation, "/schema_version".to_string()),
                (ViolationCode::MissingRequiredField, "/".to_string()),
                (ViolationCode::TypeMismatch, "/passed".to_string()),
                (ViolationCode::EnumViolation, "/severity".to_string()),
                (ViolationCode::UnknownField, "/alpha".to_string()),
                (ViolationCode::UnknownField, "/zeta".to_string()),
            ]
        );
    }

    #[test]
    fn non_object_payload_is_a_root_type_mismatch() {
        let v = validate(ContractKind::Handoff, &json!([1, 2]));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].error_code, ViolationCode::TypeMismatch);
        assert_eq!(v[0].json_pointer, "/");
    }

    #[test]
    fn nested_missing_field_points_at_owning_object() {
        let payload = json!({
            "schema_version": "v1",
            "handoff_id": "H-1",
            "from_agent": "planner",
            "to_agent": "artisan",
            "capability_id": "codegen.rust",
            "inputs": {},
            "expected_output": {"artifact_ids": ["A-1", 7], "extra": true}
        });
        let v = validate(ContractKind::Handoff, &payload);
        let pairs: Vec<(ViolationCode, &str)> = v
            .iter()
            .map(|x| (x.error_code, x.json_pointer.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (ViolationCode::MissingRequiredField, "/expected_output"),
                (ViolationCode::TypeMismatch, "/expected_output/artifact_ids/1"),
                (ViolationCode::UnknownField, "/expected_output/extra"),
            ]
        );
    }

    #[test]
    fn pointer_escapes_reserved_characters() {
        assert_eq!(pointer_join("/", "a/b"), "/a~1b");
        assert_eq!(pointer_join("/x", "m~n"), "/x/m~0n");
    }

    #[test]
    fn display_renders_headline_and_next_action() {
        let v = ValidationViolation {
            error_code: ViolationCode::ConstViolation,
            json_pointer: "/schema_version".into(),
            message: "bad".into(),
            next_action: "fix".into(),
        };
        assert_eq!(v.to_string(), "[CONST_VIOLATION] /schema_version: bad\n-> fix");
    }

    #[test]
    fn validate_named_rejects_unknown_contract() {
        assert!(matches!(
            validate_named("Manifest", &json!({})),
            Err(ContractGateError::UnknownContract(_))
        ));
    }
}
