//! JSONL telemetry sink for boundary failure events.
//!
//! Every rejected payload is written as one JSON line. Payload excerpts go
//! through `redact_payload` before they touch disk.

use crate::core::error::ContractGateError;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Replacement for the whole value of a credential-named field.
pub const REDACTED: &str = "[redacted]";

/// Key segments that mark a field as a credential. Keys are split on `_`,
/// `-` and `.` and matched segment by segment.
const CREDENTIAL_KEY_SEGMENTS: &[&str] = &[
    "token",
    "secret",
    "password",
    "passwd",
    "credential",
    "credentials",
    "apikey",
    "authorization",
    "cookie",
];

/// One scan applied to free-text values such as handoff inputs or span
/// attributes.
struct RedactionRule {
    name: &'static str,
    pattern: Regex,
}

static RULES: LazyLock<Vec<RedactionRule>> = LazyLock::new(|| {
    [
        (
            "private-key",
            r"(?s)-----BEGIN [A-Z ]*PRIVATE KEY-----.*?(?:-----END [A-Z ]*PRIVATE KEY-----|$)",
        ),
        ("url-credentials", r"(?i)\b[a-z][a-z0-9+.-]*://[^\s/:@'\x22]+:[^\s/@'\x22]+@"),
        ("bearer", r"(?i)\bbearer\s+[A-Za-z0-9._~+/=-]{16,}"),
        ("github-token", r"\bgh[pousr]_[A-Za-z0-9]{36,}"),
        ("aws-access-key", r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b"),
        (
            "assignment",
            r"(?i)\b(?:api[_-]?key|secret|password|passwd|token)\s*[=:]\s*[^\s,;'\x22]{8,}",
        ),
    ]
    .into_iter()
    .filter_map(|(name, pattern)| {
        Regex::new(pattern)
            .ok()
            .map(|pattern| RedactionRule { name, pattern })
    })
    .collect()
});

fn is_credential_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    let segments: Vec<&str> = lower
        .split(['_', '-', '.'])
        .filter(|s| !s.is_empty())
        .collect();
    // `api_key`, `private_key`, `access_key`; a bare `key` is left alone.
    segments.iter().any(|s| CREDENTIAL_KEY_SEGMENTS.contains(s))
        || (segments.len() > 1 && segments.last() == Some(&"key"))
}

/// Scrub credentials embedded in free text.
pub fn redact_text(input: &str) -> String {
    RULES.iter().fold(input.to_string(), |text, rule| {
        let replacement = format!("[redacted:{}]", rule.name);
        rule.pattern
            .replace_all(&text, replacement.as_str())
            .into_owned()
    })
}

/// Copy of a contract payload safe to log: credential-named fields are
/// replaced whole, every other string is scanned with `redact_text`.
pub fn redact_payload(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    let scrubbed = if is_credential_key(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_payload(val)
                    };
                    (key.clone(), scrubbed)
                })
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_payload).collect()),
        Value::String(s) => Value::String(redact_text(s)),
        other => other.clone(),
    }
}

/// Append-only JSONL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSink {
    path: PathBuf,
}

impl EventSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append<T: Serialize>(&self, event: &T) -> Result<(), ContractGateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    pub fn last_events(&self, n: usize) -> Result<Vec<Value>, ContractGateError> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let content = fs::read_to_string(&self.path)?;
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(n);
        lines[start..]
            .iter()
            .map(|line| serde_json::from_str(line).map_err(ContractGateError::from))
            .collect()
    }
}
