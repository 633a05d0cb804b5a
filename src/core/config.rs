use crate::core::error::ContractGateError;
use crate::core::trace::EventSink;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "CONTRACT_GATE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "contract-gate.toml";

pub const EXPORT_CONTRACT_FILE: &str = "export_contract.json";
pub const ARTIFACTS_FILE: &str = "artifacts.json";
pub const TASK_MAPPING_FILE: &str = "task_mapping.json";
pub const CHECKSUMS_FILE: &str = "checksums.json";

/// contract-gate.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatesConfig {
    pub pipeline: PipelineConfig,
    pub pilot: PilotConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Documents whose absence fails structural integrity.
    pub required_files: Vec<String>,
    pub provenance_file: String,
    pub design_calibration_file: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            required_files: [
                EXPORT_CONTRACT_FILE,
                ARTIFACTS_FILE,
                TASK_MAPPING_FILE,
                CHECKSUMS_FILE,
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            provenance_file: "provenance.json".to_string(),
            design_calibration_file: "design_calibration.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PilotConfig {
    pub trace_out: PathBuf,
    /// Regex every generated output path must match.
    pub output_convention: String,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            trace_out: PathBuf::from("out/pilot-trace.json"),
            output_convention: r"^src/[a-z0-9_]+(/[a-z0-9_]+)*\.rs$".to_string(),
        }
    }
}

impl PilotConfig {
    pub fn output_convention_regex(&self) -> Result<Regex, ContractGateError> {
        Regex::new(&self.output_convention).map_err(|e| {
            ContractGateError::ConfigError(format!(
                "pilot.output_convention is not a valid regex: {}",
                e
            ))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// JSONL log for boundary failure events; disabled when unset.
    pub events_log: Option<PathBuf>,
}

impl TelemetryConfig {
    pub fn event_sink(&self) -> Option<EventSink> {
        self.events_log.as_ref().map(EventSink::new)
    }
}

impl GatesConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ContractGateError> {
        toml::from_str(content).map_err(|e| ContractGateError::ConfigError(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ContractGateError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ContractGateError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// `--config`, then `$CONTRACT_GATE_CONFIG`, then `./contract-gate.toml`.
    ///
    /// An explicitly named file must exist. No config = defaults (not an error).
    pub fn load(explicit: Option<&Path>) -> Result<Self, ContractGateError> {
        if let Some(path) = explicit {
            tracing::debug!(path = %path.display(), "loading config from --config");
            return Self::from_file(path);
        }
        match env::var(CONFIG_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => {
                tracing::debug!(path = %value, "loading config from {}", CONFIG_ENV_VAR);
                return Self::from_file(Path::new(&value));
            }
            Ok(_) | Err(env::VarError::NotPresent) => {}
            Err(e) => return Err(e.into()),
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            tracing::debug!(path = %local.display(), "loading local config");
            return Self::from_file(local);
        }
        Ok(Self::default())
    }
}
