use crate::core::boundary::BoundaryEnforcementError;
use std::env;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContractGateError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] env::VarError),
    #[error("Unknown contract: {0} (expected one of TaskSpan, Handoff, ArtifactIntent, GateResult)")]
    UnknownContract(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Pilot error: {0}")]
    PilotError(String),
    #[error("{0}")]
    CheckFailed(String),
    #[error(transparent)]
    Boundary(#[from] BoundaryEnforcementError),
}
