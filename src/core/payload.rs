//! Payload arguments: a file path, `-` for stdin, or inline JSON.

use crate::core::error::ContractGateError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

pub fn read_payload(arg: &str) -> Result<Value, ContractGateError> {
    let text = if arg == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        let trimmed = arg.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            arg.to_string()
        } else {
            let path = Path::new(arg);
            if !path.is_file() {
                return Err(ContractGateError::NotFound(format!(
                    "payload file {} (pass a path, `-` for stdin, or inline JSON)",
                    arg
                )));
            }
            fs::read_to_string(path)?
        }
    };
    serde_json::from_str(&text).map_err(|e| {
        ContractGateError::ValidationError(format!("payload is not valid JSON: {}", e))
    })
}

/// Read and decode one JSON document from disk.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, ContractGateError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Pretty JSON plus trailing newline: the on-disk form of every document.
pub fn render_json_bytes<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ContractGateError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn write_json_file<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), ContractGateError> {
    write_bytes(path, &render_json_bytes(value)?)
}

/// Write `bytes`, creating parent directories.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), ContractGateError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, bytes)?;
    Ok(())
}
