//! Embedded JSON Schema documents.
//!
//! The four contract schemas under `schemas/` are baked into the binary so
//! `contract-gate schema` works without the source tree.

use crate::core::error::ContractGateError;
use crate::core::schemas::ContractKind;
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "schemas/"]
#[include = "*.schema.json"]
struct SchemaAssets;

/// Raw text of the embedded schema for `kind`.
pub fn get_schema_document(kind: ContractKind) -> Option<String> {
    SchemaAssets::get(kind.schema_file())
        .map(|file| String::from_utf8_lossy(file.data.as_ref()).into_owned())
}

pub fn list_schema_files() -> Vec<String> {
    let mut names: Vec<String> = SchemaAssets::iter().map(|n| n.to_string()).collect();
    names.sort();
    names
}

pub fn load_schema(kind: ContractKind) -> Result<serde_json::Value, ContractGateError> {
    let text = get_schema_document(kind).ok_or_else(|| {
        ContractGateError::NotFound(format!("embedded schema {}", kind.schema_file()))
    })?;
    Ok(serde_json::from_str(&text)?)
}
