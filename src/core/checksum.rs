//! Content hashing for checksum ledgers.
//!
//! All hashes render as `sha256:<lowercase hex>`.

use crate::core::error::ContractGateError;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path};

pub const SHA256_PREFIX: &str = "sha256:";

pub fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    format!("{}{:x}", SHA256_PREFIX, hasher.finalize())
}

pub fn hash_file(path: &Path) -> Result<String, ContractGateError> {
    let bytes = fs::read(path)?;
    Ok(sha256_hex(&bytes))
}

/// Outcome of rehashing one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rehash {
    Hashed(String),
    Missing,
    /// Absolute, or climbs out of the root with `..`; never read.
    OutsideRoot,
    Unreadable(String),
}

/// True when `relative` would resolve outside the directory it is joined to.
pub fn escapes_root(relative: &str) -> bool {
    Path::new(relative)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Recompute hashes for `relative_paths` under `root` in parallel.
///
/// Result order follows the `BTreeMap` key order, independent of scheduling.
pub fn rehash_files<'a, I>(root: &Path, relative_paths: I) -> BTreeMap<String, Rehash>
where
    I: IntoIterator<Item = &'a String>,
{
    let paths: Vec<&String> = relative_paths.into_iter().collect();
    paths
        .par_iter()
        .map(|rel| {
            let full = root.join(rel.as_str());
            let outcome = if escapes_root(rel) {
                Rehash::OutsideRoot
            } else if !full.is_file() {
                Rehash::Missing
            } else {
                match hash_file(&full) {
                    Ok(h) => Rehash::Hashed(h),
                    Err(e) => Rehash::Unreadable(e.to_string()),
                }
            };
            ((*rel).clone(), outcome)
        })
        .collect()
}

/// Canonical JSON bytes: object keys sorted, no whitespace.
pub fn canonical_json_bytes(value: &serde_json::Value) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&normalize_json_value(value))
}

fn normalize_json_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut normalized = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                normalized.insert(key.clone(), normalize_json_value(&map[key]));
            }
            serde_json::Value::Object(normalized)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(normalize_json_value).collect())
        }
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sha256_hex_is_prefixed_and_stable() {
        let a = sha256_hex(b"abc");
        assert!(a.starts_with(SHA256_PREFIX));
        assert_eq!(
            a,
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn rehash_reports_missing_files() {
        let tmp = TempDir::new().expect("tmpdir");
        std::fs::write(tmp.path().join("a.json"), b"{}").expect("write");
        let names = vec!["a.json".to_string(), "b.json".to_string()];
        let out = rehash_files(tmp.path(), &names);
        assert_eq!(out["a.json"], Rehash::Hashed(sha256_hex(b"{}")));
        assert_eq!(out["b.json"], Rehash::Missing);
    }

    #[test]
    fn rehash_never_reads_outside_the_root() {
        let tmp = TempDir::new().expect("tmpdir");
        let root = tmp.path().join("artisan");
        std::fs::create_dir(&root).expect("mkdir");
        let secret = tmp.path().join("secret.rs");
        std::fs::write(&secret, b"fn main() {}").expect("write");
        let outside = secret.to_string_lossy().to_string();
        let names = vec!["../secret.rs".to_string(), outside.clone()];
        let out = rehash_files(&root, &names);
        assert_eq!(out["../secret.rs"], Rehash::OutsideRoot);
        assert_eq!(out[&outside], Rehash::OutsideRoot);
    }

    #[test]
    fn escapes_root_flags_absolute_and_parent_paths() {
        assert!(escapes_root("/etc/passwd"));
        assert!(escapes_root("../a.json"));
        assert!(escapes_root("src/../../a.rs"));
        assert!(!escapes_root("src/lib.rs"));
        assert!(!escapes_root("./src/lib.rs"));
    }

    #[test]
    fn canonical_bytes_ignore_key_order() {
        let a = serde_json::json!({"b": 1, "a": {"d": 2, "c": 3}});
        let b = serde_json::json!({"a": {"c": 3, "d": 2}, "b": 1});
        assert_eq!(
            canonical_json_bytes(&a).expect("a"),
            canonical_json_bytes(&b).expect("b")
        );
    }
}
