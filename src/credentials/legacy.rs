//! Legacy file-scan uniqueness.
//!
//! Advisory only: the relational global registry is authoritative, and
//! this checksum scan must never gate a registration. It exists purely
//! as an operational diagnostic (exposed via the `legacy-checksum` CLI
//! subcommand) for comparing on-disk container material across bots.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Canonicalizes a JSON value by recursively sorting object keys, so the
/// checksum is stable regardless of serialization order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            serde_json::to_value(sorted).unwrap_or(Value::Null)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Folds the canonicalized JSON serialization into a 32-bit running hash
/// (FNV-1a).
pub fn checksum(value: &Value) -> u32 {
    let canonical = canonicalize(value);
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();

    const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
    const FNV_PRIME: u32 = 0x01000193;

    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// One entry from a container-tree scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedContainer {
    pub path: PathBuf,
    pub checksum: u32,
}

/// Walks `auth/<tenant>/bot_<botId>/creds.json` files under `root` and
/// computes a checksum for each. Never consulted by the Registration
/// Engine; callers that want to flag possible duplicates do so purely as
/// an operator diagnostic.
pub fn scan_containers(root: &Path) -> std::io::Result<Vec<ScannedContainer>> {
    let mut results = Vec::new();
    if !root.exists() {
        return Ok(results);
    }

    for tenant_entry in std::fs::read_dir(root)? {
        let tenant_entry = tenant_entry?;
        if !tenant_entry.file_type()?.is_dir() {
            continue;
        }
        for bot_entry in std::fs::read_dir(tenant_entry.path())? {
            let bot_entry = bot_entry?;
            if !bot_entry.file_type()?.is_dir() {
                continue;
            }
            let creds_path = bot_entry.path().join("creds.json");
            if let Ok(contents) = std::fs::read_to_string(&creds_path)
                && let Ok(value) = serde_json::from_str::<Value>(&contents)
            {
                results.push(ScannedContainer {
                    path: creds_path,
                    checksum: checksum(&value),
                });
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checksum_is_stable_across_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(checksum(&a), checksum(&b));
    }

    #[test]
    fn checksum_differs_for_different_content() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(checksum(&a), checksum(&b));
    }

    #[test]
    fn scan_containers_finds_nested_creds() {
        let dir = tempfile::tempdir().unwrap();
        let bot_dir = dir.path().join("SERVER1").join("bot_abc");
        std::fs::create_dir_all(&bot_dir).unwrap();
        std::fs::write(bot_dir.join("creds.json"), r#"{"noiseKey":"x"}"#).unwrap();

        let found = scan_containers(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn scan_containers_on_missing_root_returns_empty() {
        let found = scan_containers(Path::new("/nonexistent/does/not/exist")).unwrap();
        assert!(found.is_empty());
    }
}
