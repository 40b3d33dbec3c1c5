//! Key/value manifest written by the orchestrator next to the inputs.
//!
//! On disk the manifest maps a slot name to a `{ "key": ..., "value": ... }`
//! object:
//!
//! ```json
//! { "input_0": { "key": "input_0", "value": "sub/entry.py" } }
//! ```
//!
//! [`ManifestReader::read`] normalizes this into `{ slot: { key: value } }`.
//! The file may be rewritten at any moment, so it is re-read in full on every
//! call.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Normalized manifest: slot name -> (key -> value).
pub type Manifest = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("Malformed manifest {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Failed to read manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    key: String,
    value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestReader;

impl ManifestReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self, path: &Path) -> Result<Manifest, ManifestError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::Missing(path.to_path_buf()));
            }
            Err(source) => {
                return Err(ManifestError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let manifest = parse(&content).map_err(|reason| ManifestError::Malformed {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!(path = %path.display(), slots = manifest.len(), "Manifest loaded");
        Ok(manifest)
    }
}

fn parse(content: &str) -> Result<Manifest, String> {
    let raw: BTreeMap<String, RawEntry> =
        serde_json::from_str(content).map_err(|e| e.to_string())?;

    let mut manifest = Manifest::new();
    for (slot, entry) in raw {
        // Non-string values are kept in their JSON form.
        let value = match entry.value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        manifest
            .entry(slot)
            .or_default()
            .insert(entry.key, value);
    }
    Ok(manifest)
}

/// Looks up `manifest[slot][key]`.
pub fn lookup<'a>(manifest: &'a Manifest, slot: &str, key: &str) -> Option<&'a str> {
    manifest
        .get(slot)
        .and_then(|entries| entries.get(key))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("key_values.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_normalizes_slots() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(
            &dir,
            r#"{
  "input_0": {"key": "input_0", "value": "sub/entry.py"},
  "input_2": {"key": "threads", "value": 4}
}"#,
        );

        let manifest = ManifestReader::new().read(&path).unwrap();
        assert_eq!(lookup(&manifest, "input_0", "input_0"), Some("sub/entry.py"));
        assert_eq!(lookup(&manifest, "input_2", "threads"), Some("4"));
        assert_eq!(lookup(&manifest, "input_2", "input_2"), None);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ManifestReader::new()
            .read(&dir.path().join("key_values.json"))
            .unwrap_err();
        assert!(matches!(err, ManifestError::Missing(_)));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "{ not json");
        let err = ManifestReader::new().read(&path).unwrap_err();
        assert!(matches!(err, ManifestError::Malformed { .. }));
    }

    #[test]
    fn test_entry_without_value_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, r#"{"input_0": {"key": "input_0"}}"#);
        let err = ManifestReader::new().read(&path).unwrap_err();
        assert!(err.to_string().contains("value"));
    }

    #[test]
    fn test_entry_without_key_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, r#"{"input_0": {"value": "main.py"}}"#);
        assert!(matches!(
            ManifestReader::new().read(&path),
            Err(ManifestError::Malformed { .. })
        ));
    }

    #[test]
    fn test_rereads_after_rewrite() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, r#"{"input_0": {"key": "input_0", "value": "a.py"}}"#);
        let reader = ManifestReader::new();
        assert_eq!(
            lookup(&reader.read(&path).unwrap(), "input_0", "input_0"),
            Some("a.py")
        );

        write_manifest(&dir, r#"{"input_0": {"key": "input_0", "value": "b.py"}}"#);
        assert_eq!(
            lookup(&reader.read(&path).unwrap(), "input_0", "input_0"),
            Some("b.py")
        );
    }

    #[test]
    fn test_empty_object_is_valid() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir, "{}");
        assert!(ManifestReader::new().read(&path).unwrap().is_empty());
    }
}
