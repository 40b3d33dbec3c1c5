//! Single-entrypoint resolution.
//!
//! Two strategies compete for the answer:
//!
//! 1. **Manifest**: slot `input_0` carries a key `input_0` whose value is a path
//!    relative to the code directory. The directive is trusted: if the file is
//!    missing the poll fails with [`DiscoveryError::EntrypointNotFound`] and
//!    never falls back to scanning.
//! 2. **Scan**: every `*.py` under the code directory. One match wins. Several
//!    matches narrow to files named `main.py`, which must then be unique.
//!
//! A poll either resolves, reports [`Resolution::Pending`] (nothing to look at
//! yet), or fails terminally.

use super::index::PathIndex;
use super::manifest::{self, ManifestError, ManifestReader};
use super::{absolutize, DiscoveryError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ENTRYPOINT_SLOT: &str = "input_0";
pub const ENTRYPOINT_KEY: &str = "input_0";
pub const SCRIPT_PATTERN: &str = "*.py";
pub const MAIN_SCRIPT: &str = "main.py";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryStrategy {
    Manifest,
    Scan,
}

impl fmt::Display for DiscoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryStrategy::Manifest => write!(f, "manifest"),
            DiscoveryStrategy::Scan => write!(f, "scan"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrypoint {
    pub path: PathBuf,
    pub strategy: DiscoveryStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingReason {
    /// The code directory holds no python scripts yet.
    NoScripts,
    /// The manifest is required but has not been written yet.
    ManifestNotWritten,
}

impl fmt::Display for PendingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingReason::NoScripts => write!(f, "no python scripts found yet"),
            PendingReason::ManifestNotWritten => write!(f, "manifest not written yet"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Entrypoint),
    Pending(PendingReason),
}

pub struct EntrypointResolver {
    code_dir: PathBuf,
    manifest_path: PathBuf,
    require_manifest: bool,
    index: PathIndex,
    reader: ManifestReader,
}

impl EntrypointResolver {
    pub fn new(code_dir: impl AsRef<Path>, manifest_path: impl AsRef<Path>) -> Self {
        Self {
            code_dir: absolutize(code_dir.as_ref()),
            manifest_path: absolutize(manifest_path.as_ref()),
            require_manifest: false,
            index: PathIndex::new(),
            reader: ManifestReader::new(),
        }
    }

    /// Treat an absent manifest as "not yet" instead of falling back to scanning.
    pub fn require_manifest(mut self, required: bool) -> Self {
        self.require_manifest = required;
        self
    }

    pub fn code_dir(&self) -> &Path {
        &self.code_dir
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Runs one resolution attempt against the current state of the disk.
    pub fn poll(&self) -> Result<Resolution, DiscoveryError> {
        match self.reader.read(&self.manifest_path) {
            Ok(manifest) => {
                if let Some(directive) =
                    manifest::lookup(&manifest, ENTRYPOINT_SLOT, ENTRYPOINT_KEY)
                {
                    return self.resolve_directive(directive).map(Resolution::Resolved);
                }
                debug!(
                    manifest = %self.manifest_path.display(),
                    "Manifest has no entrypoint directive, scanning"
                );
            }
            Err(ManifestError::Missing(_)) if self.require_manifest => {
                return Ok(Resolution::Pending(PendingReason::ManifestNotWritten));
            }
            Err(ManifestError::Missing(_)) => {
                debug!(
                    manifest = %self.manifest_path.display(),
                    "No manifest found, scanning"
                );
            }
            Err(err) => return Err(err.into()),
        }

        self.scan()
    }

    fn resolve_directive(&self, directive: &str) -> Result<Entrypoint, DiscoveryError> {
        let path = self.code_dir.join(directive);
        if !path.is_file() {
            return Err(DiscoveryError::EntrypointNotFound {
                directive: directive.to_string(),
                path,
            });
        }

        info!(entrypoint = %path.display(), "Using entrypoint named by the manifest");
        Ok(Entrypoint {
            path,
            strategy: DiscoveryStrategy::Manifest,
        })
    }

    fn scan(&self) -> Result<Resolution, DiscoveryError> {
        info!(code_dir = %self.code_dir.display(), "Searching for python entrypoint");
        let mut scripts = self.index.find(&self.code_dir, SCRIPT_PATTERN);
        scripts.sort();

        let path = match scripts.len() {
            0 => return Ok(Resolution::Pending(PendingReason::NoScripts)),
            1 => scripts.remove(0),
            n => {
                debug!(scripts = n, "Several python scripts found, looking for main.py");
                let mut mains: Vec<PathBuf> = scripts
                    .iter()
                    .filter(|p| p.file_name().is_some_and(|name| name == MAIN_SCRIPT))
                    .cloned()
                    .collect();
                match mains.len() {
                    0 => {
                        return Err(DiscoveryError::NoMainEntrypoint {
                            root: self.code_dir.clone(),
                            candidates: scripts,
                        })
                    }
                    1 => mains.remove(0),
                    _ => return Err(DiscoveryError::AmbiguousEntrypoint { candidates: mains }),
                }
            }
        };

        info!(entrypoint = %path.display(), "Found python entrypoint");
        Ok(Resolution::Resolved(Entrypoint {
            path,
            strategy: DiscoveryStrategy::Scan,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        code: PathBuf,
        manifest: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let code = dir.path().join("input_1");
            fs::create_dir_all(&code).unwrap();
            let manifest = dir.path().join("key_values.json");
            Self {
                _dir: dir,
                code,
                manifest,
            }
        }

        fn touch(&self, rel: &str) -> PathBuf {
            let path = self.code.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "print('hi')\n").unwrap();
            path
        }

        fn directive(&self, value: &str) {
            fs::write(
                &self.manifest,
                format!(r#"{{"input_0": {{"key": "input_0", "value": "{}"}}}}"#, value),
            )
            .unwrap();
        }

        fn resolver(&self) -> EntrypointResolver {
            EntrypointResolver::new(&self.code, &self.manifest)
        }
    }

    fn resolved(resolution: Resolution) -> Entrypoint {
        match resolution {
            Resolution::Resolved(e) => e,
            other => panic!("expected resolution, got {:?}", other),
        }
    }

    #[test]
    fn test_single_script_resolves_via_scan() {
        let fx = Fixture::new();
        let script = fx.touch("analysis.py");

        let entry = resolved(fx.resolver().poll().unwrap());
        assert_eq!(entry.path, script);
        assert_eq!(entry.strategy, DiscoveryStrategy::Scan);
    }

    #[test]
    fn test_empty_dir_is_pending() {
        let fx = Fixture::new();
        assert_eq!(
            fx.resolver().poll().unwrap(),
            Resolution::Pending(PendingReason::NoScripts)
        );
    }

    #[test]
    fn test_missing_code_dir_is_pending() {
        let fx = Fixture::new();
        fs::remove_dir(&fx.code).unwrap();
        assert_eq!(
            fx.resolver().poll().unwrap(),
            Resolution::Pending(PendingReason::NoScripts)
        );
    }

    #[test]
    fn test_manifest_without_directive_scans() {
        let fx = Fixture::new();
        let script = fx.touch("only.py");
        fs::write(&fx.manifest, r#"{"input_2": {"key": "n", "value": "3"}}"#).unwrap();

        assert_eq!(resolved(fx.resolver().poll().unwrap()).path, script);
    }

    #[test]
    fn test_required_manifest_waits() {
        let fx = Fixture::new();
        fx.touch("main.py");

        let resolver = fx.resolver().require_manifest(true);
        assert_eq!(
            resolver.poll().unwrap(),
            Resolution::Pending(PendingReason::ManifestNotWritten)
        );

        fx.directive("main.py");
        assert_eq!(
            resolved(resolver.poll().unwrap()).strategy,
            DiscoveryStrategy::Manifest
        );
    }

    #[test]
    fn test_malformed_manifest_is_fatal() {
        let fx = Fixture::new();
        fx.touch("main.py");
        fs::write(&fx.manifest, "{\"input_0\": ").unwrap();

        let err = fx.resolver().poll().unwrap_err();
        assert_eq!(err.kind(), "manifest_malformed");
    }

    #[test]
    fn test_unreadable_manifest_is_reported_as_io() {
        let fx = Fixture::new();
        fx.touch("main.py");
        fs::create_dir_all(&fx.manifest).unwrap();

        let err = fx.resolver().poll().unwrap_err();
        assert_eq!(err.kind(), "manifest_io");
    }

    #[test]
    fn test_directive_pointing_at_directory_is_not_found() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.code.join("pkg")).unwrap();
        fx.directive("pkg");

        assert!(matches!(
            fx.resolver().poll(),
            Err(DiscoveryError::EntrypointNotFound { .. })
        ));
    }

    #[test]
    fn test_relative_paths_are_made_absolute() {
        let resolver = EntrypointResolver::new("inputs/input_1", "inputs/key_values.json");
        assert!(resolver.code_dir().is_absolute());
        assert!(resolver.manifest_path().is_absolute());
    }
}
