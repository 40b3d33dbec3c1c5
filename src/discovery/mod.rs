//! Entrypoint discovery inside the input directory
//!
//! Discovery is split into small pieces that the lifecycle controller drives
//! under its polling loop:
//!
//! - [`PathIndex`]: recursive glob scan of a directory
//! - [`ManifestReader`]: parses the orchestrator's key/value manifest
//! - [`EntrypointResolver`]: picks exactly one script, or reports "not yet"
//! - [`RequirementsLocator`]: finds an optional `requirements.txt`
//!
//! Only the complete absence of candidates is transient. Everything reported
//! through [`DiscoveryError`] is terminal and is never retried.

pub mod index;
pub mod manifest;
pub mod requirements;
pub mod resolver;

pub use index::PathIndex;
pub use manifest::{Manifest, ManifestError, ManifestReader};
pub use requirements::RequirementsLocator;
pub use resolver::{
    DiscoveryStrategy, Entrypoint, EntrypointResolver, PendingReason, Resolution,
};

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal discovery failures.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Entrypoint '{directive}' named by the manifest does not exist: {}", path.display())]
    EntrypointNotFound { directive: String, path: PathBuf },

    #[error("Multiple python scripts found in {} but none is named main.py: {}", root.display(), PathList(candidates))]
    NoMainEntrypoint {
        root: PathBuf,
        candidates: Vec<PathBuf>,
    },

    #[error("Multiple main.py files found, refusing to guess which one to run: {}", PathList(candidates))]
    AmbiguousEntrypoint { candidates: Vec<PathBuf> },

    #[error("Multiple requirements.txt files found, refusing to guess which one to install: {}", PathList(candidates))]
    AmbiguousRequirements { candidates: Vec<PathBuf> },
}

impl DiscoveryError {
    /// Short machine-friendly name used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DiscoveryError::Manifest(ManifestError::Missing(_)) => "manifest_missing",
            DiscoveryError::Manifest(ManifestError::Malformed { .. }) => "manifest_malformed",
            DiscoveryError::Manifest(ManifestError::Io { .. }) => "manifest_io",
            DiscoveryError::EntrypointNotFound { .. } => "entrypoint_not_found",
            DiscoveryError::NoMainEntrypoint { .. } => "no_main_entrypoint",
            DiscoveryError::AmbiguousEntrypoint { .. } => "ambiguous_entrypoint",
            DiscoveryError::AmbiguousRequirements { .. } => "ambiguous_requirements",
        }
    }
}

struct PathList<'a>(&'a [PathBuf]);

impl fmt::Display for PathList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", path.display())?;
        }
        Ok(())
    }
}

/// Makes `path` absolute against the current directory without touching symlinks.
pub(crate) fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
