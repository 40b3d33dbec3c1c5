use super::{persist, LifecycleError};
use crate::discovery::DiscoveryStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything `start` needs, produced in one piece by `setup`.
///
/// Persisted as JSON so `setup` and `start` can run in separate processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub entrypoint: PathBuf,
    pub entrypoint_dir: PathBuf,
    pub requirements: Option<PathBuf>,
    pub venv_dir: PathBuf,
    pub script_path: PathBuf,
    pub strategy: DiscoveryStrategy,
    /// Number of discovery polls it took to resolve the entrypoint.
    pub polls: u32,
    pub resolved_at: DateTime<Utc>,
}

impl LaunchConfig {
    pub fn save(&self, path: &Path) -> Result<(), LifecycleError> {
        persist::save_json(self, path)?;
        debug!(path = %path.display(), "Launch config saved");
        Ok(())
    }

    /// Returns `Ok(None)` if no launch config was ever saved at `path`.
    pub fn load(path: &Path) -> Result<Option<Self>, LifecycleError> {
        persist::load_json(path)
    }

    /// Removes a previously saved launch config, if any.
    pub fn clear(path: &Path) -> Result<(), LifecycleError> {
        persist::remove(path)
    }
}
