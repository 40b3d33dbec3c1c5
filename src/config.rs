//! Runner configuration
//!
//! Settings are loaded from environment variables with defaults. The only
//! variable the orchestrator must provide is the inputs root.
//!
//! # Environment Variables
//!
//! - `DY_SIDECAR_PATH_INPUTS`: inputs root written by the orchestrator - **required**
//! - `PYRUNNER_INPUTS_ROOT`: overrides `DY_SIDECAR_PATH_INPUTS`
//! - `PYRUNNER_CODE_SUBDIR`: directory under the inputs root holding user code - default: "input_1"
//! - `PYRUNNER_MANIFEST_NAME`: key/value manifest under the inputs root - default: "key_values.json"
//! - `PYRUNNER_POLL_INTERVAL_MS`: delay between discovery polls - default: "1000"
//! - `PYRUNNER_POLL_TIMEOUT_SECS`: give up discovery after this long - default: unset (wait forever)
//! - `PYRUNNER_REQUIRE_MANIFEST`: wait for the manifest instead of scanning (true|false) - default: "false"
//! - `PYRUNNER_VENV_DIR`: virtual environment location - default: "$HOME/.venv"
//! - `PYRUNNER_PYTHON`: interpreter used to create the venv - default: "python3"
//! - `PYRUNNER_WORK_DIR`: where `main.sh` and `launch.json` are written - default: current directory
//! - `PYRUNNER_LOG_LEVEL`: logging level - default: "info"

use crate::discovery::absolutize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const INPUTS_ROOT_VAR: &str = "DY_SIDECAR_PATH_INPUTS";
pub const INPUTS_ROOT_OVERRIDE_VAR: &str = "PYRUNNER_INPUTS_ROOT";

const DEFAULT_CODE_SUBDIR: &str = "input_1";
const DEFAULT_MANIFEST_NAME: &str = "key_values.json";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_PYTHON: &str = "python3";
const DEFAULT_LOG_LEVEL: &str = "info";
const LAUNCH_STATE_FILE: &str = "launch.json";
const RUN_STATE_FILE: &str = "lifecycle.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Inputs root not specified. Set DY_SIDECAR_PATH_INPUTS (or PYRUNNER_INPUTS_ROOT)")]
    MissingInputsRoot,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Directory the orchestrator populates.
    pub inputs_root: PathBuf,

    /// Subdirectory of `inputs_root` scanned for user code. Empty means the root itself.
    pub code_subdir: String,

    /// Manifest file name, directly under `inputs_root`.
    pub manifest_name: String,

    pub poll_interval: Duration,

    /// `None` polls until an entrypoint shows up or the run is cancelled.
    pub poll_timeout: Option<Duration>,

    pub require_manifest: bool,

    pub venv_dir: PathBuf,

    pub python: String,

    /// Holds the generated launch script and the persisted launch config.
    pub work_dir: PathBuf,

    pub log_level: String,
}

impl RunnerConfig {
    /// Builds a configuration with defaults for everything but the inputs root.
    pub fn new(inputs_root: impl Into<PathBuf>) -> Self {
        Self {
            inputs_root: absolutize(&inputs_root.into()),
            code_subdir: DEFAULT_CODE_SUBDIR.to_string(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            poll_timeout: None,
            require_manifest: false,
            venv_dir: default_venv_dir(),
            python: DEFAULT_PYTHON.to_string(),
            work_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads the configuration through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let inputs_root = lookup(INPUTS_ROOT_OVERRIDE_VAR)
            .or_else(|| lookup(INPUTS_ROOT_VAR))
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingInputsRoot)?;

        let mut config = Self::new(inputs_root);

        if let Some(subdir) = lookup("PYRUNNER_CODE_SUBDIR") {
            config.code_subdir = subdir;
        }
        if let Some(name) = lookup("PYRUNNER_MANIFEST_NAME") {
            config.manifest_name = name;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "PYRUNNER_POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "PYRUNNER_POLL_TIMEOUT_SECS")? {
            config.poll_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(required) = parse_var::<bool, _>(&lookup, "PYRUNNER_REQUIRE_MANIFEST")? {
            config.require_manifest = required;
        }
        if let Some(dir) = lookup("PYRUNNER_VENV_DIR") {
            config.venv_dir = PathBuf::from(dir);
        }
        if let Some(python) = lookup("PYRUNNER_PYTHON") {
            config.python = python;
        }
        if let Some(dir) = lookup("PYRUNNER_WORK_DIR") {
            config.work_dir = absolutize(Path::new(&dir));
        }
        if let Some(level) = lookup("PYRUNNER_LOG_LEVEL") {
            config.log_level = level.to_lowercase();
        }

        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` for values the runner cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "Poll interval must be greater than zero".to_string(),
            ));
        }
        if self.poll_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ValidationFailed(
                "Poll timeout must be greater than zero when set".to_string(),
            ));
        }
        if !self.venv_dir.is_absolute() {
            return Err(ConfigError::ValidationFailed(format!(
                "Virtual environment directory must be absolute: {}",
                self.venv_dir.display()
            )));
        }
        if self.python.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Python interpreter must not be empty".to_string(),
            ));
        }
        if self.manifest_name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Manifest name must not be empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn code_dir(&self) -> PathBuf {
        if self.code_subdir.is_empty() {
            self.inputs_root.clone()
        } else {
            self.inputs_root.join(&self.code_subdir)
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.inputs_root.join(&self.manifest_name)
    }

    pub fn script_path(&self) -> PathBuf {
        self.work_dir.join(crate::launch::script::SCRIPT_NAME)
    }

    pub fn state_path(&self) -> PathBuf {
        self.work_dir.join(LAUNCH_STATE_FILE)
    }

    /// Last settled lifecycle phase, for a `teardown` run in another process.
    pub fn run_state_path(&self) -> PathBuf {
        self.work_dir.join(RUN_STATE_FILE)
    }
}

fn default_venv_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/root"))
        .join(".venv")
}

fn parse_var<T, F>(lookup: &F, field: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(field) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::ParseError {
                field: field.to_string(),
                error: e.to_string(),
            }),
    }
}
