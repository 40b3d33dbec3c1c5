//! Child process environment.
//!
//! The child inherits the runner's environment with four reserved variables
//! forced to the values computed during setup. Reserved keys always win over
//! inherited ones. Names and values are kept as `OsString` so variables that
//! are not valid UTF-8 still reach the child untouched.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use tracing::debug;

pub const VENV_DIR_VAR: &str = "OSPARC_VENV_DIR";
pub const ENTRYPOINT_PATH_VAR: &str = "OSPARC_USER_ENTRYPOINT_PATH";
pub const ENTRYPOINT_DIR_VAR: &str = "OSPARC_USER_ENTRYPOINT_DIR";
pub const REQUIREMENTS_VAR: &str = "OSPARC_REQUIREMENTS_TXT";

pub const RESERVED_VARS: [&str; 4] = [
    VENV_DIR_VAR,
    ENTRYPOINT_PATH_VAR,
    ENTRYPOINT_DIR_VAR,
    REQUIREMENTS_VAR,
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchEnvironment {
    vars: BTreeMap<OsString, OsString>,
}

impl LaunchEnvironment {
    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars.get(key.as_ref()).map(OsString::as_os_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentComposer;

impl EnvironmentComposer {
    pub fn new() -> Self {
        Self
    }

    pub fn compose<I, K, V>(
        &self,
        base: I,
        venv_dir: &Path,
        entrypoint: &Path,
        requirements: Option<&Path>,
    ) -> LaunchEnvironment
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let mut vars: BTreeMap<OsString, OsString> = base
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let entrypoint_dir = entrypoint.parent().unwrap_or(entrypoint);
        let reserved = [
            (VENV_DIR_VAR, venv_dir.as_os_str().to_os_string()),
            (ENTRYPOINT_PATH_VAR, entrypoint.as_os_str().to_os_string()),
            (ENTRYPOINT_DIR_VAR, entrypoint_dir.as_os_str().to_os_string()),
            (
                REQUIREMENTS_VAR,
                requirements
                    .map(|p| p.as_os_str().to_os_string())
                    .unwrap_or_default(),
            ),
        ];

        for (key, value) in reserved {
            if let Some(previous) = vars.insert(OsString::from(key), value) {
                debug!(key, previous = %previous.to_string_lossy(), "Overriding inherited variable");
            }
        }

        LaunchEnvironment { vars }
    }
}

/// Snapshot of the current process environment, including non-UTF-8 entries.
pub fn inherited() -> Vec<(OsString, OsString)> {
    std::env::vars_os().collect()
}

/// Names of the orchestrator-provided input/output variables, for diagnostics.
pub fn io_variable_names<'a>(
    vars: impl IntoIterator<Item = &'a (OsString, OsString)>,
    io_type: &str,
) -> Vec<String> {
    let marker = format!("{}_", io_type.to_uppercase());
    let mut names: Vec<String> = vars
        .into_iter()
        .map(|(k, _)| k.to_string_lossy().into_owned())
        .filter(|k| k.contains(&marker))
        .collect();
    names.sort();
    names
}
