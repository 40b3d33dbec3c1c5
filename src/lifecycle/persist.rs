//! JSON files under the work directory that carry lifecycle state between
//! separate `setup`, `start` and `teardown` invocations.

use super::LifecycleError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

fn state_error(path: &Path, reason: impl ToString) -> LifecycleError {
    LifecycleError::State {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

pub(super) fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), LifecycleError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| state_error(path, e))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| state_error(path, e))?;
    }

    // Readers only ever see a complete file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| state_error(path, e))?;
    fs::rename(&tmp, path).map_err(|e| state_error(path, e))
}

/// `Ok(None)` when nothing was saved at `path`.
pub(super) fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, LifecycleError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(state_error(path, e)),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| state_error(path, e))
}

pub(super) fn remove(path: &Path) -> Result<(), LifecycleError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(state_error(path, e)),
    }
}
