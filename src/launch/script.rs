//! Generated `sh` launch script.
//!
//! The script creates (or upgrades) a virtual environment, installs the user's
//! requirements when there are any, then runs the entrypoint from its own
//! directory with the venv interpreter.

use super::LaunchError;
use crate::lifecycle::LaunchConfig;
use shell_escape::escape;
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const SCRIPT_NAME: &str = "main.sh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchScript {
    body: String,
}

impl LaunchScript {
    pub fn render(launch: &LaunchConfig, python: &str) -> Self {
        let venv = &launch.venv_dir;
        let pip = quote_path(&venv.join("bin").join("pip"));
        let venv_python = quote_path(&venv.join("bin").join("python3"));
        let script_name = launch
            .entrypoint
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut lines = vec![
            "#!/bin/sh".to_string(),
            "set -o errexit".to_string(),
            "set -o nounset".to_string(),
            "IFS=$(printf '\\n\\t')".to_string(),
            "echo \"Creating virtual environment ...\"".to_string(),
            format!(
                "{} -m venv --system-site-packages --symlinks --upgrade {}",
                quote(python),
                quote_path(venv)
            ),
            format!("{} install -U pip wheel setuptools", pip),
        ];

        if let Some(requirements) = &launch.requirements {
            lines.push(format!("{} install -r {}", pip, quote_path(requirements)));
        }

        lines.extend([
            format!("echo {}", quote(&format!("Executing code {} ...", script_name))),
            format!("cd {}", quote_path(&launch.entrypoint_dir)),
            format!("{} {}", venv_python, quote_path(&launch.entrypoint)),
            "echo \"DONE ...\"".to_string(),
        ]);

        let mut body = lines.join("\n");
        body.push('\n');
        Self { body }
    }

    pub fn as_str(&self) -> &str {
        &self.body
    }

    /// Writes the script and marks it executable.
    pub fn write_to(&self, path: &Path) -> Result<(), LaunchError> {
        let to_error = |source| LaunchError::ScriptWrite {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(to_error)?;
        }
        fs::write(path, &self.body).map_err(to_error)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(to_error)?;
        }

        debug!(path = %path.display(), bytes = self.body.len(), "Launch script written");
        Ok(())
    }
}

fn quote(s: &str) -> String {
    escape(Cow::Borrowed(s)).into_owned()
}

fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy())
}
