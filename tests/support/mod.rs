//! Shared fixtures for integration tests.
//!
//! [`InputsFixture`] lays out a temporary inputs root the way the orchestrator
//! does (`<root>/input_1/...` plus `<root>/key_values.json`) together with a
//! work directory and a stand-in `python3`. The stand-in fakes `-m venv` by
//! writing `bin/pip` and `bin/python3` scripts into the venv directory. The
//! fake interpreter records what it ran in `<venv>/ran.txt` and exits with
//! `$FAKE_EXIT_CODE` (default 0); pip calls are appended to `<venv>/pip.log`.

#![allow(dead_code)]

use pyrunner::RunnerConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const FAKE_PYTHON: &str = r#"#!/bin/sh
for last in "$@"; do :; done
mkdir -p "$last/bin"
cat > "$last/bin/pip" <<'PIP'
#!/bin/sh
echo "pip $*" >> "$(dirname "$0")/../pip.log"
PIP
cat > "$last/bin/python3" <<'PY'
#!/bin/sh
echo "$PWD|$1|$OSPARC_REQUIREMENTS_TXT" > "$(dirname "$0")/../ran.txt"
exit "${FAKE_EXIT_CODE:-0}"
PY
chmod +x "$last/bin/pip" "$last/bin/python3"
"#;

pub struct InputsFixture {
    dir: TempDir,
}

impl InputsFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("inputs/input_1")).unwrap();
        fs::create_dir_all(dir.path().join("work")).unwrap();

        let python = dir.path().join("fake-python3");
        fs::write(&python, FAKE_PYTHON).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).unwrap();
        }

        Self { dir }
    }

    pub fn inputs_root(&self) -> PathBuf {
        self.dir.path().join("inputs")
    }

    pub fn code_dir(&self) -> PathBuf {
        self.inputs_root().join("input_1")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.dir.path().join("venv")
    }

    pub fn python(&self) -> PathBuf {
        self.dir.path().join("fake-python3")
    }

    /// Writes a file under the code directory and returns its absolute path.
    pub fn code(&self, rel: &str) -> PathBuf {
        write_file(&self.code_dir().join(rel), "print('hello')\n")
    }

    pub fn manifest(&self, json: &str) {
        fs::write(self.inputs_root().join("key_values.json"), json).unwrap();
    }

    /// Manifest naming `rel` as the entrypoint.
    pub fn directive(&self, rel: &str) {
        self.manifest(&format!(
            r#"{{"input_0": {{"key": "input_0", "value": "{}"}}}}"#,
            rel
        ));
    }

    pub fn config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::new(self.inputs_root());
        config.poll_interval = Duration::from_millis(20);
        config.venv_dir = self.venv_dir();
        config.python = self.python().display().to_string();
        config.work_dir = self.work_dir();
        config
    }

    /// Environment handed to the child: just enough for the fake tools.
    pub fn child_env(&self, exit_code: i32) -> Vec<(String, String)> {
        vec![
            ("PATH".to_string(), "/usr/bin:/bin".to_string()),
            ("FAKE_EXIT_CODE".to_string(), exit_code.to_string()),
        ]
    }

    /// `<cwd>|<entrypoint>|<requirements>` as seen by the fake interpreter.
    pub fn ran(&self) -> Option<String> {
        fs::read_to_string(self.venv_dir().join("ran.txt"))
            .ok()
            .map(|s| s.trim_end().to_string())
    }

    pub fn pip_log(&self) -> String {
        fs::read_to_string(self.venv_dir().join("pip.log")).unwrap_or_default()
    }
}

pub fn write_file(path: &Path, content: &str) -> PathBuf {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
    path.to_path_buf()
}
