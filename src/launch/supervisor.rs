use super::env::LaunchEnvironment;
use super::LaunchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How the supervised child ended. A non-zero code is an outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitOutcome {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub cancelled: bool,
}

impl ExitOutcome {
    fn from_status(status: ExitStatus, cancelled: bool) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            cancelled,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0) && !self.cancelled
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code)?,
            (None, Some(signal)) => write!(f, "killed by signal {}", signal)?,
            (None, None) => write!(f, "unknown exit status")?,
        }
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}

const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Runs the launch script as a child process and waits for it.
#[derive(Debug, Clone, Copy)]
pub struct ProcessSupervisor {
    kill_grace: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self {
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long a cancelled process group gets between SIGTERM and SIGKILL.
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Spawns `script` with exactly `env` and inherited stdio, then waits for it
    /// to exit. Cancelling `cancel` terminates the script's whole process group
    /// and still reports the script's status.
    pub async fn run(
        &self,
        script: &Path,
        env: &LaunchEnvironment,
        cancel: &CancellationToken,
    ) -> Result<ExitOutcome, LaunchError> {
        check_launchable(script)?;

        info!(script = %script.display(), "Starting launch script");
        let started = Instant::now();

        let mut command = Command::new(script);
        command
            .env_clear()
            .envs(env.iter())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        // The script and everything it starts share one process group led by the script.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|err| LaunchError::LaunchFailed {
            script: script.to_path_buf(),
            reason: err.to_string(),
        })?;
        let pgid = child.id();

        let (status, cancelled) = tokio::select! {
            status = child.wait() => (status.map_err(LaunchError::Wait)?, false),
            _ = cancel.cancelled() => {
                warn!(pid = ?pgid, "Cancellation requested, terminating child process group");
                (self.terminate(&mut child, pgid).await?, true)
            }
        };

        let outcome = ExitOutcome::from_status(status, cancelled);
        info!(
            script = %script.display(),
            outcome = %outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Launch script finished"
        );
        Ok(outcome)
    }

    /// SIGTERM to the whole group, SIGKILL once the grace period runs out. The
    /// group is swept with SIGKILL after the script exits so no grandchild
    /// outlives a cancelled run.
    async fn terminate(
        &self,
        child: &mut Child,
        pgid: Option<u32>,
    ) -> Result<ExitStatus, LaunchError> {
        let Some(pgid) = pgid else {
            return child.wait().await.map_err(LaunchError::Wait);
        };

        signal_group(pgid, GroupSignal::Terminate);
        let status = match time::timeout(self.kill_grace, child.wait()).await {
            Ok(status) => status.map_err(LaunchError::Wait)?,
            Err(_) => {
                warn!(
                    pgid,
                    grace_ms = self.kill_grace.as_millis() as u64,
                    "Child ignored SIGTERM, killing"
                );
                signal_group(pgid, GroupSignal::Kill);
                if let Err(err) = child.start_kill() {
                    debug!(error = %err, "Child already gone");
                }
                child.wait().await.map_err(LaunchError::Wait)?
            }
        };
        signal_group(pgid, GroupSignal::Kill);
        Ok(status)
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(pgid: u32, signal: GroupSignal) {
    let signo = match signal {
        GroupSignal::Terminate => libc::SIGTERM,
        GroupSignal::Kill => libc::SIGKILL,
    };
    // SAFETY: `killpg(2)` only takes integers; an unknown group yields ESRCH.
    let result = unsafe { libc::killpg(pgid as libc::pid_t, signo) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pgid, ?signal, error = %err, "Failed to signal child process group");
        }
    }
}

#[cfg(not(unix))]
fn signal_group(_pgid: u32, _signal: GroupSignal) {}

fn check_launchable(script: &Path) -> Result<(), LaunchError> {
    let failed = |reason: &str| LaunchError::LaunchFailed {
        script: script.to_path_buf(),
        reason: reason.to_string(),
    };

    let metadata = std::fs::metadata(script).map_err(|_| failed("script does not exist"))?;
    if !metadata.is_file() {
        return Err(failed("not a regular file"));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(failed("script is not executable"));
        }
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::launch::env::EnvironmentComposer;
    use serial_test::serial;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, body: &str, mode: u32) -> PathBuf {
        let path = dir.path().join("main.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    fn env_with_path() -> LaunchEnvironment {
        EnvironmentComposer::new().compose(
            vec![("PATH".to_string(), "/usr/bin:/bin".to_string())],
            Path::new("/venv"),
            Path::new("/inputs/main.py"),
            None,
        )
    }

    #[tokio::test]
    #[serial]
    async fn test_returns_child_exit_code_unmodified() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "exit 3", 0o755);

        let outcome = ProcessSupervisor::new()
            .run(&script, &env_with_path(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.code, Some(3));
        assert!(!outcome.success());
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    #[serial]
    async fn test_child_sees_composed_environment_only() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("env.txt");
        let script = write_script(
            &dir,
            &format!(
                "echo \"$OSPARC_USER_ENTRYPOINT_DIR|$OSPARC_REQUIREMENTS_TXT|${{HOME:-unset}}\" > '{}'",
                out.display()
            ),
            0o755,
        );

        let outcome = ProcessSupervisor::new()
            .run(&script, &env_with_path(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(fs::read_to_string(&out).unwrap(), "/inputs||unset\n");
    }

    #[tokio::test]
    async fn test_missing_script_fails_to_launch() {
        let dir = TempDir::new().unwrap();
        let err = ProcessSupervisor::new()
            .run(
                &dir.path().join("main.sh"),
                &env_with_path(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::LaunchFailed { .. }));
    }

    #[tokio::test]
    async fn test_non_executable_script_fails_to_launch() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "exit 0", 0o644);
        let err = ProcessSupervisor::new()
            .run(&script, &env_with_path(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not executable"));
    }

    #[tokio::test]
    #[serial]
    async fn test_cancellation_kills_child() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "sleep 30", 0o755);
        let cancel = CancellationToken::new();

        cancel_after(&cancel, Duration::from_millis(200));

        let outcome = ProcessSupervisor::new()
            .run(&script, &env_with_path(), &cancel)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.code, None);
        assert!(outcome.signal.is_some());
    }

    fn is_running(pid: i32) -> bool {
        if Path::new("/proc/self").exists() {
            // A zombie has exited and only waits to be reaped.
            match fs::read_to_string(format!("/proc/{}/stat", pid)) {
                Ok(stat) => !stat
                    .rsplit(')')
                    .next()
                    .is_some_and(|rest| rest.trim_start().starts_with('Z')),
                Err(_) => false,
            }
        } else {
            unsafe { libc::kill(pid, 0) == 0 }
        }
    }

    async fn wait_until_gone(pid: i32) -> bool {
        for _ in 0..100 {
            if !is_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    fn cancel_after(cancel: &CancellationToken, delay: Duration) {
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trigger.cancel();
        });
    }

    #[tokio::test]
    #[serial]
    async fn test_cancellation_reaches_background_processes() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("grandchild.pid");
        let script = write_script(
            &dir,
            &format!("sleep 30 &\necho $! > '{}'\nwait", pid_file.display()),
            0o755,
        );
        let cancel = CancellationToken::new();
        cancel_after(&cancel, Duration::from_millis(300));

        let outcome = ProcessSupervisor::new()
            .run(&script, &env_with_path(), &cancel)
            .await
            .unwrap();
        assert!(outcome.cancelled);

        let pid: i32 = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        assert!(wait_until_gone(pid).await, "background process {} survived cancellation", pid);
    }

    #[tokio::test]
    #[serial]
    async fn test_group_ignoring_sigterm_is_killed_after_grace() {
        let dir = TempDir::new().unwrap();
        let pid_file = dir.path().join("grandchild.pid");
        let script = write_script(
            &dir,
            &format!(
                "trap '' TERM\nsleep 30 &\necho $! > '{}'\nwait",
                pid_file.display()
            ),
            0o755,
        );
        let cancel = CancellationToken::new();
        cancel_after(&cancel, Duration::from_millis(300));

        let outcome = ProcessSupervisor::new()
            .with_kill_grace(Duration::from_millis(200))
            .run(&script, &env_with_path(), &cancel)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.signal, Some(libc::SIGKILL));
        let pid: i32 = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        assert!(wait_until_gone(pid).await, "background process {} survived SIGKILL", pid);
    }

    #[tokio::test]
    #[serial]
    async fn test_non_utf8_variables_reach_child() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let dir = TempDir::new().unwrap();
        let out = dir.path().join("raw.bin");
        let script = write_script(
            &dir,
            &format!("printf '%s' \"$RAW_VALUE\" > '{}'", out.display()),
            0o755,
        );
        let raw = vec![b'c', 0xff, b'f', b'e'];
        let env = EnvironmentComposer::new().compose(
            vec![
                (OsString::from("PATH"), OsString::from("/usr/bin:/bin")),
                (OsString::from("RAW_VALUE"), OsString::from_vec(raw.clone())),
            ],
            Path::new("/venv"),
            Path::new("/inputs/main.py"),
            None,
        );

        let outcome = ProcessSupervisor::new()
            .run(&script, &env, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(fs::read(&out).unwrap(), raw);
    }
}
