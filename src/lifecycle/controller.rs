//! The `setup -> start -> teardown` state machine.
//!
//! `setup` polls the inputs until a single entrypoint is known, a fatal
//! discovery error happens, the optional deadline passes, or the caller cancels.
//! It returns an immutable [`LaunchConfig`] which `start` consumes. `start` and
//! `teardown` never fail just because an earlier phase did: without a launch
//! config `start` is a logged no-op, and `teardown` is always safe.

use super::launch_config::LaunchConfig;
use super::run_state::RunState;
use super::state::LifecyclePhase;
use super::LifecycleError;
use crate::config::RunnerConfig;
use crate::discovery::{Entrypoint, EntrypointResolver, RequirementsLocator, Resolution};
use crate::launch::env::{self as launch_env, EnvironmentComposer};
use crate::launch::{ExitOutcome, LaunchScript, ProcessSupervisor};
use chrono::Utc;
use std::ffi::OsString;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Nothing was resolved, so nothing ran.
    Skipped,
    Exited(ExitOutcome),
}

impl StartOutcome {
    pub fn exit(&self) -> Option<ExitOutcome> {
        match self {
            StartOutcome::Skipped => None,
            StartOutcome::Exited(outcome) => Some(*outcome),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    pub phase: LifecyclePhase,
    pub outcome: Option<ExitOutcome>,
}

pub struct LifecycleController {
    config: RunnerConfig,
    phase: LifecyclePhase,
    resolver: EntrypointResolver,
    requirements: RequirementsLocator,
    composer: EnvironmentComposer,
    supervisor: ProcessSupervisor,
    base_env: Option<Vec<(OsString, OsString)>>,
    outcome: Option<ExitOutcome>,
}

impl LifecycleController {
    pub fn new(config: RunnerConfig) -> Self {
        let resolver = EntrypointResolver::new(config.code_dir(), config.manifest_path())
            .require_manifest(config.require_manifest);

        Self {
            config,
            phase: LifecyclePhase::Uninitialized,
            resolver,
            requirements: RequirementsLocator::new(),
            composer: EnvironmentComposer::new(),
            supervisor: ProcessSupervisor::new(),
            base_env: None,
            outcome: None,
        }
    }

    /// Picks up from a launch config saved by an earlier `setup` in another process.
    pub fn resume(config: RunnerConfig) -> Self {
        let mut controller = Self::new(config);
        controller.phase = LifecyclePhase::Resolved;
        controller
    }

    /// Rebuilds the final state recorded by earlier phases run in other processes.
    /// Without a record the controller starts out `Uninitialized`.
    pub fn restore(config: RunnerConfig) -> Result<Self, LifecycleError> {
        let recorded = RunState::load(&config.run_state_path())?;
        let mut controller = Self::new(config);
        if let Some(state) = recorded {
            controller.phase = state.phase;
            controller.outcome = state.outcome;
        }
        Ok(controller)
    }

    /// Environment the child inherits instead of this process's own.
    pub fn with_base_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.base_env = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    fn transition(&mut self, next: LifecyclePhase) -> Result<(), LifecycleError> {
        if !self.phase.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        debug!(from = %self.phase, to = %next, "Lifecycle transition");
        self.phase = next;
        Ok(())
    }

    fn base_env(&self) -> Vec<(OsString, OsString)> {
        self.base_env.clone().unwrap_or_else(launch_env::inherited)
    }

    pub async fn setup(&mut self, cancel: &CancellationToken) -> Result<LaunchConfig, LifecycleError> {
        self.transition(LifecyclePhase::Resolving)?;
        self.show_io_environment();

        match self.prepare(cancel).await {
            Ok(launch) => {
                self.transition(LifecyclePhase::Resolved)?;
                self.record();
                info!(
                    entrypoint = %launch.entrypoint.display(),
                    strategy = %launch.strategy,
                    polls = launch.polls,
                    "Setup completed"
                );
                Ok(launch)
            }
            Err(err) => {
                self.phase = LifecyclePhase::Failed;
                self.record();
                error!(error = %err, "Setup failed, the entrypoint will not be started");
                Err(err)
            }
        }
    }

    async fn prepare(&mut self, cancel: &CancellationToken) -> Result<LaunchConfig, LifecycleError> {
        let state_path = self.config.state_path();
        LaunchConfig::clear(&state_path)?;

        let (entrypoint, polls) = self.discover(cancel).await?;
        let requirements = self.requirements.locate(self.resolver.code_dir())?;

        let entrypoint_dir = entrypoint
            .path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| self.resolver.code_dir().to_path_buf());

        let launch = LaunchConfig {
            entrypoint: entrypoint.path,
            entrypoint_dir,
            requirements,
            venv_dir: self.config.venv_dir.clone(),
            script_path: self.config.script_path(),
            strategy: entrypoint.strategy,
            polls,
            resolved_at: Utc::now(),
        };
        launch.save(&state_path)?;
        Ok(launch)
    }

    /// Polls until an entrypoint resolves. Returns it with the number of polls made.
    async fn discover(&mut self, cancel: &CancellationToken) -> Result<(Entrypoint, u32), LifecycleError> {
        let started = Instant::now();
        let interval = self.config.poll_interval;
        let deadline = self.config.poll_timeout.map(|t| started + t);
        let mut polls: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(LifecycleError::Cancelled { polls });
            }

            polls += 1;
            let reason = match self.resolver.poll()? {
                Resolution::Resolved(entrypoint) => return Ok((entrypoint, polls)),
                Resolution::Pending(reason) => reason,
            };

            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(LifecycleError::TimedOut {
                            waited: now - started,
                            polls,
                        });
                    }
                    interval.min(deadline - now)
                }
                None => interval,
            };

            info!(
                attempt = polls,
                reason = %reason,
                code_dir = %self.resolver.code_dir().display(),
                retry_in_ms = wait.as_millis() as u64,
                "Entrypoint not available yet"
            );
            self.transition(LifecyclePhase::Resolving)?;

            tokio::select! {
                _ = cancel.cancelled() => return Err(LifecycleError::Cancelled { polls }),
                _ = time::sleep(wait) => {}
            }
        }
    }

    pub async fn start(
        &mut self,
        launch: Option<&LaunchConfig>,
        cancel: &CancellationToken,
    ) -> Result<StartOutcome, LifecycleError> {
        let launch = match (self.phase, launch) {
            (LifecyclePhase::Resolved, Some(launch)) => launch,
            (LifecyclePhase::Running, _) | (LifecyclePhase::Completed, _) => {
                return Err(LifecycleError::InvalidTransition {
                    from: self.phase,
                    to: LifecyclePhase::Running,
                })
            }
            (phase, _) => {
                info!(%phase, "No resolved entrypoint, nothing to start");
                return Ok(StartOutcome::Skipped);
            }
        };

        self.transition(LifecyclePhase::Running)?;
        info!(script = %launch.script_path.display(), "Starting entrypoint");

        match self.launch(launch, cancel).await {
            Ok(outcome) => {
                self.transition(LifecyclePhase::Completed)?;
                self.outcome = Some(outcome);
                self.record();
                if outcome.success() {
                    info!(%outcome, "Finished running python script");
                } else {
                    warn!(%outcome, "Python script finished unsuccessfully");
                }
                Ok(StartOutcome::Exited(outcome))
            }
            Err(err) => {
                self.transition(LifecyclePhase::Failed)?;
                self.record();
                error!(error = %err, "Failed to run entrypoint");
                Err(err)
            }
        }
    }

    async fn launch(
        &self,
        launch: &LaunchConfig,
        cancel: &CancellationToken,
    ) -> Result<ExitOutcome, LifecycleError> {
        let env = self.composer.compose(
            self.base_env(),
            &launch.venv_dir,
            &launch.entrypoint,
            launch.requirements.as_deref(),
        );
        debug!(vars = env.len(), "Composed child environment");

        let script = LaunchScript::render(launch, &self.config.python);
        script.write_to(&launch.script_path)?;

        Ok(self
            .supervisor
            .run(&launch.script_path, &env, cancel)
            .await?)
    }

    /// Logs the final state. Safe to call any number of times, in any phase.
    pub fn teardown(&mut self) -> TeardownReport {
        let report = TeardownReport {
            phase: self.phase,
            outcome: self.outcome,
        };
        if !report.phase.is_terminal() {
            warn!(phase = %report.phase, "Teardown before the lifecycle finished");
        }
        match report.outcome {
            Some(outcome) => info!(phase = %report.phase, %outcome, "Completed"),
            None => info!(phase = %report.phase, "Completed"),
        }
        report
    }

    fn record(&self) {
        let path = self.config.run_state_path();
        if let Err(err) = RunState::new(self.phase, self.outcome).save(&path) {
            warn!(error = %err, "Failed to record lifecycle state");
        }
    }

    /// Runs all three phases in order. `teardown` runs whatever happened before it.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<StartOutcome, LifecycleError> {
        let result = match self.setup(cancel).await {
            Ok(launch) => self.start(Some(&launch), cancel).await,
            Err(err) => {
                self.start(None, cancel).await?;
                Err(err)
            }
        };
        self.teardown();
        result
    }

    fn show_io_environment(&self) {
        let vars = self.base_env();
        for io_type in ["input", "output"] {
            let names = launch_env::io_variable_names(&vars, io_type);
            info!(io_type, variables = ?names, "Available I/O environment variables");
        }
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("phase", &self.phase)
            .field("code_dir", &self.resolver.code_dir())
            .field("outcome", &self.outcome)
            .finish()
    }
}
