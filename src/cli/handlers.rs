//! Subcommand handlers. Each returns the process exit code.

use super::commands::{RunnerArgs, StartArgs};
use crate::config::RunnerConfig;
use crate::lifecycle::{LaunchConfig, LifecycleController, LifecycleError, StartOutcome};
use anyhow::{Context, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;

/// Environment configuration with command-line overrides applied.
pub fn load_config(args: &RunnerArgs) -> Result<RunnerConfig> {
    let mut config = match &args.inputs {
        Some(inputs) => RunnerConfig::from_lookup(|key| match key {
            crate::config::INPUTS_ROOT_OVERRIDE_VAR => Some(inputs.display().to_string()),
            _ => std::env::var(key).ok(),
        }),
        None => RunnerConfig::from_env(),
    }
    .context("Failed to load runner configuration")?;

    if let Some(dir) = &args.work_dir {
        config.work_dir = crate::discovery::absolutize(dir);
    }
    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval = Duration::from_millis(ms);
    }
    if let Some(secs) = args.poll_timeout_secs {
        config.poll_timeout = Some(Duration::from_secs(secs));
    }
    if args.require_manifest {
        config.require_manifest = true;
    }

    config.validate().context("Invalid runner configuration")?;
    Ok(config)
}

fn config_or_exit(args: &RunnerArgs) -> Result<RunnerConfig, i32> {
    load_config(args).map_err(|err| {
        error!(error = %format!("{:#}", err), "Cannot start runner");
        EXIT_CONFIG
    })
}

pub async fn handle_setup(args: &RunnerArgs, cancel: &CancellationToken) -> i32 {
    let config = match config_or_exit(args) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let mut controller = LifecycleController::new(config);
    match controller.setup(cancel).await {
        Ok(_) => EXIT_OK,
        Err(err) => failure_code(&err),
    }
}

pub async fn handle_start(args: &StartArgs, cancel: &CancellationToken) -> i32 {
    let config = match config_or_exit(&args.runner) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let launch = match LaunchConfig::load(&config.state_path()) {
        Ok(launch) => launch,
        Err(err) => {
            error!(error = %err, "Cannot read launch config");
            return failure_code(&err);
        }
    };

    let mut controller = match launch {
        Some(_) => LifecycleController::resume(config),
        None => LifecycleController::new(config),
    };

    match controller.start(launch.as_ref(), cancel).await {
        Ok(outcome) => start_code(&outcome, args.propagate_exit_code),
        Err(err) => failure_code(&err),
    }
}

pub fn handle_teardown(args: &RunnerArgs) -> i32 {
    let config = match config_or_exit(args) {
        Ok(c) => c,
        Err(code) => return code,
    };

    match LifecycleController::restore(config) {
        Ok(mut controller) => {
            controller.teardown();
        }
        Err(err) => warn!(error = %err, "Cannot read recorded lifecycle state"),
    }
    EXIT_OK
}

pub async fn handle_run(args: &StartArgs, cancel: &CancellationToken) -> i32 {
    let config = match config_or_exit(&args.runner) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let mut controller = LifecycleController::new(config);
    match controller.run(cancel).await {
        Ok(outcome) => start_code(&outcome, args.propagate_exit_code),
        Err(err) => failure_code(&err),
    }
}

fn failure_code(err: &LifecycleError) -> i32 {
    info!(kind = err.kind(), "Runner stopped on error");
    EXIT_FAILURE
}

/// Maps a start outcome to an exit code. Killed children map to `128 + signal`.
pub fn start_code(outcome: &StartOutcome, propagate: bool) -> i32 {
    if !propagate {
        return EXIT_OK;
    }
    match outcome.exit() {
        None => EXIT_OK,
        Some(exit) => match (exit.code, exit.signal) {
            (Some(code), _) => code,
            (None, Some(signal)) => 128 + signal,
            (None, None) => EXIT_FAILURE,
        },
    }
}
