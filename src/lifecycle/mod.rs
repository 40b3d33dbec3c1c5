//! Runner lifecycle
//!
//! - [`state`]: the [`LifecyclePhase`] state machine
//! - [`launch_config`]: the [`LaunchConfig`] handed from `setup` to `start`
//! - [`run_state`]: the last settled phase, read back by a separate `teardown`
//! - [`controller`]: the [`LifecycleController`] driving all phases

pub mod controller;
pub mod launch_config;
mod persist;
pub mod run_state;
pub mod state;

pub use controller::{LifecycleController, StartOutcome, TeardownReport};
pub use launch_config::LaunchConfig;
pub use run_state::RunState;
pub use state::LifecyclePhase;

use crate::discovery::DiscoveryError;
use crate::launch::LaunchError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("Entrypoint discovery cancelled after {polls} polls")]
    Cancelled { polls: u32 },

    #[error("No entrypoint found after waiting {waited:?} ({polls} polls)")]
    TimedOut { waited: Duration, polls: u32 },

    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: LifecyclePhase,
        to: LifecyclePhase,
    },

    #[error("Launch state {}: {reason}", path.display())]
    State { path: PathBuf, reason: String },
}

impl LifecycleError {
    /// Short machine-friendly name used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::Discovery(err) => err.kind(),
            LifecycleError::Launch(LaunchError::LaunchFailed { .. }) => "launch_failed",
            LifecycleError::Launch(_) => "launch_io",
            LifecycleError::Cancelled { .. } => "cancelled",
            LifecycleError::TimedOut { .. } => "timed_out",
            LifecycleError::InvalidTransition { .. } => "invalid_transition",
            LifecycleError::State { .. } => "state",
        }
    }
}
