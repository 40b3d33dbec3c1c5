//! Launching the resolved entrypoint
//!
//! - [`env`]: composes the child environment
//! - [`script`]: renders and writes the `sh` launch script
//! - [`supervisor`]: runs the script and waits for it to exit

pub mod env;
pub mod script;
pub mod supervisor;

pub use env::{EnvironmentComposer, LaunchEnvironment};
pub use script::LaunchScript;
pub use supervisor::{ExitOutcome, ProcessSupervisor};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to launch {}: {reason}", script.display())]
    LaunchFailed { script: PathBuf, reason: String },

    #[error("Failed to write launch script {}: {source}", path.display())]
    ScriptWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed while waiting for child process: {0}")]
    Wait(#[source] std::io::Error),
}
