//! pyrunner - sidecar runner for user-supplied Python code
//!
//! An external orchestrator drops user code into an inputs directory, possibly
//! a few files at a time. pyrunner waits until exactly one entrypoint can be
//! chosen, prepares a virtual environment for it and runs it to completion.
//!
//! # Lifecycle
//!
//! - `setup`: poll the inputs until an entrypoint resolves, locate an optional
//!   `requirements.txt`, and produce a [`LaunchConfig`]
//! - `start`: write the launch script and supervise it until it exits
//! - `teardown`: log the final state; always safe to call
//!
//! # Example
//!
//! ```no_run
//! use pyrunner::{LifecycleController, RunnerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RunnerConfig::from_env()?;
//! let cancel = CancellationToken::new();
//!
//! let mut controller = LifecycleController::new(config);
//! let launch = controller.setup(&cancel).await?;
//! let outcome = controller.start(Some(&launch), &cancel).await?;
//! controller.teardown();
//!
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`discovery`]: file scanning, manifest parsing, entrypoint resolution
//! - [`launch`]: child environment, launch script, process supervision
//! - [`lifecycle`]: the phase state machine and its controller
//! - [`config`]: environment-driven configuration

pub mod cli;
pub mod config;
pub mod discovery;
pub mod launch;
pub mod lifecycle;
pub mod util;

pub use config::{ConfigError, RunnerConfig};
pub use discovery::{DiscoveryError, EntrypointResolver, Resolution};
pub use launch::{ExitOutcome, LaunchError};
pub use lifecycle::{
    LaunchConfig, LifecycleController, LifecycleError, LifecyclePhase, StartOutcome,
};
pub use util::{init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_pyrunner() {
        assert_eq!(NAME, "pyrunner");
    }
}
