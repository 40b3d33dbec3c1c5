use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Discovers a user-supplied Python entrypoint and runs it
#[derive(Parser, Debug)]
#[command(
    name = "pyrunner",
    about = "Discovers a user-supplied Python entrypoint and runs it",
    version,
    long_about = "pyrunner waits for user code to appear in the inputs directory, picks exactly \
                  one entrypoint (from the key/value manifest or by scanning for python files), \
                  prepares a virtual environment and runs the script.\n\n\
                  Without a subcommand, setup, start and teardown run in sequence."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Resolve the entrypoint and persist the launch config",
        long_about = "Polls the inputs directory until exactly one entrypoint can be chosen, \
                      locates an optional requirements.txt and writes launch.json to the work \
                      directory for a later `start`.\n\n\
                      Examples:\n  \
                      pyrunner setup\n  \
                      pyrunner setup --inputs /inputs --poll-timeout-secs 600"
    )]
    Setup(RunnerArgs),

    #[command(
        about = "Run the entrypoint resolved by a previous setup",
        long_about = "Loads launch.json, writes the launch script and supervises it until it \
                      exits. Does nothing when setup never resolved an entrypoint."
    )]
    Start(StartArgs),

    #[command(about = "Log the final state of the runner")]
    Teardown(RunnerArgs),

    #[command(about = "Run setup, start and teardown in one process")]
    Run(StartArgs),
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunnerArgs {
    #[arg(
        long,
        value_name = "PATH",
        help = "Inputs root (defaults to $DY_SIDECAR_PATH_INPUTS)"
    )]
    pub inputs: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Directory for main.sh and launch.json")]
    pub work_dir: Option<PathBuf>,

    #[arg(long, value_name = "MS", help = "Delay between discovery polls")]
    pub poll_interval_ms: Option<u64>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Give up discovery after this long (default: wait forever)"
    )]
    pub poll_timeout_secs: Option<u64>,

    #[arg(long, help = "Wait for the key/value manifest instead of scanning")]
    pub require_manifest: bool,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct StartArgs {
    #[command(flatten)]
    pub runner: RunnerArgs,

    #[arg(long, help = "Exit with the script's exit code")]
    pub propagate_exit_code: bool,
}
