use pyrunner::cli::commands::{CliArgs, Commands, StartArgs};
use pyrunner::cli::handlers::{handle_run, handle_setup, handle_start, handle_teardown};
use pyrunner::util::logging::{init_logging, parse_level, LoggingConfig};
use pyrunner::util::signals::cancel_on_shutdown_signal;
use pyrunner::VERSION;

use clap::Parser;
use std::env;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("pyrunner v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let cancel = CancellationToken::new();
    cancel_on_shutdown_signal(cancel.clone());

    let exit_code = match &args.command {
        Some(Commands::Setup(runner_args)) => handle_setup(runner_args, &cancel).await,
        Some(Commands::Start(start_args)) => handle_start(start_args, &cancel).await,
        Some(Commands::Teardown(runner_args)) => handle_teardown(runner_args),
        Some(Commands::Run(start_args)) => handle_run(start_args, &cancel).await,
        None => handle_run(&StartArgs::default(), &cancel).await,
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("PYRUNNER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        parse_level(&level_str)
    };

    let use_json = args.log_json
        || env::var("PYRUNNER_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

    init_logging(LoggingConfig {
        use_json,
        ..LoggingConfig::with_level(level)
    });
}
