//! Shutdown signal handling.
//!
//! [`cancel_on_shutdown_signal`] cancels a token when the process receives
//! SIGINT, SIGTERM or SIGQUIT (Ctrl-C only on non-Unix platforms). Both the
//! discovery loop and the child supervisor watch that token.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Spawns a task that cancels `token` on the first shutdown signal.
pub fn cancel_on_shutdown_signal(token: CancellationToken) {
    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => {
                info!("Shutdown signal received, cancelling");
                token.cancel();
            }
            Err(err) => warn!(error = %err, "Failed to install signal handlers"),
        }
    });
}
