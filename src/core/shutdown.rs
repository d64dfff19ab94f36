//! Termination signals for [`Dispatcher::run_until_signal`](crate::Dispatcher::run_until_signal).
//!
//! Unix: `SIGINT`, `SIGTERM`, `SIGQUIT`. Elsewhere: Ctrl-C.

use std::io;

/// Completes on the first termination signal.
///
/// Fails only if the signal listeners cannot be installed.
#[cfg(unix)]
pub(crate) async fn termination_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
pub(crate) async fn termination_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
