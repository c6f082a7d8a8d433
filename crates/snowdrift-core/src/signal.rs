//! Signal handling for graceful shutdown.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wait for a shutdown signal (SIGINT, SIGTERM, or SIGQUIT on Unix).
///
/// Returns the name of the signal that fired.
#[cfg(unix)]
pub async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    info!(message = "Signal received.", signal = name);
    Ok(name)
}

#[cfg(not(unix))]
pub async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    info!(message = "Signal received.", signal = "CTRL_C");
    Ok("CTRL_C")
}

/// Cancel `token` once a shutdown signal arrives.
///
/// Returns early without cancelling if the token is cancelled elsewhere
/// first. Failing to install the handlers also cancels the token, since the
/// process could otherwise never be stopped cleanly.
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        result = shutdown_signal() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to install signal handlers");
            }
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_on_signal_returns_when_token_cancelled() {
        let token = CancellationToken::new();
        let handle = tokio::spawn(cancel_on_signal(token.clone()));

        token.cancel();

        tokio::time::timeout(Duration::from_millis(500), handle)
            .await
            .expect("watcher should stop once the token is cancelled")
            .expect("watcher should not panic");
    }

    #[tokio::test]
    async fn test_cancellation_propagates_through_clones() {
        let original = CancellationToken::new();
        let clone = original.clone();
        let child = clone.child_token();

        original.cancel();

        assert!(clone.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn test_child_cancel_does_not_cancel_parent() {
        let parent = CancellationToken::new();
        let child = parent.child_token();

        child.cancel();

        assert!(!parent.is_cancelled());
    }
}
