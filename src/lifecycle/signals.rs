//! OS signal handling.
//!
//! # Responsibilities
//! - Resolve when the process is asked to stop (SIGINT, and SIGTERM on unix)
//! - Race a verification future against that signal
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A failed handler registration never resolves, so the work still runs

use std::future::Future;

use thiserror::Error;

/// The future was dropped because the process received a stop signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interrupted by signal")]
pub struct Interrupted;

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::warn!("Received Ctrl-C, aborting"),
        _ = terminate => tracing::warn!("Received SIGTERM, aborting"),
    }
}

/// Run `work` to completion unless `signal` resolves first.
pub async fn run_until_interrupted<F, S>(work: F, signal: S) -> Result<F::Output, Interrupted>
where
    F: Future,
    S: Future<Output = ()>,
{
    tokio::select! {
        output = work => Ok(output),
        _ = signal => Err(Interrupted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_work_finishes_first() {
        let result = run_until_interrupted(async { 7 }, std::future::pending()).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_aborts_work() {
        let work = async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            "done"
        };
        let signal = tokio::time::sleep(Duration::from_secs(1));

        assert_eq!(run_until_interrupted(work, signal).await, Err(Interrupted));
    }
}
