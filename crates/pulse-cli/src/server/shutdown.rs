//! Graceful shutdown signal handling.

use std::time::Duration;

use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix;

use crate::TRACING_TARGET_SERVER_SHUTDOWN;

/// How often the pipeline tasks are checked for an early exit.
const PIPELINE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Waits for SIGTERM or SIGINT (Ctrl+C).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error = %e,
                "Failed to install Ctrl+C handler"
            );
            std::future::pending::<()>().await;
        } else {
            tracing::info!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                "Received Ctrl+C signal, initiating graceful shutdown"
            );
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match unix::signal(unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                tracing::info!(
                    target: TRACING_TARGET_SERVER_SHUTDOWN,
                    "Received SIGTERM signal, initiating graceful shutdown"
                );
            }
            Err(e) => {
                tracing::error!(
                    target: TRACING_TARGET_SERVER_SHUTDOWN,
                    error = %e,
                    "Failed to install SIGTERM handler"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Resolves once `finished` reports that a pipeline task has exited.
pub async fn pipeline_stopped(finished: impl Fn() -> bool) {
    let mut interval = tokio::time::interval(PIPELINE_POLL_INTERVAL);
    loop {
        interval.tick().await;
        if finished() {
            tracing::warn!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                "Fetch pipeline task exited, initiating shutdown"
            );
            return;
        }
    }
}

/// Resolves on a shutdown signal or an early pipeline exit, whichever
/// comes first.
pub async fn shutdown_trigger(finished: impl Fn() -> bool) {
    tokio::select! {
        () = shutdown_signal() => {},
        () = pipeline_stopped(finished) => {},
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pipeline_exit_triggers_shutdown() {
        let finished = Arc::new(AtomicBool::new(false));

        let flag = finished.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let started = tokio::time::Instant::now();
        pipeline_stopped(|| finished.load(Ordering::SeqCst)).await;
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
