//! HTTP server startup with pipeline-first shutdown.

use std::future::{IntoFuture, pending};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::Router;
use pulse_server::pipeline::WorkerHandles;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::shutdown::shutdown_trigger;
use super::{ServerError, ServerResult};
use crate::config::ServerConfig;
use crate::{TRACING_TARGET_SERVER_SHUTDOWN, TRACING_TARGET_SERVER_STARTUP};

/// Binds `server_config`'s address and serves `app`.
///
/// When the shutdown trigger fires the pipeline is drained first. Only then
/// does axum stop accepting connections, giving open ones up to the
/// configured shutdown timeout.
pub async fn serve_http(
    app: Router,
    server_config: ServerConfig,
    pipeline: WorkerHandles,
    drain_timeout: Duration,
) -> ServerResult<()> {
    server_config
        .validate()
        .map_err(|err| ServerError::invalid_config(&err))?;

    let server_addr = server_config.server_addr();
    let listener = TcpListener::bind(server_addr).await.map_err(|err| {
        tracing::error!(
            target: TRACING_TARGET_SERVER_STARTUP,
            addr = %server_addr,
            error = %err,
            "Failed to bind to address"
        );
        ServerError::bind_error(server_addr, err)
    })?;

    let shutdown_timeout = server_config.shutdown_timeout();
    let (drained_tx, drained_rx) = oneshot::channel();
    let (stopping_tx, stopping_rx) = oneshot::channel::<()>();

    let graceful = async move {
        shutdown_trigger(|| pipeline.any_finished()).await;

        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            drain_timeout_secs = drain_timeout.as_secs(),
            "Draining fetch pipeline"
        );
        let drained = pipeline.shutdown_within(drain_timeout).await;
        let _ = drained_tx.send(drained);

        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            timeout_secs = shutdown_timeout.as_secs(),
            "Draining HTTP connections"
        );
        let _ = stopping_tx.send(());
    };

    let connections_deadline = async move {
        if stopping_rx.await.is_err() {
            pending::<()>().await;
        }
        tokio::time::sleep(shutdown_timeout).await;
    };

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        addr = %server_addr,
        "Server is ready and listening for connections"
    );
    if server_config.binds_to_all_interfaces() {
        tracing::warn!(
            target: TRACING_TARGET_SERVER_STARTUP,
            "Server bound to all interfaces, make sure the port is firewalled"
        );
    }

    let started = Instant::now();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful)
    .into_future();

    tokio::select! {
        result = server => result.map_err(ServerError::Runtime)?,
        () = connections_deadline => {
            tracing::warn!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                "Open connections did not close within the shutdown timeout"
            );
        }
    }

    tracing::info!(
        target: TRACING_TARGET_SERVER_SHUTDOWN,
        uptime_secs = started.elapsed().as_secs(),
        "HTTP server stopped"
    );

    match drained_rx.await {
        Ok(drained) => drained.map_err(ServerError::Pipeline),
        Err(_) => Ok(()),
    }
}
