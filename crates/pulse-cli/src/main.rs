#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use pulse_server::handler::routes;
use pulse_server::middleware::{RouterObservabilityExt, RouterRecoveryExt};
use pulse_server::pipeline::WorkerHandles;
use pulse_server::service::ServiceState;

use crate::config::{Cli, MiddlewareConfig};

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "pulse_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "pulse_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "pulse_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %format!("{error:#}"),
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    cli.log();
    cli.validate()?;

    let (state, pipeline) = ServiceState::from_config(&cli.service)
        .await
        .context("failed to create service state")?;

    let handles = WorkerHandles::spawn(&pipeline);
    let router = create_router(state, &cli.middleware);
    let drain_timeout = cli.service.fetch.request_timeout();

    server::serve(router, cli.server, handles, drain_timeout).await?;

    Ok(())
}

/// Creates the router with all middleware layers applied.
///
/// The last layer added is the outermost:
/// 1. Recovery catches panics and enforces timeouts
/// 2. Observability assigns request ids and opens spans
/// 3. Routes
fn create_router(state: ServiceState, middleware: &MiddlewareConfig) -> Router {
    routes()
        .with_state(state)
        .with_observability()
        .with_recovery(&middleware.recovery)
}
