//! HTTP server startup and shutdown sequencing.

mod error;
mod http_server;
mod shutdown;

use std::time::Duration;

use axum::Router;
pub use error::{ServerError, ServerResult};
use pulse_server::pipeline::WorkerHandles;

use crate::config::ServerConfig;

/// Serves `app` until a shutdown signal arrives or a pipeline task stops.
///
/// On shutdown the pipeline is cancelled and drained within
/// `drain_timeout` before the HTTP server stops accepting connections and
/// drains its own.
///
/// # Errors
///
/// Returns an error if:
/// - Server configuration is invalid
/// - Cannot bind to the specified address/port
/// - Server encounters a fatal error during operation
/// - A pipeline task failed or did not drain in time
pub async fn serve(
    app: Router,
    config: ServerConfig,
    pipeline: WorkerHandles,
    drain_timeout: Duration,
) -> ServerResult<()> {
    let result = http_server::serve_http(app, config, pipeline, drain_timeout).await;
    if let Err(err) = &result {
        err.log();
    }
    result
}
