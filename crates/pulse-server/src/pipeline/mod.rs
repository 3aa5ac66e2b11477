//! Fetch dispatch and ingestion pipeline.
//!
//! ## Architecture
//!
//! - [`FetchScheduler`] enqueues one request per scope every interval and
//!   backs the manual triggers
//! - [`FetchWorker`] pull loops share the domain's durable consumer and
//!   settle each delivery with Ack, Nak or dead-letter
//! - [`FetchCoordinator`] turns a request into stored records and a result
//! - the monitors log results and dead letters
//! - [`WorkerHandles`] owns every background task

/// Tracing target for pipeline lifecycle events.
pub const TRACING_TARGET: &str = "pulse_server::pipeline";
/// Tracing target for request processing.
pub const TRACING_TARGET_FETCH: &str = "pulse_server::pipeline::fetch";
/// Tracing target for delivery handling.
pub const TRACING_TARGET_WORKER: &str = "pulse_server::pipeline::worker";
/// Tracing target for the scheduler.
pub const TRACING_TARGET_SCHEDULER: &str = "pulse_server::pipeline::scheduler";
/// Tracing target for result and dead-letter monitoring.
pub const TRACING_TARGET_MONITOR: &str = "pulse_server::pipeline::monitor";

mod config;
mod coordinator;
mod delivery;
mod monitor;
mod scheduler;
mod state;
mod worker;

pub use config::{DEFAULT_MAX_ITEMS, FetchConfig};
pub use coordinator::FetchCoordinator;
pub use delivery::Delivery;
pub use monitor::{log_dead_letter, log_result, run_dead_letter_monitor, run_result_monitor};
pub use scheduler::{FetchScheduler, TickReport};
pub use state::PipelineState;
pub use worker::{Disposition, FetchWorker};

use std::time::Duration;

use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Handles for the background pipeline tasks.
pub struct WorkerHandles {
    workers: Vec<JoinHandle<Result<()>>>,
    monitors: Vec<JoinHandle<Result<()>>>,
    scheduler: Option<JoinHandle<Result<()>>>,
    cancel_token: CancellationToken,
}

impl WorkerHandles {
    /// Spawns the pull loops, the monitors and, when enabled, the scheduler.
    ///
    /// Every pull loop binds to the same durable consumer and shares one
    /// semaphore bounding in-flight requests.
    pub fn spawn(state: &PipelineState) -> Self {
        let cancel_token = CancellationToken::new();
        let semaphore = state.config.create_semaphore();

        tracing::info!(
            target: TRACING_TARGET,
            domain = %state.stream.domain(),
            worker_count = state.config.worker_count,
            max_in_flight = state.config.max_in_flight(),
            scheduler_enabled = state.config.scheduler_enabled,
            "Starting fetch pipeline"
        );

        let workers = (0..state.config.worker_count)
            .map(|loop_id| {
                let state = state.clone();
                let semaphore = semaphore.clone();
                let cancel = cancel_token.clone();
                tokio::spawn(async move {
                    let subscriber = state.nats.request_subscriber(&state.stream).await?;
                    state
                        .worker
                        .run(subscriber, semaphore, cancel, loop_id)
                        .await
                })
            })
            .collect();

        let results = {
            let state = state.clone();
            let cancel = cancel_token.clone();
            tokio::spawn(async move {
                let subscriber = state.nats.result_subscriber(&state.stream).await?;
                run_result_monitor(subscriber, cancel).await
            })
        };

        let dead_letters = {
            let state = state.clone();
            let cancel = cancel_token.clone();
            tokio::spawn(async move {
                let subscriber = state.nats.dead_letter_subscriber(&state.stream).await?;
                run_dead_letter_monitor(subscriber, cancel).await
            })
        };

        let scheduler = state
            .config
            .scheduler_enabled
            .then(|| tokio::spawn(state.scheduler.clone().run(cancel_token.clone())));

        Self {
            workers,
            monitors: vec![results, dead_letters],
            scheduler,
            cancel_token,
        }
    }

    /// Returns the token cancelled by [`shutdown`](Self::shutdown).
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    /// Requests graceful shutdown.
    ///
    /// Pull loops stop pulling; requests already being processed finish.
    pub fn shutdown(&self) {
        tracing::info!(target: TRACING_TARGET, "Initiating graceful shutdown of fetch pipeline");
        self.cancel_token.cancel();
    }

    /// Cancels every task and waits up to `timeout` for them to drain.
    ///
    /// Tasks still running when the timeout elapses are aborted.
    pub async fn shutdown_within(self, timeout: Duration) -> Result<()> {
        self.shutdown();

        let abort_handles: Vec<AbortHandle> =
            self.handles().map(JoinHandle::abort_handle).collect();
        match tokio::time::timeout(timeout, self.wait_all()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    timeout_secs = timeout.as_secs(),
                    "Fetch pipeline did not drain in time, aborting remaining tasks"
                );
                abort_handles.iter().for_each(AbortHandle::abort);
                Err(Error::internal(
                    "pipeline",
                    "pipeline tasks did not stop within the shutdown timeout",
                ))
            }
        }
    }

    /// Checks if any task has finished (possibly due to error).
    pub fn any_finished(&self) -> bool {
        self.handles().any(JoinHandle::is_finished)
    }

    /// Waits for every task to complete.
    ///
    /// Returns the first error encountered, if any.
    pub async fn wait_all(self) -> Result<()> {
        tracing::debug!(target: TRACING_TARGET, "Waiting for pipeline tasks to complete");

        let handles = self
            .workers
            .into_iter()
            .chain(self.monitors)
            .chain(self.scheduler);
        let outcomes = futures::future::join_all(handles).await;

        let mut first_error = None;
        for outcome in outcomes {
            let outcome = outcome
                .map_err(|e| Error::internal("pipeline", e.to_string()))
                .and_then(|result| result);
            if let Err(err) = outcome {
                tracing::error!(target: TRACING_TARGET, error = %err, "Pipeline task failed");
                first_error.get_or_insert(err);
            }
        }

        tracing::info!(target: TRACING_TARGET, "Fetch pipeline stopped");
        first_error.map_or(Ok(()), Err)
    }

    fn handles(&self) -> impl Iterator<Item = &JoinHandle<Result<()>>> {
        self.workers
            .iter()
            .chain(self.monitors.iter())
            .chain(self.scheduler.iter())
    }
}
