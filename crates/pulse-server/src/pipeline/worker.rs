//! Fetch worker: delivery handling and the pull loop.

use std::sync::Arc;
use std::time::Duration;

use pulse_nats::stream::{DeadLetter, FetchRequest, FetchResult, StreamSubscriber};
use tokio::sync::Semaphore;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{Delivery, FetchConfig, FetchCoordinator, TRACING_TARGET_WORKER};
use crate::Result;
use crate::queue::FetchQueue;

/// How long a single pull waits for a message.
const PULL_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause after a failed pull before trying again.
const PULL_ERROR_BACKOFF: Duration = Duration::from_secs(1);
/// Longest interval between `Progress` acknowledgements.
const MAX_HEARTBEAT: Duration = Duration::from_secs(10);
/// Shortest interval between `Progress` acknowledgements.
const MIN_HEARTBEAT: Duration = Duration::from_millis(250);

/// Returns how often a running request extends its delivery deadline.
///
/// Half of `ack_wait`, so the deadline is always extended at least once
/// before it can expire, and never less often than every 10 seconds.
pub fn heartbeat_interval(ack_wait: Duration) -> Duration {
    (ack_wait / 2).clamp(MIN_HEARTBEAT, MAX_HEARTBEAT)
}

/// What happened to a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed successfully and acknowledged.
    Acked,
    /// Failed and handed back for redelivery.
    Retried,
    /// Failed on the final attempt; dead-lettered and terminated.
    DeadLettered,
}

/// Processes deliveries from the shared worker consumer.
pub struct FetchWorker {
    coordinator: Arc<FetchCoordinator>,
    queue: Arc<dyn FetchQueue>,
    max_deliver: u64,
    retry_delay: Duration,
    request_timeout: Duration,
    heartbeat: Duration,
}

impl FetchWorker {
    /// Creates a worker using the delivery settings in `config`.
    pub fn new(
        config: &FetchConfig,
        coordinator: Arc<FetchCoordinator>,
        queue: Arc<dyn FetchQueue>,
    ) -> Self {
        Self {
            coordinator,
            queue,
            max_deliver: u64::from(config.max_retries.max(1)),
            retry_delay: config.retry_delay(),
            request_timeout: config.request_timeout(),
            heartbeat: heartbeat_interval(config.retry_delay()),
        }
    }

    /// Returns the coordinator.
    #[inline]
    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    /// Processes one delivery and settles it.
    ///
    /// The result is published before the delivery is acknowledged. A
    /// failure on the final allowed attempt publishes a [`DeadLetter`] and
    /// terminates the delivery; earlier failures are Nak'd with the retry
    /// delay.
    pub async fn handle_delivery<D>(&self, delivery: &D) -> Disposition
    where
        D: Delivery + ?Sized,
    {
        let request = delivery.request();
        let attempt = delivery.attempt();

        tracing::info!(
            target: TRACING_TARGET_WORKER,
            request_id = %request.request_id,
            scope = %request.scope,
            priority = %request.priority,
            attempt,
            "Processing fetch request"
        );

        let result = self.process_with_heartbeat(delivery).await;

        if let Err(err) = self.queue.publish_result(&result).await {
            tracing::warn!(
                target: TRACING_TARGET_WORKER,
                request_id = %request.request_id,
                error = %err,
                "Failed to publish fetch result"
            );
        }

        if result.success {
            settle(request, "ack", delivery.ack().await);
            return Disposition::Acked;
        }

        let error = result.error.unwrap_or_default();
        if attempt < self.max_deliver {
            tracing::warn!(
                target: TRACING_TARGET_WORKER,
                request_id = %request.request_id,
                attempt,
                max_deliver = self.max_deliver,
                error = %error,
                "Fetch request failed, scheduling redelivery"
            );
            settle(request, "nak", delivery.nak(Some(self.retry_delay)).await);
            return Disposition::Retried;
        }

        tracing::error!(
            target: TRACING_TARGET_WORKER,
            request_id = %request.request_id,
            attempts = attempt,
            error = %error,
            "Fetch request exhausted its attempts, dead-lettering"
        );

        let letter = DeadLetter::new(request.clone(), attempt, error);
        if let Err(err) = self.queue.publish_dead_letter(&letter).await {
            tracing::error!(
                target: TRACING_TARGET_WORKER,
                request_id = %request.request_id,
                error = %err,
                "Failed to publish dead letter"
            );
        }
        settle(request, "term", delivery.term().await);
        Disposition::DeadLettered
    }

    /// Runs the coordinator under the request timeout, sending `Progress`
    /// every heartbeat so the delivery is not handed to another worker.
    async fn process_with_heartbeat<D>(&self, delivery: &D) -> FetchResult
    where
        D: Delivery + ?Sized,
    {
        let request = delivery.request();
        let attempt = delivery.attempt();

        let work = tokio::time::timeout(
            self.request_timeout,
            self.coordinator.process(request, attempt),
        );
        tokio::pin!(work);

        let mut heartbeat = tokio::time::interval_at(Instant::now() + self.heartbeat, self.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                outcome = &mut work => {
                    return outcome.unwrap_or_else(|_| {
                        FetchResult::failure(
                            request,
                            attempt,
                            0,
                            format!("request timed out after {}s", self.request_timeout.as_secs()),
                        )
                    });
                }
                _ = heartbeat.tick() => {
                    if let Err(err) = delivery.progress().await {
                        tracing::debug!(
                            target: TRACING_TARGET_WORKER,
                            request_id = %request.request_id,
                            error = %err,
                            "Failed to extend delivery deadline"
                        );
                    }
                }
            }
        }
    }

    /// Pulls and processes requests until `cancel` fires.
    ///
    /// A permit from `semaphore` is held from before the pull until the
    /// delivery is settled. Cancellation stops pulling; a request already
    /// being processed runs to completion.
    pub async fn run(
        self: Arc<Self>,
        subscriber: StreamSubscriber<FetchRequest>,
        semaphore: Arc<Semaphore>,
        cancel: CancellationToken,
        loop_id: usize,
    ) -> Result<()> {
        let mut stream = subscriber.subscribe().await?;

        tracing::info!(
            target: TRACING_TARGET_WORKER,
            loop_id,
            consumer = %subscriber.consumer_name(),
            "Fetch worker started"
        );

        loop {
            let permit = tokio::select! {
                biased;

                () = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::error!(
                            target: TRACING_TARGET_WORKER,
                            loop_id,
                            "Semaphore closed, stopping worker"
                        );
                        break;
                    }
                },
            };

            let next = tokio::select! {
                biased;

                () = cancel.cancelled() => break,
                next = stream.next_with_timeout(PULL_TIMEOUT) => next,
            };

            match next {
                Ok(Some(message)) => {
                    self.handle_delivery(&message).await;
                }
                Ok(None) => {
                    tracing::trace!(target: TRACING_TARGET_WORKER, loop_id, "No requests available");
                }
                Err(err) => {
                    tracing::warn!(
                        target: TRACING_TARGET_WORKER,
                        loop_id,
                        error = %err,
                        "Failed to pull fetch request"
                    );
                    tokio::select! {
                        biased;

                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(PULL_ERROR_BACKOFF) => {}
                    }
                }
            }

            drop(permit);
        }

        tracing::info!(target: TRACING_TARGET_WORKER, loop_id, "Fetch worker stopped");
        Ok(())
    }
}

fn settle(request: &FetchRequest, kind: &'static str, outcome: pulse_nats::Result<()>) {
    if let Err(err) = outcome {
        tracing::error!(
            target: TRACING_TARGET_WORKER,
            request_id = %request.request_id,
            ack_kind = kind,
            error = %err,
            "Failed to settle delivery"
        );
    }
}
