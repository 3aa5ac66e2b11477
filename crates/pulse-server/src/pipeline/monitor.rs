//! Result and dead-letter monitoring.

use std::time::Duration;

use pulse_nats::stream::{DeadLetter, FetchResult, StreamSubscriber};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::TRACING_TARGET_MONITOR;
use crate::Result;

const PULL_TIMEOUT: Duration = Duration::from_secs(5);
const PULL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Logs every [`FetchResult`] published on the domain's result subject.
pub async fn run_result_monitor(
    subscriber: StreamSubscriber<FetchResult>,
    cancel: CancellationToken,
) -> Result<()> {
    consume(subscriber, cancel, log_result).await
}

/// Logs every [`DeadLetter`] published on the domain's dead subject.
pub async fn run_dead_letter_monitor(
    subscriber: StreamSubscriber<DeadLetter>,
    cancel: CancellationToken,
) -> Result<()> {
    consume(subscriber, cancel, log_dead_letter).await
}

pub fn log_result(result: &FetchResult) {
    if result.success {
        tracing::info!(
            target: TRACING_TARGET_MONITOR,
            request_id = %result.request_id,
            scope = %result.scope,
            priority = %result.priority,
            attempt = result.attempt,
            fetched_items = result.fetched_items,
            item_count = result.item_count,
            "Fetch succeeded"
        );
    } else {
        tracing::warn!(
            target: TRACING_TARGET_MONITOR,
            request_id = %result.request_id,
            scope = %result.scope,
            priority = %result.priority,
            attempt = result.attempt,
            fetched_items = result.fetched_items,
            error = result.error.as_deref().unwrap_or("unknown"),
            "Fetch failed"
        );
    }
}

pub fn log_dead_letter(letter: &DeadLetter) {
    tracing::error!(
        target: TRACING_TARGET_MONITOR,
        request_id = %letter.request.request_id,
        scope = %letter.request.scope,
        attempts = letter.attempts,
        dead_at = %letter.dead_at,
        error = %letter.last_error,
        "Fetch request dead-lettered"
    );
}

async fn consume<T>(
    subscriber: StreamSubscriber<T>,
    cancel: CancellationToken,
    log: fn(&T),
) -> Result<()>
where
    T: DeserializeOwned + Send + 'static,
{
    let mut stream = subscriber.subscribe().await?;

    tracing::info!(
        target: TRACING_TARGET_MONITOR,
        consumer = %subscriber.consumer_name(),
        "Monitor started"
    );

    loop {
        let next = tokio::select! {
            biased;

            () = cancel.cancelled() => break,
            next = stream.next_with_timeout(PULL_TIMEOUT) => next,
        };

        match next {
            Ok(Some(message)) => {
                log(message.payload());
                if let Err(err) = message.ack().await {
                    tracing::debug!(
                        target: TRACING_TARGET_MONITOR,
                        error = %err,
                        "Failed to acknowledge monitored message"
                    );
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(
                    target: TRACING_TARGET_MONITOR,
                    consumer = %subscriber.consumer_name(),
                    error = %err,
                    "Failed to pull monitored message"
                );
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(PULL_ERROR_BACKOFF) => {}
                }
            }
        }
    }

    tracing::info!(
        target: TRACING_TARGET_MONITOR,
        consumer = %subscriber.consumer_name(),
        "Monitor stopped"
    );
    Ok(())
}
