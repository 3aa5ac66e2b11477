//! Task queue seam.
//!
//! The scheduler and the HTTP triggers enqueue through [`FetchQueue`];
//! workers publish outcomes through it. Consumption goes through the typed
//! pull subscriber in the pipeline.

#[cfg(test)]
mod memory;
mod nats;

use async_trait::async_trait;
#[cfg(test)]
pub use memory::MemoryQueue;
pub use nats::NatsQueue;
use pulse_nats::stream::{DeadLetter, FetchRequest, FetchResult, PublishReceipt};

use crate::Result;

/// Tracing target for queue operations.
pub const TRACING_TARGET: &str = "pulse_server::queue";

/// Producer side of the fetch work queue.
#[async_trait]
pub trait FetchQueue: Send + Sync {
    /// Enqueues a request.
    ///
    /// A request whose id was already enqueued within the duplicate window
    /// is accepted but reported with `duplicate = true` and not redelivered.
    async fn enqueue(&self, request: &FetchRequest) -> Result<PublishReceipt>;

    /// Publishes a result notification.
    async fn publish_result(&self, result: &FetchResult) -> Result<()>;

    /// Publishes a dead letter for a request that exhausted its attempts.
    async fn publish_dead_letter(&self, letter: &DeadLetter) -> Result<()>;

    /// Returns whether the queue is reachable.
    async fn ping(&self) -> bool;
}
