//! JetStream-backed fetch queue.

use async_trait::async_trait;
use pulse_nats::NatsClient;
use pulse_nats::stream::{
    DeadLetter, FetchRequest, FetchResult, FetchStream, PublishReceipt, StreamPublisher,
};

use super::{FetchQueue, TRACING_TARGET};
use crate::Result;

/// [`FetchQueue`] publishing onto a domain's [`FetchStream`].
#[derive(Debug, Clone)]
pub struct NatsQueue {
    client: NatsClient,
    publisher: StreamPublisher,
}

impl NatsQueue {
    /// Declares the stream and binds a publisher to it.
    pub async fn new(client: NatsClient, stream: &FetchStream) -> Result<Self> {
        let publisher = client.fetch_publisher(stream).await?;
        Ok(Self { client, publisher })
    }

    /// Returns the stream declaration.
    #[inline]
    pub fn stream(&self) -> &FetchStream {
        self.publisher.stream()
    }

    /// Returns the underlying client.
    #[inline]
    pub fn client(&self) -> &NatsClient {
        &self.client
    }
}

#[async_trait]
impl FetchQueue for NatsQueue {
    async fn enqueue(&self, request: &FetchRequest) -> Result<PublishReceipt> {
        let receipt = self.publisher.enqueue(request).await?;

        if receipt.duplicate {
            tracing::debug!(
                target: TRACING_TARGET,
                request_id = %request.request_id,
                scope = %request.scope,
                "Request already enqueued within the duplicate window"
            );
        } else {
            tracing::info!(
                target: TRACING_TARGET,
                request_id = %request.request_id,
                scope = %request.scope,
                priority = %request.priority,
                sequence = receipt.sequence,
                "Enqueued fetch request"
            );
        }

        Ok(receipt)
    }

    async fn publish_result(&self, result: &FetchResult) -> Result<()> {
        self.publisher.publish_result(result).await?;
        Ok(())
    }

    async fn publish_dead_letter(&self, letter: &DeadLetter) -> Result<()> {
        self.publisher.publish_dead_letter(letter).await?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        if !self.client.is_connected() {
            return false;
        }

        match self.client.ping().await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(target: TRACING_TARGET, error = %err, "Queue ping failed");
                false
            }
        }
    }
}
