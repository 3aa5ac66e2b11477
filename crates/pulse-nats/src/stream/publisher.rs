//! Typed publisher for the fetch stream.

use async_nats::jetstream::{self, context::Publish};
use serde::Serialize;
use tracing::{debug, instrument};

use super::fetch_request::FetchRequest;
use super::fetch_result::{DeadLetter, FetchResult};
use super::fetch_stream::FetchStream;
use crate::{Error, Result, TRACING_TARGET_STREAM};

/// Acknowledgement returned by JetStream for a stored message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Stream sequence assigned to the message.
    pub sequence: u64,
    /// True when the server discarded the message as a duplicate id.
    pub duplicate: bool,
}

/// Publishes JSON payloads onto a [`FetchStream`].
#[derive(Debug, Clone)]
pub struct StreamPublisher {
    jetstream: jetstream::Context,
    stream: FetchStream,
}

impl StreamPublisher {
    /// Declares the stream and returns a publisher bound to it.
    #[instrument(skip(jetstream, stream), target = TRACING_TARGET_STREAM)]
    pub(crate) async fn new(jetstream: &jetstream::Context, stream: &FetchStream) -> Result<Self> {
        stream.ensure(jetstream).await?;
        Ok(Self {
            jetstream: jetstream.clone(),
            stream: stream.clone(),
        })
    }

    /// Returns the stream declaration.
    #[inline]
    pub fn stream(&self) -> &FetchStream {
        &self.stream
    }

    /// Enqueues a fetch request, deduplicated by its `request_id`.
    #[instrument(skip(self, request), fields(request_id = %request.request_id), target = TRACING_TARGET_STREAM)]
    pub async fn enqueue(&self, request: &FetchRequest) -> Result<PublishReceipt> {
        self.publish(
            &self.stream.request_subject(),
            request,
            Some(&request.request_id),
        )
        .await
    }

    /// Publishes a result notification.
    pub async fn publish_result(&self, result: &FetchResult) -> Result<PublishReceipt> {
        self.publish(&self.stream.result_subject(), result, None)
            .await
    }

    /// Publishes a dead letter.
    pub async fn publish_dead_letter(&self, letter: &DeadLetter) -> Result<PublishReceipt> {
        let message_id = format!("{}-dead", letter.request.request_id);
        self.publish(&self.stream.dead_subject(), letter, Some(&message_id))
            .await
    }

    /// Serializes `payload` and publishes it on `subject`, waiting for the
    /// stream acknowledgement.
    pub async fn publish<T>(
        &self,
        subject: &str,
        payload: &T,
        message_id: Option<&str>,
    ) -> Result<PublishReceipt>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(payload)?;
        let payload_size = payload.len();

        let mut publish = Publish::build().payload(payload.into());
        if let Some(id) = message_id {
            publish = publish.message_id(id);
        }

        let ack = self
            .jetstream
            .send_publish(subject.to_owned(), publish)
            .await
            .map_err(|e| Error::delivery_failed(subject, e.to_string()))?
            .await
            .map_err(|e| Error::delivery_failed(subject, e.to_string()))?;

        debug!(
            target: TRACING_TARGET_STREAM,
            subject = %subject,
            sequence = ack.sequence,
            duplicate = ack.duplicate,
            payload_size = payload_size,
            "Published message"
        );

        Ok(PublishReceipt {
            sequence: ack.sequence,
            duplicate: ack.duplicate,
        })
    }
}
