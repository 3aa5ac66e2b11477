//! Type-safe durable pull subscriber for the fetch stream.

use std::marker::PhantomData;
use std::time::Duration;

use async_nats::jetstream::consumer::{self, Consumer};
use async_nats::jetstream::{self, AckKind, Context, Message};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use super::fetch_stream::FetchStream;
use crate::{Error, Result, TRACING_TARGET_STREAM};

/// Extra time granted on top of the server-side pull expiry.
const PULL_GRACE: Duration = Duration::from_secs(1);

/// Type-safe subscriber bound to one durable consumer.
///
/// Every worker that subscribes through the same subscriber shares the
/// consumer, so deliveries are load-balanced across them.
#[derive(Debug, Clone)]
pub struct StreamSubscriber<T> {
    jetstream: Context,
    stream: FetchStream,
    consumer_name: String,
    filter_subject: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StreamSubscriber<T>
where
    T: DeserializeOwned + Send + 'static,
{
    #[instrument(skip(jetstream, stream), target = TRACING_TARGET_STREAM)]
    pub(crate) async fn new(
        jetstream: &Context,
        stream: &FetchStream,
        consumer_name: String,
        filter_subject: String,
    ) -> Result<Self> {
        debug!(
            target: TRACING_TARGET_STREAM,
            stream = %stream.name(),
            consumer = %consumer_name,
            filter_subject = %filter_subject,
            type_name = std::any::type_name::<T>(),
            "Created type-safe stream subscriber"
        );

        Ok(Self {
            jetstream: jetstream.clone(),
            stream: stream.clone(),
            consumer_name,
            filter_subject,
            _marker: PhantomData,
        })
    }

    /// Binds to the durable consumer (creating it when missing) and returns
    /// a typed message stream.
    #[instrument(skip(self), fields(consumer = %self.consumer_name), target = TRACING_TARGET_STREAM)]
    pub async fn subscribe(&self) -> Result<TypedMessageStream<T>> {
        let stream_name = self.stream.name();
        let stream = self
            .jetstream
            .get_stream(&stream_name)
            .await
            .map_err(|e| Error::stream_error(&stream_name, format!("Failed to get stream: {e}")))?;

        let config = self
            .stream
            .consumer_config(&self.consumer_name, &self.filter_subject);
        let consumer = stream
            .get_or_create_consumer(&self.consumer_name, config)
            .await
            .map_err(|e| {
                Error::consumer_error(&self.consumer_name, format!("Failed to create consumer: {e}"))
            })?;

        debug!(
            target: TRACING_TARGET_STREAM,
            stream = %stream_name,
            consumer = %self.consumer_name,
            "Subscribed to stream"
        );

        Ok(TypedMessageStream {
            consumer,
            _marker: PhantomData,
        })
    }

    /// Returns the stream declaration.
    #[inline]
    pub fn stream(&self) -> &FetchStream {
        &self.stream
    }

    /// Returns the consumer name.
    #[inline]
    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Check if the stream and consumer are reachable.
    #[instrument(skip(self), target = TRACING_TARGET_STREAM)]
    pub async fn health_check(&self) -> bool {
        let stream_name = self.stream.name();
        let stream = match self.jetstream.get_stream(&stream_name).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!(
                    target: TRACING_TARGET_STREAM,
                    stream = %stream_name,
                    error = %e,
                    "Stream health check failed"
                );
                return false;
            }
        };

        match stream
            .get_consumer::<consumer::pull::Config>(&self.consumer_name)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!(
                    target: TRACING_TARGET_STREAM,
                    consumer = %self.consumer_name,
                    error = %e,
                    "Consumer health check failed"
                );
                false
            }
        }
    }
}

/// Typed message stream over a pull consumer.
pub struct TypedMessageStream<T> {
    consumer: Consumer<consumer::pull::Config>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedMessageStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Pulls at most one message, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time. A message whose
    /// payload does not decode is terminated so it is never redelivered,
    /// and the decode error is returned.
    pub async fn next_with_timeout(&mut self, timeout: Duration) -> Result<Option<TypedMessage<T>>> {
        let mut batch = self
            .consumer
            .fetch()
            .max_messages(1)
            .expires(timeout)
            .messages()
            .await
            .map_err(|e| Error::operation("message_fetch", e.to_string()))?;

        let message = match tokio::time::timeout(timeout + PULL_GRACE, batch.next()).await {
            Err(_) | Ok(None) => return Ok(None),
            Ok(Some(Err(e))) => {
                warn!(
                    target: TRACING_TARGET_STREAM,
                    error = %e,
                    "Error receiving message"
                );
                return Err(Error::operation("message_receive", e.to_string()));
            }
            Ok(Some(Ok(message))) => message,
        };

        match serde_json::from_slice::<T>(&message.payload) {
            Ok(payload) => {
                debug!(
                    target: TRACING_TARGET_STREAM,
                    subject = %message.subject,
                    "Received typed message"
                );
                Ok(Some(TypedMessage { payload, message }))
            }
            Err(e) => {
                warn!(
                    target: TRACING_TARGET_STREAM,
                    subject = %message.subject,
                    error = %e,
                    "Terminating undecodable message"
                );
                message
                    .ack_with(AckKind::Term)
                    .await
                    .map_err(|e| Error::ack("term", e.to_string()))?;
                Err(Error::Serialization(e))
            }
        }
    }
}

/// A typed message from the stream.
pub struct TypedMessage<T> {
    /// The deserialized payload.
    pub payload: T,
    message: Message,
}

impl<T> TypedMessage<T> {
    /// Get the message subject.
    pub fn subject(&self) -> &str {
        &self.message.subject
    }

    /// Get the message metadata.
    pub fn info(&self) -> Result<jetstream::message::Info<'_>> {
        self.message
            .info()
            .map_err(|e| Error::operation("message_info", e.to_string()))
    }

    /// Get the 1-based delivery attempt of this message.
    pub fn delivery_count(&self) -> Result<u64> {
        self.info().map(|info| info.delivered.unsigned_abs())
    }

    /// Get a reference to the typed payload.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Acknowledge the message.
    pub async fn ack(&self) -> Result<()> {
        self.message
            .ack()
            .await
            .map_err(|e| Error::ack("ack", e.to_string()))
    }

    /// Negative acknowledge the message, asking for redelivery after `delay`
    /// (immediately when `None`).
    pub async fn nak(&self, delay: Option<Duration>) -> Result<()> {
        self.message
            .ack_with(AckKind::Nak(delay))
            .await
            .map_err(|e| Error::ack("nak", e.to_string()))
    }

    /// Signal that work is still in progress, resetting the ack deadline.
    pub async fn progress(&self) -> Result<()> {
        self.message
            .ack_with(AckKind::Progress)
            .await
            .map_err(|e| Error::ack("progress", e.to_string()))
    }

    /// Terminate the message; it will not be redelivered.
    pub async fn term(&self) -> Result<()> {
        self.message
            .ack_with(AckKind::Term)
            .await
            .map_err(|e| Error::ack("term", e.to_string()))
    }
}
