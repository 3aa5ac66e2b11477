//! NATS client wrapper and connection management.
//!
//! The underlying `async-nats` client multiplexes every operation over a
//! single TCP connection, so [`NatsClient`] is cheap to clone and share
//! between the API tier, the scheduler, and the fetch workers.

use std::sync::Arc;
use std::time::Duration;

use async_nats::{Client, ConnectOptions, jetstream};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::timeout;

use super::nats_config::NatsConfig;
use crate::stream::{
    DeadLetter, FetchRequest, FetchResult, FetchStream, StreamPublisher, StreamSubscriber,
};
use crate::{Error, Result, TRACING_TARGET_CLIENT, TRACING_TARGET_CONNECTION};

/// NATS client wrapper with connection management.
#[derive(Debug, Clone)]
pub struct NatsClient {
    inner: Arc<NatsClientInner>,
}

#[derive(Debug)]
struct NatsClientInner {
    client: Client,
    jetstream: jetstream::Context,
    config: NatsConfig,
}

impl NatsClient {
    /// Create a new NATS client and connect.
    #[tracing::instrument(skip(config), target = TRACING_TARGET_CONNECTION)]
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        config.validate().map_err(Error::invalid_config)?;
        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            url = %config.nats_url,
            "Connecting to NATS servers"
        );

        let mut connect_opts = ConnectOptions::new()
            .name(config.name())
            .ping_interval(config.ping_interval());

        if let Some(token) = config.nats_token.clone() {
            connect_opts = connect_opts.token(token);
        }

        if let Some(timeout) = config.connect_timeout() {
            connect_opts = connect_opts.connection_timeout(timeout);
        }

        connect_opts = connect_opts.max_reconnects(config.max_reconnects_option());
        let reconnect_delay_ms = config.reconnect_delay().as_millis().min(u64::MAX as u128) as u64;
        connect_opts = connect_opts.reconnect_delay_callback(move |attempts| {
            Duration::from_millis(std::cmp::min(
                reconnect_delay_ms * 2_u64.pow(attempts.min(32) as u32),
                30_000, // Max 30 seconds
            ))
        });

        let connect_timeout = config.connect_timeout().unwrap_or(Duration::from_secs(30));
        let client = timeout(
            connect_timeout,
            async_nats::connect_with_options(config.nats_url.as_str(), connect_opts),
        )
        .await
        .map_err(|_| Error::timeout(connect_timeout))?
        .map_err(|e| Error::Connection(Box::new(e)))?;

        let jetstream = jetstream::new(client.clone());

        let server_info = client.server_info();
        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            server_host = %server_info.host,
            server_version = %server_info.version,
            server_id = %server_info.server_id,
            max_payload = server_info.max_payload,
            "Successfully connected to NATS"
        );

        Ok(Self {
            inner: Arc::new(NatsClientInner {
                client,
                jetstream,
                config,
            }),
        })
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &NatsConfig {
        &self.inner.config
    }

    /// Get the JetStream context.
    #[must_use]
    pub fn jetstream(&self) -> &jetstream::Context {
        &self.inner.jetstream
    }

    /// Test connectivity with a ping.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_CONNECTION)]
    pub async fn ping(&self) -> Result<Duration> {
        let start = std::time::Instant::now();

        timeout(Duration::from_secs(10), self.inner.client.flush())
            .await
            .map_err(|_| Error::timeout(Duration::from_secs(10)))?
            .map_err(|e| Error::Connection(Box::new(e)))?;

        let ping_time = start.elapsed();
        tracing::debug!(
            target: TRACING_TARGET_CLIENT,
            duration_ms = ping_time.as_millis(),
            "NATS ping successful"
        );
        Ok(ping_time)
    }

    /// Check if the client is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(
            self.inner.client.connection_state(),
            async_nats::connection::State::Connected
        )
    }
}

// Fetch stream getters
impl NatsClient {
    /// Declares the fetch stream (get-or-create) and returns a publisher for it.
    #[tracing::instrument(skip(self, stream), target = TRACING_TARGET_CLIENT)]
    pub async fn fetch_publisher(&self, stream: &FetchStream) -> Result<StreamPublisher> {
        StreamPublisher::new(&self.inner.jetstream, stream).await
    }

    /// Subscriber for fetch requests, bound to the shared worker consumer.
    #[tracing::instrument(skip(self, stream), target = TRACING_TARGET_CLIENT)]
    pub async fn request_subscriber(
        &self,
        stream: &FetchStream,
    ) -> Result<StreamSubscriber<FetchRequest>> {
        self.subscriber(stream, stream.worker_consumer(), stream.request_subject())
            .await
    }

    /// Subscriber for fetch result notifications.
    #[tracing::instrument(skip(self, stream), target = TRACING_TARGET_CLIENT)]
    pub async fn result_subscriber(
        &self,
        stream: &FetchStream,
    ) -> Result<StreamSubscriber<FetchResult>> {
        self.subscriber(stream, stream.monitor_consumer(), stream.result_subject())
            .await
    }

    /// Subscriber for dead-lettered fetch requests.
    #[tracing::instrument(skip(self, stream), target = TRACING_TARGET_CLIENT)]
    pub async fn dead_letter_subscriber(
        &self,
        stream: &FetchStream,
    ) -> Result<StreamSubscriber<DeadLetter>> {
        self.subscriber(stream, stream.dead_letter_consumer(), stream.dead_subject())
            .await
    }

    async fn subscriber<T>(
        &self,
        stream: &FetchStream,
        consumer: String,
        filter_subject: String,
    ) -> Result<StreamSubscriber<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        // Ensure the stream exists before binding a consumer to it.
        stream.ensure(&self.inner.jetstream).await?;
        StreamSubscriber::new(&self.inner.jetstream, stream, consumer, filter_subject).await
    }
}
