//! Per-domain fetch stream declaration.

use std::time::Duration;

use async_nats::jetstream::{self, consumer, stream};

use crate::{Error, Result, TRACING_TARGET_STREAM};

/// Work-queue stream carrying fetch requests, results and dead letters for
/// one content domain.
///
/// For the domain `news` this declares stream `NEWS_FETCH` bound to
/// `news.fetch.>`, with requests on `news.fetch.request`, results on
/// `news.fetch.result` and dead letters on `news.fetch.dead`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchStream {
    domain: String,
    duplicate_window: Duration,
    ack_wait: Duration,
    max_deliver: i64,
    max_ack_pending: i64,
}

impl FetchStream {
    /// Messages older than this are discarded regardless of consumption.
    pub const MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
    /// Default visibility timeout before an unacknowledged delivery is redelivered.
    pub const DEFAULT_ACK_WAIT: Duration = Duration::from_secs(30);
    /// Default maximum number of deliveries per request.
    pub const DEFAULT_MAX_DELIVER: i64 = 3;
    /// Default window in which equal message ids are deduplicated.
    pub const DEFAULT_DUPLICATE_WINDOW: Duration = Duration::from_secs(4 * 60 * 60);

    /// Creates the declaration for `domain` with default delivery settings.
    pub fn new(domain: impl Into<String>) -> Result<Self> {
        let domain = domain.into();
        let valid = !domain.is_empty()
            && domain
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !valid {
            return Err(Error::invalid_config(format!(
                "domain '{domain}' must be non-empty lowercase [a-z0-9_-]"
            )));
        }

        Ok(Self {
            domain,
            duplicate_window: Self::DEFAULT_DUPLICATE_WINDOW,
            ack_wait: Self::DEFAULT_ACK_WAIT,
            max_deliver: Self::DEFAULT_MAX_DELIVER,
            max_ack_pending: Self::DEFAULT_MAX_DELIVER,
        })
    }

    /// Sets the deduplication window, capped at [`Self::MAX_AGE`].
    #[must_use]
    pub fn with_duplicate_window(mut self, window: Duration) -> Self {
        self.duplicate_window = window.min(Self::MAX_AGE);
        self
    }

    /// Sets the visibility timeout.
    #[must_use]
    pub fn with_ack_wait(mut self, ack_wait: Duration) -> Self {
        self.ack_wait = ack_wait;
        self
    }

    /// Sets the maximum delivery count (at least one).
    #[must_use]
    pub fn with_max_deliver(mut self, max_deliver: u32) -> Self {
        self.max_deliver = i64::from(max_deliver.max(1));
        self
    }

    /// Sets how many deliveries may be outstanding on the worker consumer.
    #[must_use]
    pub fn with_max_ack_pending(mut self, max_ack_pending: usize) -> Self {
        self.max_ack_pending = i64::try_from(max_ack_pending.max(1)).unwrap_or(i64::MAX);
        self
    }

    /// Returns the content domain.
    #[inline]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the JetStream stream name.
    pub fn name(&self) -> String {
        format!("{}_FETCH", self.domain.to_ascii_uppercase().replace('-', "_"))
    }

    /// Returns the wildcard subject the stream is bound to.
    pub fn subjects(&self) -> String {
        format!("{}.fetch.>", self.domain)
    }

    /// Subject carrying [`FetchRequest`](super::FetchRequest)s.
    pub fn request_subject(&self) -> String {
        format!("{}.fetch.request", self.domain)
    }

    /// Subject carrying [`FetchResult`](super::FetchResult)s.
    pub fn result_subject(&self) -> String {
        format!("{}.fetch.result", self.domain)
    }

    /// Subject carrying [`DeadLetter`](super::DeadLetter)s.
    pub fn dead_subject(&self) -> String {
        format!("{}.fetch.dead", self.domain)
    }

    /// Durable consumer shared by every fetch worker of the domain.
    pub fn worker_consumer(&self) -> String {
        format!("{}-fetcher", self.domain)
    }

    /// Durable consumer used by the result monitor.
    pub fn monitor_consumer(&self) -> String {
        format!("{}-results", self.domain)
    }

    /// Durable consumer for dead letters.
    pub fn dead_letter_consumer(&self) -> String {
        format!("{}-dead-letters", self.domain)
    }

    /// Returns the visibility timeout.
    #[inline]
    pub fn ack_wait(&self) -> Duration {
        self.ack_wait
    }

    /// Returns the maximum delivery count.
    #[inline]
    pub fn max_deliver(&self) -> u64 {
        self.max_deliver.unsigned_abs()
    }

    /// Returns the deduplication window.
    #[inline]
    pub fn duplicate_window(&self) -> Duration {
        self.duplicate_window
    }

    /// Declares the stream, creating it when missing.
    #[tracing::instrument(skip(self, jetstream), fields(stream = %self.name()), target = TRACING_TARGET_STREAM)]
    pub(crate) async fn ensure(&self, jetstream: &jetstream::Context) -> Result<stream::Stream> {
        let name = self.name();
        let stream = jetstream
            .get_or_create_stream(self.stream_config())
            .await
            .map_err(|e| Error::stream_error(&name, e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET_STREAM,
            stream = %name,
            max_age_secs = Self::MAX_AGE.as_secs(),
            duplicate_window_secs = self.duplicate_window.as_secs(),
            "Fetch stream ready"
        );
        Ok(stream)
    }

    pub(crate) fn stream_config(&self) -> stream::Config {
        stream::Config {
            name: self.name(),
            description: Some(format!("Fetch work queue for domain {}", self.domain)),
            subjects: vec![self.subjects()],
            retention: stream::RetentionPolicy::WorkQueue,
            storage: stream::StorageType::File,
            max_age: Self::MAX_AGE,
            duplicate_window: self.duplicate_window,
            ..Default::default()
        }
    }

    pub(crate) fn consumer_config(
        &self,
        consumer_name: &str,
        filter_subject: &str,
    ) -> consumer::pull::Config {
        let worker = consumer_name == self.worker_consumer();
        consumer::pull::Config {
            durable_name: Some(consumer_name.to_owned()),
            description: Some(format!("Consumer {} on {}", consumer_name, self.name())),
            ack_policy: consumer::AckPolicy::Explicit,
            ack_wait: self.ack_wait,
            max_deliver: self.max_deliver,
            max_ack_pending: if worker { self.max_ack_pending } else { 1000 },
            filter_subject: filter_subject.to_owned(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_subjects() {
        let stream = FetchStream::new("news").unwrap();
        assert_eq!(stream.name(), "NEWS_FETCH");
        assert_eq!(stream.subjects(), "news.fetch.>");
        assert_eq!(stream.request_subject(), "news.fetch.request");
        assert_eq!(stream.result_subject(), "news.fetch.result");
        assert_eq!(stream.dead_subject(), "news.fetch.dead");
        assert_eq!(stream.worker_consumer(), "news-fetcher");
        assert_eq!(stream.monitor_consumer(), "news-results");
    }

    #[test]
    fn reject_invalid_domains() {
        assert!(FetchStream::new("").is_err());
        assert!(FetchStream::new("News").is_err());
        assert!(FetchStream::new("news.fetch").is_err());
        assert!(FetchStream::new("viral-posts").is_ok());
    }

    #[test]
    fn stream_config_uses_work_queue_retention() {
        let stream = FetchStream::new("video")
            .unwrap()
            .with_duplicate_window(Duration::from_secs(48 * 60 * 60));
        let config = stream.stream_config();

        assert_eq!(config.name, "VIDEO_FETCH");
        assert_eq!(config.retention, stream::RetentionPolicy::WorkQueue);
        assert_eq!(config.storage, stream::StorageType::File);
        assert_eq!(config.max_age, FetchStream::MAX_AGE);
        assert_eq!(config.duplicate_window, FetchStream::MAX_AGE);
    }

    #[test]
    fn worker_consumer_config() {
        let stream = FetchStream::new("news")
            .unwrap()
            .with_max_deliver(3)
            .with_max_ack_pending(5);
        let config = stream.consumer_config(&stream.worker_consumer(), &stream.request_subject());

        assert_eq!(config.durable_name.as_deref(), Some("news-fetcher"));
        assert_eq!(config.ack_policy, consumer::AckPolicy::Explicit);
        assert_eq!(config.ack_wait, Duration::from_secs(30));
        assert_eq!(config.max_deliver, 3);
        assert_eq!(config.max_ack_pending, 5);
        assert_eq!(config.filter_subject, "news.fetch.request");
    }
}
