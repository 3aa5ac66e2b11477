//! Fetch pipeline configuration.

use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use pulse_nats::stream::{FetchStream, Scope};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::{Error, Result};

/// Default items kept per request after aggregation.
pub const DEFAULT_MAX_ITEMS: usize = 33;

const DEFAULT_DOMAIN: &str = "news";
const DEFAULT_REGIONS: &[&str] = &["us", "in", "de"];
const DEFAULT_RATE_LIMIT_SECS: u64 = 2;
const DEFAULT_FETCH_INTERVAL_SECS: u64 = 4 * 60 * 60;
const DEFAULT_MAX_PAGES: u32 = 4;
const DEFAULT_WORKER_COUNT: usize = 3;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;

const MAX_PAGES: u32 = 50;
const MAX_WORKERS: usize = 64;
const MIN_FETCH_INTERVAL_SECS: u64 = 60;

/// Scheduling, pagination and delivery settings for one content domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct FetchConfig {
    /// Content domain served by this instance (news, video, viral, memes)
    #[cfg_attr(
        feature = "config",
        arg(long = "content-domain", env = "CONTENT_DOMAIN", default_value = DEFAULT_DOMAIN)
    )]
    pub content_domain: String,

    /// Regions to fetch, comma-separated
    #[cfg_attr(
        feature = "config",
        arg(
            long = "fetch-regions",
            env = "FETCH_REGIONS",
            value_delimiter = ',',
            default_value = "us,in,de"
        )
    )]
    pub fetch_regions: Vec<String>,

    /// Categories fetched in every region, comma-separated (optional)
    #[cfg_attr(
        feature = "config",
        arg(long = "fetch-categories", env = "FETCH_CATEGORIES", value_delimiter = ',')
    )]
    #[serde(default)]
    pub fetch_categories: Vec<String>,

    /// Seconds to wait between upstream pages
    #[cfg_attr(
        feature = "config",
        arg(long = "rate-limit-secs", env = "RATE_LIMIT_SECS", default_value_t = DEFAULT_RATE_LIMIT_SECS)
    )]
    pub rate_limit_secs: u64,

    /// Seconds between scheduler ticks
    #[cfg_attr(
        feature = "config",
        arg(long = "fetch-interval-secs", env = "FETCH_INTERVAL_SECS", default_value_t = DEFAULT_FETCH_INTERVAL_SECS)
    )]
    pub fetch_interval_secs: u64,

    /// Upstream pages fetched per request (1-50)
    #[cfg_attr(
        feature = "config",
        arg(long = "max-pages", env = "MAX_PAGES", default_value_t = DEFAULT_MAX_PAGES)
    )]
    pub max_pages: u32,

    /// Items kept per request after aggregation
    #[cfg_attr(
        feature = "config",
        arg(long = "max-items", env = "MAX_ITEMS", default_value_t = DEFAULT_MAX_ITEMS)
    )]
    pub max_items: usize,

    /// Number of concurrent pull loops (1-64)
    #[cfg_attr(
        feature = "config",
        arg(long = "worker-count", env = "WORKER_COUNT", default_value_t = DEFAULT_WORKER_COUNT)
    )]
    pub worker_count: usize,

    /// Requests processed at once across all loops (defaults to the worker count)
    #[cfg_attr(feature = "config", arg(long = "max-in-flight", env = "MAX_IN_FLIGHT"))]
    #[serde(default)]
    pub max_in_flight: Option<usize>,

    /// Delivery attempts per request before it is dead-lettered
    #[cfg_attr(
        feature = "config",
        arg(long = "max-retries", env = "MAX_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)
    )]
    pub max_retries: u32,

    /// Seconds before a failed or unacknowledged request is redelivered
    #[cfg_attr(
        feature = "config",
        arg(long = "retry-delay-secs", env = "RETRY_DELAY_SECS", default_value_t = DEFAULT_RETRY_DELAY_SECS)
    )]
    pub retry_delay_secs: u64,

    /// Upper bound on processing a single request, in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "request-timeout-secs", env = "REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)
    )]
    pub request_timeout_secs: u64,

    /// Upper bound on a single store upsert, in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "store-timeout-secs", env = "STORE_TIMEOUT_SECS", default_value_t = DEFAULT_STORE_TIMEOUT_SECS)
    )]
    pub store_timeout_secs: u64,

    /// Whether this instance runs the periodic scheduler
    #[cfg_attr(
        feature = "config",
        arg(
            long = "scheduler-enabled",
            env = "SCHEDULER_ENABLED",
            default_value_t = true,
            action = clap::ArgAction::Set
        )
    )]
    pub scheduler_enabled: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            content_domain: DEFAULT_DOMAIN.to_owned(),
            fetch_regions: DEFAULT_REGIONS.iter().map(|r| (*r).to_owned()).collect(),
            fetch_categories: Vec::new(),
            rate_limit_secs: DEFAULT_RATE_LIMIT_SECS,
            fetch_interval_secs: DEFAULT_FETCH_INTERVAL_SECS,
            max_pages: DEFAULT_MAX_PAGES,
            max_items: DEFAULT_MAX_ITEMS,
            worker_count: DEFAULT_WORKER_COUNT,
            max_in_flight: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            store_timeout_secs: DEFAULT_STORE_TIMEOUT_SECS,
            scheduler_enabled: true,
        }
    }
}

impl FetchConfig {
    /// Creates a configuration for `domain` with default settings.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            content_domain: domain.into(),
            ..Self::default()
        }
    }

    /// Sets the regions.
    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch_regions = regions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the categories.
    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the delay between pages.
    pub fn with_rate_limit_secs(mut self, secs: u64) -> Self {
        self.rate_limit_secs = secs;
        self
    }

    /// Sets the number of pages per request.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Sets the item cap.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Sets the number of pull loops.
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Sets the delivery attempt limit.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the redelivery delay, which is also the consumer's ack wait.
    pub fn with_retry_delay_secs(mut self, secs: u64) -> Self {
        self.retry_delay_secs = secs;
        self
    }

    /// Enables or disables the scheduler.
    pub fn with_scheduler_enabled(mut self, enabled: bool) -> Self {
        self.scheduler_enabled = enabled;
        self
    }

    #[inline]
    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs(self.rate_limit_secs)
    }

    #[inline]
    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    #[inline]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    #[inline]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[inline]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Returns the in-flight request limit.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.unwrap_or(self.worker_count).max(1)
    }

    /// Creates the semaphore bounding in-flight requests.
    pub fn create_semaphore(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(self.max_in_flight()))
    }

    /// Returns every configured scope (regions × categories, or regions only).
    pub fn scopes(&self) -> Result<Vec<Scope>> {
        let regions = non_blank(&self.fetch_regions);
        let categories = non_blank(&self.fetch_categories);

        Scope::cartesian(&regions, &categories).map_err(|e| {
            Error::config(format!("invalid fetch scope: {e}")).with_source(e)
        })
    }

    /// Returns the stream declaration for this domain.
    ///
    /// The dedupe window matches the fetch interval so each scheduled tick
    /// is enqueued once however many schedulers run.
    pub fn fetch_stream(&self) -> Result<FetchStream> {
        let stream = FetchStream::new(self.content_domain.clone())?
            .with_duplicate_window(self.fetch_interval())
            .with_ack_wait(self.retry_delay())
            .with_max_deliver(self.max_retries)
            .with_max_ack_pending(self.max_in_flight());
        Ok(stream)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.scopes()?.is_empty() {
            return Err(Error::config("FETCH_REGIONS must name at least one region"));
        }

        if !(1..=MAX_PAGES).contains(&self.max_pages) {
            return Err(Error::config(format!(
                "max_pages {} is invalid. Must be between 1 and {MAX_PAGES}.",
                self.max_pages
            )));
        }

        if self.max_items == 0 {
            return Err(Error::config("max_items must be at least 1"));
        }

        if !(1..=MAX_WORKERS).contains(&self.worker_count) {
            return Err(Error::config(format!(
                "worker_count {} is invalid. Must be between 1 and {MAX_WORKERS}.",
                self.worker_count
            )));
        }

        if self.max_in_flight == Some(0) {
            return Err(Error::config("max_in_flight must be at least 1"));
        }

        if self.max_retries == 0 {
            return Err(Error::config("max_retries must be at least 1"));
        }

        if self.fetch_interval_secs < MIN_FETCH_INTERVAL_SECS {
            return Err(Error::config(format!(
                "fetch_interval_secs must be at least {MIN_FETCH_INTERVAL_SECS}"
            )));
        }

        if self.retry_delay_secs == 0 {
            return Err(Error::config("retry_delay_secs must be at least 1"));
        }

        if self.request_timeout_secs == 0 || self.store_timeout_secs == 0 {
            return Err(Error::config("request and store timeouts must be at least 1 second"));
        }

        if self.store_timeout_secs >= self.request_timeout_secs {
            return Err(Error::config(
                "store_timeout_secs must be shorter than request_timeout_secs",
            ));
        }

        self.fetch_stream()?;
        Ok(())
    }
}

fn non_blank(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .collect()
}
