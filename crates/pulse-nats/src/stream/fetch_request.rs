//! Fetch request payload carried on the work queue.

use std::time::Duration;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::scope::Scope;

/// Priority hint attached to a fetch request.
///
/// Advisory only: the queue delivers requests in arrival order regardless
/// of priority. It is carried through to results and logs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Priority {
    /// Processed when nothing else is waiting.
    Low,
    /// Default for scheduled fetches.
    #[default]
    Normal,
    /// Requested explicitly by an operator.
    High,
}

/// A unit of fetch work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Correlates the request with its eventual result. Also used as the
    /// JetStream message id, so equal ids within the duplicate window are
    /// enqueued once.
    pub request_id: String,
    /// What to fetch.
    pub scope: Scope,
    /// Upper bound on upstream pages fetched for this request.
    pub max_pages: u32,
    /// Overrides the worker's configured item cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    /// Advisory priority hint.
    #[serde(default)]
    pub priority: Priority,
    /// When the request was created.
    pub requested_at: Timestamp,
}

impl FetchRequest {
    /// Creates a request with an explicit identifier.
    pub fn new(request_id: impl Into<String>, scope: Scope, max_pages: u32) -> Self {
        Self {
            request_id: request_id.into(),
            scope,
            max_pages,
            max_items: None,
            priority: Priority::default(),
            requested_at: Timestamp::now(),
        }
    }

    /// Creates a scheduled request for the tick at `now`.
    ///
    /// The identifier is `{scope}-{YYYYMMDD-HHMMSS}` where the timestamp is
    /// `now` floored to a multiple of `interval`. Every scheduler instance
    /// ticking within the same interval produces the same identifier.
    pub fn scheduled(scope: Scope, max_pages: u32, now: Timestamp, interval: Duration) -> Self {
        let bucket = interval_bucket(now, interval);
        let request_id = format!("{}-{}", scope, bucket.strftime("%Y%m%d-%H%M%S"));
        Self::new(request_id, scope, max_pages)
    }

    /// Creates a manually triggered request with a unique identifier.
    pub fn manual(scope: Scope, max_pages: u32, priority: Priority) -> Self {
        let request_id = format!("{}-manual-{}", scope, Uuid::now_v7().simple());
        Self::new(request_id, scope, max_pages).with_priority(priority)
    }

    /// Sets the priority hint.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets a per-request item cap.
    #[must_use]
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }
}

/// Floors `now` to a multiple of `interval` since the Unix epoch.
fn interval_bucket(now: Timestamp, interval: Duration) -> Timestamp {
    let step = i64::try_from(interval.as_secs()).unwrap_or(i64::MAX).max(1);
    let seconds = now.as_second();
    Timestamp::from_second(seconds - seconds.rem_euclid(step)).unwrap_or(now)
}
