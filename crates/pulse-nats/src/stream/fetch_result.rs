//! Result notifications and dead letters.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::fetch_request::{FetchRequest, Priority};
use super::scope::Scope;

/// Outcome of processing one delivery of a [`FetchRequest`].
///
/// Published best-effort for monitoring; never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    /// Identifier of the originating request.
    pub request_id: String,
    /// Scope echoed from the request.
    pub scope: Scope,
    /// Priority echoed from the request.
    #[serde(default)]
    pub priority: Priority,
    /// Whether the request produced stored items.
    pub success: bool,
    /// Rows inserted or updated in the store.
    pub item_count: usize,
    /// Items aggregated from the upstream before capping.
    #[serde(default)]
    pub fetched_items: usize,
    /// Human-readable failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Delivery attempt that produced this result (1-based).
    #[serde(default)]
    pub attempt: u64,
    /// When processing finished.
    pub completed_at: Timestamp,
}

impl FetchResult {
    /// Creates a successful result.
    pub fn success(
        request: &FetchRequest,
        attempt: u64,
        fetched_items: usize,
        item_count: usize,
    ) -> Self {
        Self {
            request_id: request.request_id.clone(),
            scope: request.scope.clone(),
            priority: request.priority,
            success: true,
            item_count,
            fetched_items,
            error: None,
            attempt,
            completed_at: Timestamp::now(),
        }
    }

    /// Creates a failed result.
    pub fn failure(
        request: &FetchRequest,
        attempt: u64,
        fetched_items: usize,
        error: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request.request_id.clone(),
            scope: request.scope.clone(),
            priority: request.priority,
            success: false,
            item_count: 0,
            fetched_items,
            error: Some(error.into()),
            attempt,
            completed_at: Timestamp::now(),
        }
    }
}

/// A request that exhausted its delivery attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// The request as last delivered.
    pub request: FetchRequest,
    /// Number of delivery attempts made.
    pub attempts: u64,
    /// Error from the final attempt.
    pub last_error: String,
    /// When the request was given up on.
    pub dead_at: Timestamp,
}

impl DeadLetter {
    /// Creates a dead letter for `request`.
    pub fn new(request: FetchRequest, attempts: u64, last_error: impl Into<String>) -> Self {
        Self {
            request,
            attempts,
            last_error: last_error.into(),
            dead_at: Timestamp::now(),
        }
    }
}
