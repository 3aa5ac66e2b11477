//! Manual fetch trigger response types.

use pulse_nats::stream::{FetchRequest, Priority, Scope};
use serde::{Deserialize, Serialize};

/// Status reported for an accepted trigger.
pub const QUEUED: &str = "queued";

/// A request accepted by the queue.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchQueued {
    pub request_id: String,
    pub scope: Scope,
    pub priority: Priority,
    pub status: String,
}

impl From<FetchRequest> for FetchQueued {
    fn from(request: FetchRequest) -> Self {
        Self {
            request_id: request.request_id,
            scope: request.scope,
            priority: request.priority,
            status: QUEUED.to_owned(),
        }
    }
}

/// Requests accepted by a fetch-all trigger.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchAllQueued {
    pub request_ids: Vec<String>,
    pub priority: Priority,
    pub status: String,
}

impl FetchAllQueued {
    pub fn new(requests: Vec<FetchRequest>, priority: Priority) -> Self {
        Self {
            request_ids: requests.into_iter().map(|r| r.request_id).collect(),
            priority,
            status: QUEUED.to_owned(),
        }
    }
}
