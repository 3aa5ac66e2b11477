//! Manual fetch trigger request types.

use pulse_nats::stream::Priority;
use serde::{Deserialize, Serialize};

/// Query parameters for the manual triggers.
///
/// An unknown priority is rejected by the extractor.
#[must_use]
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct TriggerFetch {
    /// Advisory priority, `high` when omitted.
    pub priority: Option<Priority>,
}

impl TriggerFetch {
    /// Returns the requested priority.
    pub fn priority(&self) -> Priority {
        self.priority.unwrap_or(Priority::High)
    }
}
