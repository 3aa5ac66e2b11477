//! Liveness and readiness response types.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::service::HealthReport;

/// Liveness of the process.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: Timestamp,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_owned(),
            timestamp: Timestamp::now(),
        }
    }
}

/// Connectivity of the store and the queue.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyStatus {
    pub status: String,
    pub store: bool,
    pub queue: bool,
    pub timestamp: Timestamp,
}

impl From<HealthReport> for ReadyStatus {
    fn from(report: HealthReport) -> Self {
        let status = if report.is_ready() { "ready" } else { "unavailable" };
        Self {
            status: status.to_owned(),
            store: report.store,
            queue: report.queue,
            timestamp: Timestamp::now(),
        }
    }
}
