//! Pipeline state shared by the background tasks.

use std::sync::Arc;

use pulse_nats::NatsClient;
use pulse_nats::stream::FetchStream;

use super::{FetchConfig, FetchScheduler, FetchWorker};

/// Everything [`WorkerHandles::spawn`](super::WorkerHandles::spawn) needs.
#[derive(Clone)]
pub struct PipelineState {
    /// NATS client used to bind the pull consumers.
    pub nats: NatsClient,
    /// The domain's stream declaration.
    pub stream: FetchStream,
    /// Shared delivery handler.
    pub worker: Arc<FetchWorker>,
    /// Periodic scheduler; also backs the manual triggers.
    pub scheduler: FetchScheduler,
    /// Pipeline configuration.
    pub config: FetchConfig,
}
