//! Periodic and manual enqueueing of fetch requests.

use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use pulse_nats::stream::{FetchRequest, Priority, Scope};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{FetchConfig, TRACING_TARGET_SCHEDULER};
use crate::queue::FetchQueue;
use crate::{Error, Result};

/// Outcome of one scheduler tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Requests newly enqueued.
    pub enqueued: usize,
    /// Requests another scheduler already enqueued this interval.
    pub duplicates: usize,
    /// Scopes whose enqueue failed.
    pub failed: usize,
}

/// Enqueues fetch requests for the configured scopes.
///
/// Any number of instances may run the periodic loop: scheduled request
/// ids are derived from the interval bucket, so the queue keeps one
/// request per scope and interval.
#[derive(Clone)]
pub struct FetchScheduler {
    queue: Arc<dyn FetchQueue>,
    scopes: Arc<[Scope]>,
    interval: Duration,
    max_pages: u32,
}

impl FetchScheduler {
    /// Creates a scheduler for `scopes`.
    pub fn new(
        queue: Arc<dyn FetchQueue>,
        scopes: Vec<Scope>,
        interval: Duration,
        max_pages: u32,
    ) -> Self {
        Self {
            queue,
            scopes: scopes.into(),
            interval,
            max_pages,
        }
    }

    /// Creates a scheduler for every scope in `config`.
    pub fn from_config(queue: Arc<dyn FetchQueue>, config: &FetchConfig) -> Result<Self> {
        Ok(Self::new(
            queue,
            config.scopes()?,
            config.fetch_interval(),
            config.max_pages,
        ))
    }

    /// Returns the configured scopes.
    #[inline]
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Returns whether `scope` is configured.
    pub fn is_configured(&self, scope: &Scope) -> bool {
        self.scopes.contains(scope)
    }

    /// Enqueues one scheduled request per scope for the tick at `now`.
    pub async fn tick(&self, now: Timestamp) -> TickReport {
        let mut report = TickReport::default();

        for scope in self.scopes.iter() {
            let request = FetchRequest::scheduled(scope.clone(), self.max_pages, now, self.interval);
            match self.queue.enqueue(&request).await {
                Ok(receipt) if receipt.duplicate => report.duplicates += 1,
                Ok(_) => report.enqueued += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::error!(
                        target: TRACING_TARGET_SCHEDULER,
                        scope = %scope,
                        request_id = %request.request_id,
                        error = %err,
                        "Failed to enqueue scheduled fetch"
                    );
                }
            }
        }

        tracing::info!(
            target: TRACING_TARGET_SCHEDULER,
            enqueued = report.enqueued,
            duplicates = report.duplicates,
            failed = report.failed,
            "Scheduler tick complete"
        );

        report
    }

    /// Enqueues a manual request for `scope`.
    pub async fn trigger(&self, scope: Scope, priority: Priority) -> Result<FetchRequest> {
        if !self.is_configured(&scope) {
            return Err(Error::config(format!("scope '{scope}' is not configured")));
        }

        let request = FetchRequest::manual(scope, self.max_pages, priority);
        self.queue.enqueue(&request).await?;

        tracing::info!(
            target: TRACING_TARGET_SCHEDULER,
            request_id = %request.request_id,
            scope = %request.scope,
            priority = %priority,
            "Manual fetch queued"
        );

        Ok(request)
    }

    /// Enqueues a manual request for every configured scope.
    ///
    /// Scopes whose enqueue fails are logged and skipped. Fails only when
    /// no request could be queued.
    pub async fn trigger_all(&self, priority: Priority) -> Result<Vec<FetchRequest>> {
        let mut queued = Vec::with_capacity(self.scopes.len());
        let mut last_error = None;

        for scope in self.scopes.iter() {
            match self.trigger(scope.clone(), priority).await {
                Ok(request) => queued.push(request),
                Err(err) => {
                    tracing::error!(
                        target: TRACING_TARGET_SCHEDULER,
                        scope = %scope,
                        error = %err,
                        "Failed to queue manual fetch"
                    );
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) if queued.is_empty() => Err(err),
            _ => Ok(queued),
        }
    }

    /// Ticks every interval, starting immediately, until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        tracing::info!(
            target: TRACING_TARGET_SCHEDULER,
            scopes = self.scopes.len(),
            interval_secs = self.interval.as_secs(),
            "Scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick(Timestamp::now()).await;
                }
            }
        }

        tracing::info!(target: TRACING_TARGET_SCHEDULER, "Scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::queue::MemoryQueue;

    const INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

    fn scopes() -> Vec<Scope> {
        ["de", "in", "us"]
            .iter()
            .map(|r| Scope::region(r).unwrap())
            .collect()
    }

    fn scheduler(queue: Arc<MemoryQueue>) -> FetchScheduler {
        FetchScheduler::new(queue, scopes(), INTERVAL, 4)
    }

    #[tokio::test]
    async fn redundant_ticks_are_deduplicated() {
        let queue = Arc::new(MemoryQueue::new());
        let a = scheduler(queue.clone());
        let b = scheduler(queue.clone());

        let now: Timestamp = "2026-03-01T09:30:00Z".parse().unwrap();
        let later: Timestamp = "2026-03-01T10:45:00Z".parse().unwrap();

        let first = a.tick(now).await;
        let second = b.tick(later).await;

        assert_eq!(first.enqueued, 3);
        assert_eq!(second.duplicates, 3);
        assert_eq!(second.enqueued, 0);

        let ids: Vec<_> = queue.requests().into_iter().map(|r| r.request_id).collect();
        assert_eq!(
            ids,
            ["de-20260301-080000", "in-20260301-080000", "us-20260301-080000"]
        );
    }

    #[tokio::test]
    async fn next_interval_enqueues_again() {
        let queue = Arc::new(MemoryQueue::new());
        let scheduler = scheduler(queue.clone());

        scheduler.tick("2026-03-01T09:30:00Z".parse().unwrap()).await;
        let report = scheduler.tick("2026-03-01T12:00:00Z".parse().unwrap()).await;

        assert_eq!(report.enqueued, 3);
        assert_eq!(queue.requests().len(), 6);
        assert!(queue.requests().iter().all(|r| r.priority == Priority::Normal));
    }

    #[tokio::test]
    async fn failed_scope_does_not_stop_tick() {
        let queue = Arc::new(MemoryQueue::new());
        queue.fail_scope(Scope::region("in").unwrap());
        let scheduler = scheduler(queue.clone());

        let report = scheduler.tick(Timestamp::now()).await;

        assert_eq!(report.enqueued, 2);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn manual_triggers_are_never_deduplicated() {
        let queue = Arc::new(MemoryQueue::new());
        let scheduler = scheduler(queue.clone());
        let us = Scope::region("us").unwrap();

        let a = scheduler.trigger(us.clone(), Priority::High).await.unwrap();
        let b = scheduler.trigger(us, Priority::High).await.unwrap();

        assert_ne!(a.request_id, b.request_id);
        assert!(a.request_id.starts_with("us-manual-"));
        assert_eq!(queue.requests().len(), 2);
        assert_eq!(queue.requests()[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn trigger_rejects_unknown_scope() {
        let queue = Arc::new(MemoryQueue::new());
        let scheduler = scheduler(queue.clone());

        let err = scheduler
            .trigger(Scope::region("fr").unwrap(), Priority::Normal)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(queue.requests().is_empty());
    }

    #[tokio::test]
    async fn trigger_all_covers_every_scope() {
        let queue = Arc::new(MemoryQueue::new());
        let scheduler = scheduler(queue.clone());

        let queued = scheduler.trigger_all(Priority::Low).await.unwrap();

        let scopes: Vec<_> = queued.iter().map(|r| r.scope.to_string()).collect();
        assert_eq!(scopes, ["de", "in", "us"]);
        assert!(queued.iter().all(|r| r.priority == Priority::Low));
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_immediately_until_cancelled() {
        let queue = Arc::new(MemoryQueue::new());
        let scheduler = scheduler(queue.clone());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(scheduler.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(queue.requests().len(), 3);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
