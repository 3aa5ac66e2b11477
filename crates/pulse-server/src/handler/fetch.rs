//! Manual fetch triggers.
//!
//! Both routes return as soon as the queue accepts the request; the fetch
//! itself runs on a worker.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use pulse_nats::stream::Scope;

use crate::extract::{Path, Query};
use crate::handler::request::{DomainPathParams, ScopePathParams, TriggerFetch};
use crate::handler::response::{FetchAllQueued, FetchQueued};
use crate::handler::utils::ensure_domain;
use crate::handler::{ErrorKind, Result};
use crate::pipeline::FetchScheduler;
use crate::service::{ContentDomain, ServiceState};

/// Tracing target for manual triggers.
const TRACING_TARGET: &str = "pulse_server::handler::fetch";

/// Enqueues a manual fetch for one scope.
#[tracing::instrument(skip_all)]
async fn trigger_fetch(
    State(domain): State<ContentDomain>,
    State(scheduler): State<FetchScheduler>,
    Path(path): Path<ScopePathParams>,
    Query(params): Query<TriggerFetch>,
) -> Result<(StatusCode, Json<FetchQueued>)> {
    ensure_domain(&domain, &path.domain)?;

    let scope = path.scope.parse::<Scope>().map_err(|e| {
        ErrorKind::BadRequest
            .with_message("Invalid scope")
            .with_resource("scope")
            .with_context(e.to_string())
    })?;

    let request = scheduler.trigger(scope, params.priority()).await?;

    tracing::info!(
        target: TRACING_TARGET,
        request_id = %request.request_id,
        scope = %request.scope,
        "Manual fetch accepted"
    );

    Ok((StatusCode::ACCEPTED, Json(FetchQueued::from(request))))
}

/// Enqueues a manual fetch for every configured scope.
#[tracing::instrument(skip_all)]
async fn trigger_fetch_all(
    State(domain): State<ContentDomain>,
    State(scheduler): State<FetchScheduler>,
    Path(path): Path<DomainPathParams>,
    Query(params): Query<TriggerFetch>,
) -> Result<(StatusCode, Json<FetchAllQueued>)> {
    ensure_domain(&domain, &path.domain)?;

    let priority = params.priority();
    let requests = scheduler.trigger_all(priority).await?;

    tracing::info!(
        target: TRACING_TARGET,
        queued = requests.len(),
        configured = scheduler.scopes().len(),
        "Manual fetch-all accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(FetchAllQueued::new(requests, priority)),
    ))
}

/// Returns a [`Router`] with the manual trigger routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/{domain}/fetch/{scope}", post(trigger_fetch))
        .route("/{domain}/fetch-all", post(trigger_fetch_all))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use pulse_nats::stream::{Priority, Scope};

    use crate::handler::response::{FetchAllQueued, FetchQueued};
    use crate::handler::test::TestContext;

    #[tokio::test]
    async fn trigger_queues_request() -> anyhow::Result<()> {
        let ctx = TestContext::new()?;

        let response = ctx
            .server
            .post("/news/fetch/us")
            .add_query_param("priority", "low")
            .await;
        response.assert_status(StatusCode::ACCEPTED);

        let queued: FetchQueued = response.json();
        assert_eq!(queued.scope, Scope::region("us")?);
        assert_eq!(queued.priority, Priority::Low);
        assert_eq!(queued.status, "queued");

        let requests = ctx.queue.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].request_id, queued.request_id);
        Ok(())
    }

    #[tokio::test]
    async fn priority_defaults_to_high() -> anyhow::Result<()> {
        let ctx = TestContext::new()?;
        let queued: FetchQueued = ctx.server.post("/news/fetch/de").await.json();
        assert_eq!(queued.priority, Priority::High);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_priority_is_bad_request() -> anyhow::Result<()> {
        let ctx = TestContext::new()?;
        ctx.server
            .post("/news/fetch/us")
            .add_query_param("priority", "urgent")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        assert!(ctx.queue.requests().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unconfigured_scope_is_bad_request() -> anyhow::Result<()> {
        let ctx = TestContext::new()?;
        let response = ctx.server.post("/news/fetch/fr").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(ctx.queue.requests().is_empty());

        ctx.server
            .post("/news/fetch/u!s")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn other_domain_is_not_found() -> anyhow::Result<()> {
        let ctx = TestContext::new()?;
        ctx.server
            .post("/viral/fetch/us")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn queue_outage_is_unavailable() -> anyhow::Result<()> {
        let ctx = TestContext::new()?;
        ctx.queue.fail_scope(Scope::region("us")?);
        ctx.server
            .post("/news/fetch/us")
            .await
            .assert_status(StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }

    #[tokio::test]
    async fn fetch_all_queues_every_scope() -> anyhow::Result<()> {
        let ctx = TestContext::new()?;

        let response = ctx.server.post("/news/fetch-all").await;
        response.assert_status(StatusCode::ACCEPTED);

        let queued: FetchAllQueued = response.json();
        assert_eq!(queued.request_ids.len(), ctx.queue.requests().len());
        assert_eq!(queued.request_ids.len(), 2);
        assert_eq!(queued.status, "queued");
        Ok(())
    }
}
