//! Liveness and readiness checks.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::handler::response::{HealthStatus, ReadyStatus};
use crate::service::{HealthCache, ServiceState};

/// Tracing target for monitor operations.
const TRACING_TARGET: &str = "pulse_server::handler::monitors";

/// Reports that the process is serving requests.
async fn health_status() -> Json<HealthStatus> {
    Json(HealthStatus::ok())
}

/// Reports whether the store and the queue are reachable.
#[tracing::instrument(skip_all)]
async fn ready_status(
    State(service_state): State<ServiceState>,
    State(health_cache): State<HealthCache>,
) -> (StatusCode, Json<ReadyStatus>) {
    let report = health_cache.check(&service_state).await;

    let status_code = if report.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    tracing::debug!(
        target: TRACING_TARGET,
        store = report.store,
        queue = report.queue,
        status_code = status_code.as_u16(),
        "Readiness response prepared"
    );

    (status_code, Json(ReadyStatus::from(report)))
}

/// Returns a [`Router`] with the health monitoring routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/health", get(health_status))
        .route("/ready", get(ready_status))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::handler::response::{HealthStatus, ReadyStatus};
    use crate::handler::test::TestContext;

    #[tokio::test]
    async fn health_is_ok() -> anyhow::Result<()> {
        let ctx = TestContext::new()?;
        let response = ctx.server.get("/health").await;
        response.assert_status_ok();

        let health: HealthStatus = response.json();
        assert_eq!(health.status, "ok");
        Ok(())
    }

    #[tokio::test]
    async fn ready_when_dependencies_answer() -> anyhow::Result<()> {
        let ctx = TestContext::new()?;
        let response = ctx.server.get("/ready").await;
        response.assert_status_ok();

        let ready: ReadyStatus = response.json();
        assert_eq!(ready.status, "ready");
        assert!(ready.store && ready.queue);
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_when_queue_is_down() -> anyhow::Result<()> {
        let ctx = TestContext::new()?;
        ctx.queue.set_offline(true);

        let response = ctx.server.get("/ready").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

        let ready: ReadyStatus = response.json();
        assert!(ready.store);
        assert!(!ready.queue);
        Ok(())
    }
}
