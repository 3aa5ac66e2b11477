//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! | route | purpose |
//! |---|---|
//! | `GET /{domain}/items` | paginated listing, optionally filtered by scope |
//! | `GET /{domain}/items/lookup` | find by natural key |
//! | `POST /{domain}/fetch/{scope}` | enqueue a manual fetch |
//! | `POST /{domain}/fetch-all` | enqueue a manual fetch per configured scope |
//! | `GET /health` | liveness |
//! | `GET /ready` | store and queue connectivity |
//!
//! ```rust,no_run
//! use pulse_server::handler::routes;
//! use pulse_server::service::{ServiceConfig, ServiceState};
//!
//! # async fn example(config: ServiceConfig) -> anyhow::Result<()> {
//! let (state, _pipeline) = ServiceState::from_config(&config).await?;
//! let app: axum::Router = routes().with_state(state);
//! # Ok(())
//! # }
//! ```
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod error;
mod fetch;
mod items;
mod monitors;
pub mod request;
pub mod response;
mod utils;

use axum::Router;
use axum::response::{IntoResponse, Response};

pub use crate::handler::error::{Error, ErrorKind, Result};
use crate::service::ServiceState;

#[inline]
async fn handler() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns a [`Router`] with every route and a JSON `404` fallback.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .merge(items::routes())
        .merge(fetch::routes())
        .merge(monitors::routes())
        .fallback(handler)
}
