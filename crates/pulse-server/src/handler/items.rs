//! Paginated item reads.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::extract::{Path, Query};
use crate::handler::request::{DomainPathParams, ListItems, LookupItem};
use crate::handler::response::{Item, Items};
use crate::handler::utils::ensure_domain;
use crate::handler::{ErrorKind, Result};
use crate::service::{ContentDomain, ServiceState};
use crate::store::ContentStore;

/// Tracing target for item reads.
const TRACING_TARGET: &str = "pulse_server::handler::items";

/// Lists stored items newest first.
#[tracing::instrument(skip_all)]
async fn list_items(
    State(domain): State<ContentDomain>,
    State(store): State<Arc<dyn ContentStore>>,
    Path(path): Path<DomainPathParams>,
    Query(params): Query<ListItems>,
) -> Result<Json<Items>> {
    ensure_domain(&domain, &path.domain)?;

    let filter = params.filter()?;
    let pagination = params.pagination();
    let page = store.list(domain.as_str(), filter, pagination).await?;

    tracing::debug!(
        target: TRACING_TARGET,
        returned = page.items.len(),
        total = page.total,
        page = params.page(),
        "Listed items"
    );

    Ok(Json(Items {
        total: page.total.unwrap_or_default(),
        items: page.items.into_iter().map(Item::from).collect(),
        page: params.page(),
        limit: params.limit(),
    }))
}

/// Finds an item by its natural key.
#[tracing::instrument(skip_all)]
async fn lookup_item(
    State(domain): State<ContentDomain>,
    State(store): State<Arc<dyn ContentStore>>,
    Path(path): Path<DomainPathParams>,
    Query(params): Query<LookupItem>,
) -> Result<Json<Item>> {
    ensure_domain(&domain, &path.domain)?;

    let record = store
        .find_by_key(domain.as_str(), &params.key)
        .await?
        .ok_or_else(|| {
            ErrorKind::NotFound
                .with_message("No item with this key")
                .with_resource("item")
        })?;

    Ok(Json(Item::from(record)))
}

/// Returns a [`Router`] with the item read routes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/{domain}/items", get(list_items))
        .route("/{domain}/items/lookup", get(lookup_item))
}
