//! Fetch request processing: pages, cap, upsert, result.

use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use pulse_nats::stream::{FetchRequest, FetchResult, Scope};
use pulse_postgres::model::NewContentRecord;
use uuid::Uuid;

use super::{FetchConfig, TRACING_TARGET_FETCH};
use crate::source::{ContentItem, ContentSource, PageRequest, StrategyMap};
use crate::store::{self, ContentStore};

/// Turns a [`FetchRequest`] into stored records and a [`FetchResult`].
///
/// Processing never returns an error: every failure is reported through a
/// failed result so the caller can decide between Ack, Nak and dead-letter.
pub struct FetchCoordinator {
    domain: String,
    strategies: StrategyMap,
    store: Arc<dyn ContentStore>,
    rate_limit: Duration,
    max_items: usize,
    store_timeout: Duration,
}

/// Items aggregated across the pages of one request.
#[derive(Debug, Default)]
struct Aggregate {
    items: Vec<ContentItem>,
    pages_fetched: u32,
    pages_failed: u32,
}

impl FetchCoordinator {
    /// Creates a coordinator for the domain named in `config`.
    pub fn new(
        config: &FetchConfig,
        strategies: StrategyMap,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            domain: config.content_domain.clone(),
            strategies,
            store,
            rate_limit: config.rate_limit(),
            max_items: config.max_items,
            store_timeout: config.store_timeout(),
        }
    }

    /// Returns the scope to source mapping.
    #[inline]
    pub fn strategies(&self) -> &StrategyMap {
        &self.strategies
    }

    /// Processes one delivery attempt of `request`.
    #[tracing::instrument(
        skip_all,
        target = TRACING_TARGET_FETCH,
        fields(request_id = %request.request_id, scope = %request.scope, attempt)
    )]
    pub async fn process(&self, request: &FetchRequest, attempt: u64) -> FetchResult {
        let Some(source) = self.strategies.resolve(&request.scope) else {
            tracing::warn!(
                target: TRACING_TARGET_FETCH,
                "No source configured for scope"
            );
            return FetchResult::failure(
                request,
                attempt,
                0,
                format!("scope '{}' is not configured", request.scope),
            );
        };

        let aggregate = self
            .fetch_pages(source.as_ref(), &request.scope, request.max_pages)
            .await;
        let fetched = aggregate.items.len();

        tracing::debug!(
            target: TRACING_TARGET_FETCH,
            source = source.name(),
            pages_fetched = aggregate.pages_fetched,
            pages_failed = aggregate.pages_failed,
            fetched,
            "Finished fetching pages"
        );

        if aggregate.items.is_empty() {
            return FetchResult::failure(request, attempt, 0, "no items fetched");
        }

        let records = self.to_records(&request.scope, aggregate.items);
        let (mut records, dropped) = store::prepare_batch(records);
        if records.is_empty() {
            return FetchResult::failure(
                request,
                attempt,
                fetched,
                format!("no valid items ({dropped} dropped)"),
            );
        }
        records.truncate(request.max_items.unwrap_or(self.max_items).max(1));

        let upsert = tokio::time::timeout(self.store_timeout, self.store.upsert_many(records));
        let summary = match upsert.await {
            Ok(Ok(summary)) => summary,
            Ok(Err(err)) => {
                tracing::error!(
                    target: TRACING_TARGET_FETCH,
                    error = %err,
                    "Store upsert failed"
                );
                return FetchResult::failure(
                    request,
                    attempt,
                    fetched,
                    format!("store upsert failed: {err}"),
                );
            }
            Err(_) => {
                tracing::error!(
                    target: TRACING_TARGET_FETCH,
                    timeout_secs = self.store_timeout.as_secs(),
                    "Store upsert timed out"
                );
                return FetchResult::failure(
                    request,
                    attempt,
                    fetched,
                    format!(
                        "store upsert timed out after {}s",
                        self.store_timeout.as_secs()
                    ),
                );
            }
        };

        if summary.stored() == 0 {
            return FetchResult::failure(
                request,
                attempt,
                fetched,
                format!("store rejected all {} records", summary.failed),
            );
        }

        tracing::info!(
            target: TRACING_TARGET_FETCH,
            fetched,
            inserted = summary.inserted,
            updated = summary.updated,
            failed = summary.failed,
            dropped,
            "Stored fetched items"
        );

        FetchResult::success(request, attempt, fetched, summary.stored())
    }

    /// Fetches up to `max_pages` pages in order.
    ///
    /// A failed page is skipped and the next page reuses the last good
    /// continuation token.
    async fn fetch_pages(
        &self,
        source: &dyn ContentSource,
        scope: &Scope,
        max_pages: u32,
    ) -> Aggregate {
        let mut aggregate = Aggregate::default();
        let mut page = PageRequest::first();

        for number in 1..=max_pages.max(1) {
            if number > 1 && !self.rate_limit.is_zero() {
                tokio::time::sleep(self.rate_limit).await;
            }
            page.number = number;

            match source.fetch_page(scope, &page).await {
                Ok(result) => {
                    aggregate.pages_fetched += 1;
                    aggregate.items.extend(result.items);
                    if !result.has_more {
                        break;
                    }
                    page.token = result.next_token;
                }
                Err(err) => {
                    aggregate.pages_failed += 1;
                    tracing::warn!(
                        target: TRACING_TARGET_FETCH,
                        source = source.name(),
                        page = number,
                        error = %err,
                        "Skipping failed page"
                    );
                }
            }
        }

        aggregate
    }

    fn to_records(&self, scope: &Scope, items: Vec<ContentItem>) -> Vec<NewContentRecord> {
        let fetched_at = Timestamp::now();
        let scope_key = scope.to_string();

        items
            .into_iter()
            .map(|item| NewContentRecord {
                id: Uuid::now_v7(),
                domain: self.domain.clone(),
                natural_key: item.natural_key,
                scope: scope_key.clone(),
                region: scope.region_code().to_owned(),
                category: scope.category().map(str::to_owned),
                title: item.title,
                description: item.description,
                content_url: item.content_url,
                image_url: item.image_url,
                author: item.author,
                source_name: item.source_name,
                engagement_score: item.engagement_score,
                published_at: item.published_at.into(),
                fetched_at: fetched_at.into(),
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use jiff::Timestamp;
    use pulse_nats::stream::Scope;
    use tokio::time::Instant;

    use crate::source::{
        ContentItem, ContentSource, PageRequest, SourceError, SourcePage, SourceResult,
    };

    /// Builds an item keyed `https://example.com/{key}`.
    pub fn item(key: &str) -> ContentItem {
        ContentItem {
            natural_key: format!("https://example.com/{key}"),
            title: format!("Item {key}"),
            description: String::new(),
            content_url: format!("https://example.com/{key}"),
            image_url: None,
            author: None,
            source_name: Some("Example".to_owned()),
            engagement_score: None,
            published_at: Timestamp::now(),
        }
    }

    /// Builds a page of `count` items keyed `{prefix}-{n}`.
    pub fn page(prefix: &str, count: usize, has_more: bool) -> SourcePage {
        SourcePage {
            items: (0..count).map(|n| item(&format!("{prefix}-{n}"))).collect(),
            next_token: has_more.then(|| format!("after-{prefix}")),
            has_more,
        }
    }

    /// Source replaying scripted pages and recording every call.
    #[derive(Default)]
    pub struct ScriptedSource {
        pages: Mutex<VecDeque<Option<SourcePage>>>,
        calls: Mutex<Vec<(PageRequest, Instant)>>,
        count: AtomicUsize,
    }

    impl ScriptedSource {
        /// Pages are returned in order; `None` fails that page.
        pub fn new(pages: impl IntoIterator<Item = Option<SourcePage>>) -> Self {
            Self {
                pages: Mutex::new(pages.into_iter().collect()),
                ..Self::default()
            }
        }

        /// A source that always returns an empty final page.
        pub fn empty() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<(PageRequest, Instant)> {
            self.calls.lock().expect("calls lock").clone()
        }

        pub fn call_count(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ContentSource for ScriptedSource {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_page(&self, scope: &Scope, page: &PageRequest) -> SourceResult<SourcePage> {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.calls
                .lock()
                .expect("calls lock")
                .push((page.clone(), Instant::now()));

            match self.pages.lock().expect("pages lock").pop_front() {
                Some(Some(page)) => Ok(page),
                Some(None) => Err(SourceError::Status {
                    status: 503,
                    url: format!("https://example.com/{scope}"),
                }),
                None => Ok(SourcePage::default()),
            }
        }
    }
}
