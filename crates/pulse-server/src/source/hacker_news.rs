//! HackerNews Firebase API adapter.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use jiff::Timestamp;
use pulse_nats::stream::Scope;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::http::{get_json, non_empty, parse_base_url};
use super::{
    ContentItem, ContentSource, PageRequest, SourceError, SourcePage, SourceResult, TRACING_TARGET,
    engagement_score,
};

/// Story lists exposed by the API, used as scope regions.
const STORY_LISTS: &[&str] = &["top", "best", "new"];

/// Item lookups kept in flight at once.
const ITEM_CONCURRENCY: usize = 5;

/// Fetches `{list}stories.json` and then each item of the requested slice.
///
/// The scope region selects the list (`top`, `best` or `new`). Page `n`
/// covers ids `(n - 1) * page_size .. n * page_size` of the list.
#[derive(Debug, Clone)]
pub struct HackerNewsSource {
    client: Client,
    base_url: Url,
    page_size: usize,
}

impl HackerNewsSource {
    /// Public HackerNews endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://hacker-news.firebaseio.com/v0/";

    /// Stories resolved per page.
    pub const DEFAULT_PAGE_SIZE: usize = 20;

    /// Creates the adapter.
    pub fn new(client: Client, base_url: &str) -> SourceResult<Self> {
        let mut base_url = parse_base_url(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            page_size: Self::DEFAULT_PAGE_SIZE,
        })
    }

    fn join(&self, path: &str) -> SourceResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| SourceError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn fetch_item(&self, id: u64) -> SourceResult<Item> {
        let url = self.join(&format!("item/{id}.json"))?;
        get_json(self.client.get(url)).await
    }
}

#[async_trait]
impl ContentSource for HackerNewsSource {
    fn name(&self) -> &'static str {
        "hacker-news"
    }

    async fn fetch_page(&self, scope: &Scope, page: &PageRequest) -> SourceResult<SourcePage> {
        let list = scope.region_code();
        if !STORY_LISTS.contains(&list) {
            return Err(SourceError::unsupported_scope(
                scope,
                format!("expected one of {}", STORY_LISTS.join(", ")),
            ));
        }

        let ids: Vec<u64> = get_json(self.client.get(self.join(&format!("{list}stories.json"))?))
            .await?;
        let (slice, has_more) = page_slice(&ids, page.number, self.page_size);

        let items = stream::iter(slice.iter().copied())
            .map(|id| async move { (id, self.fetch_item(id).await) })
            .buffered(ITEM_CONCURRENCY)
            .filter_map(|(id, result)| async move {
                match result {
                    Ok(item) => map_item(item),
                    Err(err) => {
                        tracing::warn!(
                            target: TRACING_TARGET,
                            item_id = id,
                            error = %err,
                            "Skipping unreadable HackerNews item"
                        );
                        None
                    }
                }
            })
            .collect::<Vec<_>>()
            .await;

        Ok(SourcePage {
            items,
            next_token: None,
            has_more,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Item {
    id: u64,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    url: Option<String>,
    by: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    descendants: i64,
    time: Option<i64>,
    #[serde(default)]
    dead: bool,
    #[serde(default)]
    deleted: bool,
}

/// Returns the ids for page `number` and whether more remain after it.
fn page_slice(ids: &[u64], number: u32, page_size: usize) -> (&[u64], bool) {
    let start = (number.max(1) as usize - 1).saturating_mul(page_size);
    if start >= ids.len() {
        return (&[], false);
    }
    let end = (start + page_size).min(ids.len());
    (&ids[start..end], end < ids.len())
}

fn map_item(item: Item) -> Option<ContentItem> {
    if item.dead || item.deleted || item.kind.as_deref() != Some("story") {
        return None;
    }

    // Ask HN and similar text posts have no outbound link.
    let url = non_empty(item.url)?;
    let title = non_empty(item.title)?;

    Some(ContentItem {
        natural_key: format!("hn_{}", item.id),
        title,
        description: format!("{} points, {} comments", item.score, item.descendants),
        content_url: url,
        image_url: None,
        author: non_empty(item.by),
        source_name: Some("Hacker News".to_owned()),
        engagement_score: Some(engagement_score(item.score, item.descendants)),
        published_at: item
            .time
            .and_then(|secs| Timestamp::from_second(secs).ok())
            .unwrap_or_else(Timestamp::now),
    })
}
