//! NewsAPI top-headlines adapter.

use async_trait::async_trait;
use jiff::Timestamp;
use pulse_nats::stream::Scope;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::http::{get_json, non_empty, parse_base_url};
use super::{ContentItem, ContentSource, PageRequest, SourcePage, SourceResult};

/// Fetches `top-headlines` for a country, optionally narrowed to a category.
///
/// The scope region is the two-letter country code and the scope category,
/// when present, is passed as the NewsAPI `category` parameter. Pagination
/// uses page numbers; there is no continuation token.
#[derive(Debug, Clone)]
pub struct NewsApiSource {
    client: Client,
    base_url: Url,
    api_key: String,
    page_size: u32,
}

impl NewsApiSource {
    /// Public NewsAPI endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://newsapi.org/v2/top-headlines";

    /// Articles requested per page.
    pub const DEFAULT_PAGE_SIZE: u32 = 20;

    /// Creates the adapter.
    pub fn new(client: Client, base_url: &str, api_key: impl Into<String>) -> SourceResult<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            api_key: api_key.into(),
            page_size: Self::DEFAULT_PAGE_SIZE,
        })
    }

    fn page_url(&self, scope: &Scope, page: &PageRequest) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("country", scope.region_code());
            if let Some(category) = scope.category() {
                query.append_pair("category", category);
            }
            query.append_pair("pageSize", &self.page_size.to_string());
            query.append_pair("page", &page.number.max(1).to_string());
        }
        url
    }
}

#[async_trait]
impl ContentSource for NewsApiSource {
    fn name(&self) -> &'static str {
        "news-api"
    }

    async fn fetch_page(&self, scope: &Scope, page: &PageRequest) -> SourceResult<SourcePage> {
        let request = self
            .client
            .get(self.page_url(scope, page))
            .header("X-Api-Key", &self.api_key);

        let body: TopHeadlines = get_json(request).await?;
        Ok(map_page(body, page.number.max(1), self.page_size, Timestamp::now()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopHeadlines {
    #[serde(default)]
    total_results: u64,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    source: Option<ArticleSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    #[serde(alias = "image")]
    url_to_image: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

/// Placeholder NewsAPI substitutes for articles pulled by the publisher.
const REMOVED_MARKER: &str = "[Removed]";

fn map_page(body: TopHeadlines, page: u32, page_size: u32, now: Timestamp) -> SourcePage {
    let returned = body.articles.len();
    let items = body
        .articles
        .into_iter()
        .filter_map(|article| map_article(article, now))
        .collect();

    let seen = u64::from(page) * u64::from(page_size);
    SourcePage {
        items,
        next_token: None,
        has_more: returned > 0 && seen < body.total_results,
    }
}

fn map_article(article: Article, now: Timestamp) -> Option<ContentItem> {
    let title = non_empty(article.title)?;
    let url = non_empty(article.url)?;
    if title == REMOVED_MARKER {
        return None;
    }

    let published_at = article
        .published_at
        .and_then(|raw| raw.parse::<Timestamp>().ok())
        .unwrap_or(now);

    Some(ContentItem {
        natural_key: url.clone(),
        title,
        description: non_empty(article.description).unwrap_or_default(),
        content_url: url,
        image_url: non_empty(article.url_to_image),
        author: non_empty(article.author),
        source_name: non_empty(article.source.and_then(|s| s.name)),
        engagement_score: None,
        published_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "status": "ok",
        "totalResults": 45,
        "articles": [
            {
                "source": { "id": null, "name": "Reuters" },
                "author": "Jane Doe",
                "title": "Markets rally",
                "description": "Stocks rose on Tuesday.",
                "url": "https://www.reuters.com/markets/rally",
                "urlToImage": "https://www.reuters.com/img.jpg",
                "publishedAt": "2026-03-01T08:15:00Z",
                "content": "..."
            },
            {
                "source": { "id": null, "name": "[Removed]" },
                "author": null,
                "title": "[Removed]",
                "description": "[Removed]",
                "url": "https://removed.com",
                "urlToImage": null,
                "publishedAt": "2026-03-01T08:00:00Z"
            },
            {
                "source": { "name": "Nowhere" },
                "title": "No link",
                "url": "",
                "publishedAt": "2026-03-01T07:00:00Z"
            },
            {
                "source": { "name": "Wire" },
                "title": "Bad date",
                "url": "https://wire.example/a",
                "publishedAt": "yesterday"
            }
        ]
    }"#;

    #[test]
    fn maps_articles_and_drops_unusable() {
        let now: Timestamp = "2026-03-02T00:00:00Z".parse().unwrap();
        let body: TopHeadlines = serde_json::from_str(FIXTURE).unwrap();
        let page = map_page(body, 1, 20, now);

        assert_eq!(page.items.len(), 2);
        let first = &page.items[0];
        assert_eq!(first.natural_key, "https://www.reuters.com/markets/rally");
        assert_eq!(first.content_url, first.natural_key);
        assert_eq!(first.source_name.as_deref(), Some("Reuters"));
        assert_eq!(first.author.as_deref(), Some("Jane Doe"));
        assert_eq!(
            first.published_at,
            "2026-03-01T08:15:00Z".parse::<Timestamp>().unwrap()
        );

        // Unparseable timestamps fall back to the fetch time.
        assert_eq!(page.items[1].published_at, now);
    }

    #[test]
    fn has_more_follows_total_results() {
        let now = Timestamp::now();
        let body: TopHeadlines = serde_json::from_str(FIXTURE).unwrap();
        assert!(map_page(body, 2, 20, now).has_more);

        let body: TopHeadlines = serde_json::from_str(FIXTURE).unwrap();
        assert!(!map_page(body, 3, 20, now).has_more);

        let empty: TopHeadlines =
            serde_json::from_str(r#"{"totalResults": 100, "articles": []}"#).unwrap();
        assert!(!map_page(empty, 1, 20, now).has_more);
    }

    #[test]
    fn page_url_carries_scope() {
        let source =
            NewsApiSource::new(Client::new(), NewsApiSource::DEFAULT_BASE_URL, "key").unwrap();
        let scope = Scope::with_category("us", "technology").unwrap();
        let url = source.page_url(
            &scope,
            &PageRequest {
                number: 3,
                token: None,
            },
        );

        let query = url.query().unwrap();
        assert!(query.contains("country=us"));
        assert!(query.contains("category=technology"));
        assert!(query.contains("page=3"));
        assert!(!query.contains("key"));
    }
}
