//! Reddit hot listing adapter.

use async_trait::async_trait;
use jiff::Timestamp;
use pulse_nats::stream::Scope;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::http::{get_json, non_empty, parse_base_url, truncate};
use super::{
    ContentItem, ContentSource, PageRequest, SourceError, SourcePage, SourceResult,
    engagement_score,
};

/// Posts below this score are not considered viral.
const MIN_SCORE: i64 = 100;

/// Longest self-text kept as the description.
const MAX_DESCRIPTION_CHARS: usize = 300;

/// Fetches `/r/{subreddit}/hot.json`.
///
/// The scope region names the subreddit. Pages are chained with the
/// listing's `after` cursor.
#[derive(Debug, Clone)]
pub struct RedditSource {
    client: Client,
    base_url: Url,
    page_size: u32,
}

impl RedditSource {
    /// Public Reddit endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://www.reddit.com";

    /// Posts requested per page.
    pub const DEFAULT_PAGE_SIZE: u32 = 25;

    /// Creates the adapter.
    pub fn new(client: Client, base_url: &str) -> SourceResult<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            page_size: Self::DEFAULT_PAGE_SIZE,
        })
    }

    fn page_url(&self, scope: &Scope, page: &PageRequest) -> SourceResult<Url> {
        let path = format!("r/{}/hot.json", scope.region_code());
        let mut url = self
            .base_url
            .join(&path)
            .map_err(|e| SourceError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.page_size.to_string());
            if let Some(after) = page.token.as_deref() {
                query.append_pair("after", after);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ContentSource for RedditSource {
    fn name(&self) -> &'static str {
        "reddit"
    }

    async fn fetch_page(&self, scope: &Scope, page: &PageRequest) -> SourceResult<SourcePage> {
        let body: Listing = get_json(self.client.get(self.page_url(scope, page)?)).await?;
        Ok(map_page(body))
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    after: Option<String>,
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    selftext: String,
    permalink: Option<String>,
    author: Option<String>,
    subreddit: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    created_utc: Option<f64>,
}

fn map_page(body: Listing) -> SourcePage {
    let items = body
        .data
        .children
        .into_iter()
        .filter_map(|child| map_post(child.data))
        .collect();

    let next_token = non_empty(body.data.after);
    SourcePage {
        items,
        has_more: next_token.is_some(),
        next_token,
    }
}

fn map_post(post: Post) -> Option<ContentItem> {
    if post.score < MIN_SCORE {
        return None;
    }

    let id = non_empty(post.id)?;
    let title = non_empty(post.title)?;
    let permalink = non_empty(post.permalink)?;

    let published_at = post
        .created_utc
        .and_then(|secs| Timestamp::from_second(secs as i64).ok())
        .unwrap_or_else(Timestamp::now);

    // Reddit uses sentinel values such as "self" or "nsfw" instead of URLs.
    let image_url = non_empty(post.thumbnail).filter(|t| t.starts_with("http"));

    Some(ContentItem {
        natural_key: format!("reddit_{id}"),
        title,
        description: truncate(&post.selftext, MAX_DESCRIPTION_CHARS),
        content_url: format!("https://reddit.com{permalink}"),
        image_url,
        author: non_empty(post.author),
        source_name: non_empty(post.subreddit).map(|s| format!("r/{s}")),
        engagement_score: Some(engagement_score(post.score, post.num_comments)),
        published_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_abc999",
            "children": [
                {
                    "kind": "t3",
                    "data": {
                        "id": "abc123",
                        "title": "Something happened",
                        "selftext": "",
                        "permalink": "/r/worldnews/comments/abc123/something/",
                        "author": "someone",
                        "subreddit": "worldnews",
                        "thumbnail": "https://b.thumbs.redditmedia.com/x.jpg",
                        "score": 5230,
                        "num_comments": 800,
                        "created_utc": 1772352000.0
                    }
                },
                {
                    "kind": "t3",
                    "data": {
                        "id": "low1",
                        "title": "Not viral",
                        "permalink": "/r/worldnews/comments/low1/x/",
                        "thumbnail": "self",
                        "score": 12,
                        "created_utc": 1772352000.0
                    }
                },
                {
                    "kind": "t3",
                    "data": {
                        "id": "self1",
                        "title": "Text post",
                        "selftext": "body text",
                        "permalink": "/r/worldnews/comments/self1/y/",
                        "thumbnail": "self",
                        "score": 400,
                        "created_utc": 1772352000.0
                    }
                }
            ]
        }
    }"#;

    #[test]
    fn maps_posts_and_filters_low_scores() {
        let body: Listing = serde_json::from_str(FIXTURE).unwrap();
        let page = map_page(body);

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next_token.as_deref(), Some("t3_abc999"));
        assert!(page.has_more);

        let post = &page.items[0];
        assert_eq!(post.natural_key, "reddit_abc123");
        assert_eq!(
            post.content_url,
            "https://reddit.com/r/worldnews/comments/abc123/something/"
        );
        assert_eq!(post.source_name.as_deref(), Some("r/worldnews"));
        assert_eq!(post.published_at, Timestamp::from_second(1_772_352_000).unwrap());
        assert_eq!(post.engagement_score, Some(100));

        let text_post = &page.items[1];
        assert_eq!(text_post.image_url, None);
        assert_eq!(text_post.description, "body text");
        assert_eq!(text_post.engagement_score, Some(12));
    }

    #[test]
    fn page_url_uses_subreddit_and_cursor() {
        let source = RedditSource::new(Client::new(), RedditSource::DEFAULT_BASE_URL).unwrap();
        let page = PageRequest {
            number: 2,
            token: Some("t3_abc999".into()),
        };

        let url = source
            .page_url(&Scope::region("worldnews").unwrap(), &page)
            .unwrap();
        assert_eq!(url.path(), "/r/worldnews/hot.json");
        assert!(url.query().unwrap().contains("after=t3_abc999"));
    }
}
