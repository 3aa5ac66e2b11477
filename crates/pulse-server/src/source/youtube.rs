//! YouTube Data API most-popular chart adapter.

use async_trait::async_trait;
use jiff::Timestamp;
use pulse_nats::stream::Scope;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::http::{get_json, non_empty, parse_base_url, truncate};
use super::{ContentItem, ContentSource, PageRequest, SourcePage, SourceResult};

/// Category id YouTube uses for "all categories".
const ALL_CATEGORIES: &str = "0";

/// Longest description kept per video.
const MAX_DESCRIPTION_CHARS: usize = 500;

/// Fetches the `mostPopular` video chart for a region.
///
/// The scope region is the ISO country code, the scope category (if any) is
/// a YouTube video category id. Pages are chained with `nextPageToken`.
#[derive(Debug, Clone)]
pub struct YouTubeSource {
    client: Client,
    base_url: Url,
    api_key: String,
    page_size: u32,
}

impl YouTubeSource {
    /// Public YouTube Data API `videos` endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://www.googleapis.com/youtube/v3/videos";

    /// Videos requested per page (API maximum).
    pub const DEFAULT_PAGE_SIZE: u32 = 50;

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
            query.append_pair("part", "snippet");
            query.append_pair("chart", "mostPopular");
            query.append_pair("regionCode", &scope.region_code().to_ascii_uppercase());
            query.append_pair("maxResults", &self.page_size.to_string());
            if let Some(category) = scope.category().filter(|c| *c != ALL_CATEGORIES) {
                query.append_pair("videoCategoryId", category);
            }
            if let Some(token) = page.token.as_deref() {
                query.append_pair("pageToken", token);
            }
            query.append_pair("key", &self.api_key);
        }
        url
    }
}

#[async_trait]
impl ContentSource for YouTubeSource {
    fn name(&self) -> &'static str {
        "youtube"
    }

    async fn fetch_page(&self, scope: &Scope, page: &PageRequest) -> SourceResult<SourcePage> {
        let body: VideoList = get_json(self.client.get(self.page_url(scope, page))).await?;
        Ok(map_page(body, Timestamp::now()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoList {
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    id: Option<String>,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    channel_title: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
    standard: Option<Thumbnail>,
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

impl Thumbnails {
    /// Largest available thumbnail.
    fn best(self) -> Option<String> {
        [self.maxres, self.standard, self.high, self.medium, self.default]
            .into_iter()
            .flatten()
            .find_map(|t| non_empty(t.url))
    }
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

fn map_page(body: VideoList, now: Timestamp) -> SourcePage {
    let items = body
        .items
        .into_iter()
        .filter_map(|video| map_video(video, now))
        .collect();

    let next_token = non_empty(body.next_page_token);
    SourcePage {
        items,
        has_more: next_token.is_some(),
        next_token,
    }
}

fn map_video(video: Video, now: Timestamp) -> Option<ContentItem> {
    let id = non_empty(video.id)?;
    let snippet = video.snippet?;
    let title = non_empty(snippet.title)?;
    let url = format!("https://www.youtube.com/watch?v={id}");

    Some(ContentItem {
        natural_key: url.clone(),
        title,
        description: snippet
            .description
            .map(|d| truncate(&d, MAX_DESCRIPTION_CHARS))
            .unwrap_or_default(),
        content_url: url,
        image_url: snippet.thumbnails.best(),
        author: non_empty(snippet.channel_title),
        source_name: Some("YouTube".to_owned()),
        engagement_score: None,
        published_at: snippet
            .published_at
            .and_then(|raw| raw.parse::<Timestamp>().ok())
            .unwrap_or(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "kind": "youtube#videoListResponse",
        "nextPageToken": "CDIQAA",
        "items": [
            {
                "id": "dQw4w9WgXcQ",
                "snippet": {
                    "publishedAt": "2026-02-28T17:00:06Z",
                    "title": "Trending video",
                    "description": "A description",
                    "channelTitle": "Some Channel",
                    "thumbnails": {
                        "default": { "url": "https://i.ytimg.com/vi/x/default.jpg" },
                        "high": { "url": "https://i.ytimg.com/vi/x/hqdefault.jpg" }
                    }
                }
            },
            { "id": "noSnippet" },
            { "id": "", "snippet": { "title": "No id" } }
        ]
    }"#;

    #[test]
    fn maps_videos_and_threads_token() {
        let body: VideoList = serde_json::from_str(FIXTURE).unwrap();
        let page = map_page(body, Timestamp::now());

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.next_token.as_deref(), Some("CDIQAA"));
        assert!(page.has_more);

        let video = &page.items[0];
        assert_eq!(video.natural_key, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(
            video.image_url.as_deref(),
            Some("https://i.ytimg.com/vi/x/hqdefault.jpg")
        );
        assert_eq!(video.author.as_deref(), Some("Some Channel"));
    }

    #[test]
    fn last_page_has_no_token() {
        let body: VideoList = serde_json::from_str(r#"{"items": []}"#).unwrap();
        let page = map_page(body, Timestamp::now());
        assert!(!page.has_more);
        assert!(page.next_token.is_none());
    }

    #[test]
    fn page_url_passes_token_and_category() {
        let source =
            YouTubeSource::new(Client::new(), YouTubeSource::DEFAULT_BASE_URL, "k").unwrap();
        let page = PageRequest {
            number: 2,
            token: Some("CDIQAA".into()),
        };

        let url = source.page_url(&Scope::with_category("in", "10").unwrap(), &page);
        let query = url.query().unwrap();
        assert!(query.contains("regionCode=IN"));
        assert!(query.contains("videoCategoryId=10"));
        assert!(query.contains("pageToken=CDIQAA"));

        let url = source.page_url(&Scope::with_category("in", "0").unwrap(), &page);
        assert!(!url.query().unwrap().contains("videoCategoryId"));
    }
}
