//! Imgflip popular meme templates adapter.

use async_trait::async_trait;
use jiff::Timestamp;
use pulse_nats::stream::Scope;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::http::{get_json, non_empty, parse_base_url};
use super::{ContentItem, ContentSource, PageRequest, SourceError, SourcePage, SourceResult};

/// Fetches `get_memes`, the list of currently popular meme templates.
///
/// The list is global and unpaginated: every scope receives the same single
/// page. Templates are keyed by their image URL.
#[derive(Debug, Clone)]
pub struct ImgflipSource {
    client: Client,
    base_url: Url,
}

impl ImgflipSource {
    /// Public Imgflip endpoint.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.imgflip.com/get_memes";

    /// Creates the adapter.
    pub fn new(client: Client, base_url: &str) -> SourceResult<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }
}

#[async_trait]
impl ContentSource for ImgflipSource {
    fn name(&self) -> &'static str {
        "imgflip"
    }

    async fn fetch_page(&self, _scope: &Scope, page: &PageRequest) -> SourceResult<SourcePage> {
        if page.number > 1 {
            return Ok(SourcePage::default());
        }

        let body: MemeList = get_json(self.client.get(self.base_url.clone())).await?;
        map_page(body, Timestamp::now())
    }
}

#[derive(Debug, Deserialize)]
struct MemeList {
    success: bool,
    #[serde(default)]
    data: MemeData,
    error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MemeData {
    #[serde(default)]
    memes: Vec<Meme>,
}

#[derive(Debug, Deserialize)]
struct Meme {
    name: Option<String>,
    url: Option<String>,
}

fn map_page(body: MemeList, now: Timestamp) -> SourceResult<SourcePage> {
    if !body.success {
        return Err(SourceError::Rejected(
            body.error_message
                .unwrap_or_else(|| "success flag was false".to_owned()),
        ));
    }

    let items = body
        .data
        .memes
        .into_iter()
        .filter_map(|meme| map_meme(meme, now))
        .collect();
    Ok(SourcePage::last(items))
}

fn map_meme(meme: Meme, now: Timestamp) -> Option<ContentItem> {
    let title = non_empty(meme.name)?;
    let url = non_empty(meme.url)?;

    Some(ContentItem {
        natural_key: url.clone(),
        title,
        description: String::new(),
        content_url: url.clone(),
        image_url: Some(url),
        author: None,
        source_name: Some("Imgflip".to_owned()),
        engagement_score: None,
        published_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "success": true,
        "data": {
            "memes": [
                {
                    "id": "181913649",
                    "name": "Drake Hotline Bling",
                    "url": "https://i.imgflip.com/30b1gx.jpg",
                    "width": 1200,
                    "height": 1200,
                    "box_count": 2
                },
                {
                    "id": "87743020",
                    "name": "Two Buttons",
                    "url": "https://i.imgflip.com/1g8my4.jpg",
                    "width": 600,
                    "height": 908,
                    "box_count": 3
                },
                { "id": "1", "name": "", "url": "https://i.imgflip.com/blank.jpg" },
                { "id": "2", "name": "No image" }
            ]
        }
    }"#;

    #[test]
    fn maps_templates_into_one_final_page() {
        let now = Timestamp::from_second(1_772_352_000).unwrap();
        let body: MemeList = serde_json::from_str(FIXTURE).unwrap();
        let page = map_page(body, now).unwrap();

        assert!(!page.has_more);
        assert_eq!(page.next_token, None);
        assert_eq!(page.items.len(), 2);

        let drake = &page.items[0];
        assert_eq!(drake.natural_key, "https://i.imgflip.com/30b1gx.jpg");
        assert_eq!(drake.title, "Drake Hotline Bling");
        assert_eq!(drake.image_url.as_deref(), Some("https://i.imgflip.com/30b1gx.jpg"));
        assert_eq!(drake.source_name.as_deref(), Some("Imgflip"));
        assert_eq!(drake.published_at, now);
    }

    #[test]
    fn unsuccessful_response_is_an_error() {
        let body: MemeList =
            serde_json::from_str(r#"{"success": false, "error_message": "rate limited"}"#).unwrap();

        let err = map_page(body, Timestamp::now()).unwrap_err();
        assert_eq!(err.to_string(), "upstream rejected the request: rate limited");
    }

    #[tokio::test]
    async fn later_pages_are_empty_without_a_request() {
        let source = ImgflipSource::new(Client::new(), "http://127.0.0.1:9/get_memes").unwrap();
        let page = PageRequest {
            number: 2,
            token: None,
        };

        let result = source
            .fetch_page(&Scope::region("global").unwrap(), &page)
            .await
            .unwrap();
        assert_eq!(result, SourcePage::default());
    }
}
