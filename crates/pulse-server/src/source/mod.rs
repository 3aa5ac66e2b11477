//! Upstream content sources.
//!
//! Each adapter fetches one page of a scope from a third-party API, maps the
//! upstream JSON into [`ContentItem`]s and drops items it cannot use. The
//! [`StrategyMap`] resolves which adapter serves a given scope.

mod config;
mod error;
mod hacker_news;
mod http;
mod imgflip;
mod news_api;
mod reddit;
mod strategy;
mod youtube;

use async_trait::async_trait;
use jiff::Timestamp;
use pulse_nats::stream::Scope;
use serde::{Deserialize, Serialize};

pub use config::{SourceConfig, SourceKind};
pub use error::{SourceError, SourceResult};
pub use hacker_news::HackerNewsSource;
pub use imgflip::ImgflipSource;
pub use news_api::NewsApiSource;
pub use reddit::RedditSource;
pub use strategy::{SourceStrategy, StrategyMap};
pub use youtube::YouTubeSource;

/// Tracing target for source adapter operations.
pub const TRACING_TARGET: &str = "pulse_server::source";

/// A normalized item produced by a source adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Canonical URL or source-native identifier, unique within a domain.
    pub natural_key: String,
    pub title: String,
    pub description: String,
    /// Link shown to readers.
    pub content_url: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub source_name: Option<String>,
    /// Popularity on a 0-100 scale, for sources that report votes.
    pub engagement_score: Option<i64>,
    pub published_at: Timestamp,
}

/// Scores upstream votes and comments on a 0-100 scale.
///
/// Comments weigh more than votes. 3,400 votes alone reach the top of the
/// scale.
pub fn engagement_score(votes: i64, comments: i64) -> i64 {
    let weighted = votes.max(0).saturating_mul(3) + comments.max(0).saturating_mul(5);
    (weighted / 100).min(100)
}

/// Which page of a scope to fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub number: u32,
    /// Continuation token returned with the previous page.
    pub token: Option<String>,
}

impl PageRequest {
    /// Creates the request for the first page.
    pub fn first() -> Self {
        Self {
            number: 1,
            token: None,
        }
    }
}

/// One page of upstream results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePage {
    pub items: Vec<ContentItem>,
    /// Token to pass with the next page request.
    pub next_token: Option<String>,
    /// Whether the upstream reported further pages.
    pub has_more: bool,
}

impl SourcePage {
    /// Creates a page with no continuation.
    pub fn last(items: Vec<ContentItem>) -> Self {
        Self {
            items,
            next_token: None,
            has_more: false,
        }
    }
}

/// Fetches pages of content for a scope.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Short adapter name used in logs.
    fn name(&self) -> &'static str;

    /// Fetches a single page.
    async fn fetch_page(&self, scope: &Scope, page: &PageRequest) -> SourceResult<SourcePage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engagement_score_is_capped() {
        assert_eq!(engagement_score(0, 0), 0);
        assert_eq!(engagement_score(104, 71), 6);
        assert_eq!(engagement_score(3_400, 0), 100);
        assert_eq!(engagement_score(50_000, 9_000), 100);
        assert_eq!(engagement_score(-20, 0), 0);
    }
}
