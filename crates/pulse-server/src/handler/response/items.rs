//! Content item response types.

use jiff::Timestamp;
use pulse_postgres::model::ContentRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored content record.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    /// Canonical URL or source-native identifier.
    pub natural_key: String,
    /// Scope the record was last fetched under.
    pub scope: String,
    pub region: String,
    pub category: Option<String>,
    pub title: String,
    pub description: String,
    pub content_url: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub source_name: Option<String>,
    /// Upstream popularity on a 0-100 scale.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_score: Option<i64>,
    pub published_at: Timestamp,
    pub fetched_at: Timestamp,
}

impl From<ContentRecord> for Item {
    fn from(record: ContentRecord) -> Self {
        Self {
            published_at: record.published_at(),
            fetched_at: record.fetched_at(),

            id: record.id,
            natural_key: record.natural_key,
            scope: record.scope,
            region: record.region,
            category: record.category,
            title: record.title,
            description: record.description,
            content_url: record.content_url,
            image_url: record.image_url,
            author: record.author,
            source_name: record.source_name,
            engagement_score: record.engagement_score,
        }
    }
}

/// One page of items, newest first.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Items {
    pub items: Vec<Item>,
    /// 1-based page number.
    pub page: i64,
    /// Page size.
    pub limit: i64,
    /// Records matching the filter across all pages.
    pub total: i64,
}
