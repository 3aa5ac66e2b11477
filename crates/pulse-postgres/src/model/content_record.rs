//! Content record model.

use diesel::prelude::*;
use jiff_diesel::Timestamp;
use uuid::Uuid;

use crate::schema::content_records;

/// A normalized content item, unique per `(domain, natural_key)`.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = content_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ContentRecord {
    /// Surrogate identifier, stable across re-fetches.
    pub id: Uuid,
    /// Content domain (`news`, `video`, `viral`, `memes`).
    pub domain: String,
    /// Canonical URL or source-native identifier.
    pub natural_key: String,
    /// Scope the record was last fetched under (`us`, `us:10`).
    pub scope: String,
    /// Region part of the scope.
    pub region: String,
    /// Category part of the scope.
    pub category: Option<String>,
    /// Display title.
    pub title: String,
    /// Display description.
    pub description: String,
    /// Link shown to readers.
    pub content_url: String,
    /// Preview image.
    pub image_url: Option<String>,
    /// Author or channel.
    pub author: Option<String>,
    /// Publishing source.
    pub source_name: Option<String>,
    /// Upstream popularity on a 0-100 scale, when the source reports one.
    pub engagement_score: Option<i64>,
    /// Source timestamp.
    pub published_at: Timestamp,
    /// When the record was last fetched.
    pub fetched_at: Timestamp,
    /// When the record was first stored.
    pub created_at: Timestamp,
    /// When the record was last written.
    pub updated_at: Timestamp,
}

/// Insert payload for [`ContentRecord`].
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = content_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewContentRecord {
    /// Used only when the key is new; an existing row keeps its id.
    pub id: Uuid,
    pub domain: String,
    pub natural_key: String,
    pub scope: String,
    pub region: String,
    pub category: Option<String>,
    pub title: String,
    pub description: String,
    pub content_url: String,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub source_name: Option<String>,
    pub engagement_score: Option<i64>,
    pub published_at: Timestamp,
    pub fetched_at: Timestamp,
}

impl ContentRecord {
    /// Returns the source timestamp.
    #[inline]
    pub fn published_at(&self) -> jiff::Timestamp {
        self.published_at.into()
    }

    /// Returns the ingestion timestamp.
    #[inline]
    pub fn fetched_at(&self) -> jiff::Timestamp {
        self.fetched_at.into()
    }
}
