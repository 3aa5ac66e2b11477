//! Content store seam.
//!
//! The coordinator writes through [`ContentStore::upsert_many`] and the read
//! API queries through [`ContentStore::list`] and
//! [`ContentStore::find_by_key`]. [`PgStore`] is the production
//! implementation.

#[cfg(test)]
mod memory;
mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
#[cfg(test)]
pub use memory::MemoryStore;
pub use postgres::PgStore;
use pulse_postgres::model::{ContentRecord, NewContentRecord};
use pulse_postgres::query::{RecordFilter, UpsertSummary};
use pulse_postgres::types::{OffsetPage, OffsetPagination};

use crate::Result;

/// Tracing target for store operations.
pub const TRACING_TARGET: &str = "pulse_server::store";

/// Persistent collection of content records, partitioned by domain.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Inserts new keys and overwrites existing ones.
    ///
    /// Callers pass batches through [`prepare_batch`] first.
    async fn upsert_many(&self, records: Vec<NewContentRecord>) -> Result<UpsertSummary>;

    /// Lists records newest first.
    async fn list(
        &self,
        domain: &str,
        filter: RecordFilter,
        pagination: OffsetPagination,
    ) -> Result<OffsetPage<ContentRecord>>;

    /// Finds a record by natural key.
    async fn find_by_key(&self, domain: &str, natural_key: &str) -> Result<Option<ContentRecord>>;

    /// Returns whether the store is reachable.
    async fn ping(&self) -> bool;
}

/// Drops records whose natural key cannot be stored and collapses repeated
/// keys.
///
/// A key must be non-blank, and a key that looks like an `http(s)` URL must
/// parse as one. A repeated `(domain, natural_key)` keeps the position of
/// its first occurrence and the fields of its last, which is what the
/// upsert would have written. Returns the kept records and the number
/// dropped.
pub fn prepare_batch(records: Vec<NewContentRecord>) -> (Vec<NewContentRecord>, usize) {
    let total = records.len();
    let mut positions: HashMap<(String, String), usize> = HashMap::with_capacity(total);
    let mut kept: Vec<NewContentRecord> = Vec::with_capacity(total);
    let mut invalid = 0;

    for record in records {
        if !is_valid_key(&record.natural_key) {
            invalid += 1;
            continue;
        }

        let key = (record.domain.clone(), record.natural_key.clone());
        match positions.get(&key) {
            Some(&index) => kept[index] = record,
            None => {
                positions.insert(key, kept.len());
                kept.push(record);
            }
        }
    }

    let dropped = total - kept.len();
    if dropped > 0 {
        tracing::debug!(
            target: TRACING_TARGET,
            invalid,
            duplicates = dropped - invalid,
            kept = kept.len(),
            "Dropped invalid and repeated natural keys"
        );
    }

    (kept, dropped)
}

fn is_valid_key(key: &str) -> bool {
    let key = key.trim();
    if key.is_empty() {
        return false;
    }

    let lower = key.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return url::Url::parse(key).is_ok_and(|url| url.has_host());
    }

    true
}

#[cfg(test)]
pub(crate) mod fixtures {
    use jiff::Timestamp;
    use pulse_postgres::model::NewContentRecord;
    use uuid::Uuid;

    /// Builds a record for `domain` and `scope` published at `published_at`.
    pub fn record(
        domain: &str,
        scope: &str,
        natural_key: &str,
        title: &str,
        published_at: Timestamp,
    ) -> NewContentRecord {
        let (region, category) = match scope.split_once(':') {
            Some((region, category)) => (region.to_owned(), Some(category.to_owned())),
            None => (scope.to_owned(), None),
        };

        NewContentRecord {
            id: Uuid::now_v7(),
            domain: domain.to_owned(),
            natural_key: natural_key.to_owned(),
            scope: scope.to_owned(),
            region,
            category,
            title: title.to_owned(),
            description: String::new(),
            content_url: natural_key.to_owned(),
            image_url: None,
            author: None,
            source_name: None,
            engagement_score: None,
            published_at: published_at.into(),
            fetched_at: Timestamp::now().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::fixtures::record;
    use super::*;

    #[test]
    fn drops_blank_and_malformed_keys() {
        let now = Timestamp::now();
        let records = vec![
            record("news", "us", "https://example.com/a", "ok", now),
            record("news", "us", "   ", "blank", now),
            record("news", "us", "https://", "no host", now),
            record("news", "us", "http://exa mple.com", "space", now),
            record("viral", "top", "hn_123", "native id", now),
        ];

        let (kept, dropped) = prepare_batch(records);
        assert_eq!(dropped, 3);
        let keys: Vec<_> = kept.iter().map(|r| r.natural_key.as_str()).collect();
        assert_eq!(keys, ["https://example.com/a", "hn_123"]);
    }

    #[test]
    fn repeated_keys_keep_first_position_and_last_fields() {
        let now = Timestamp::now();
        let records = vec![
            record("news", "us", "https://example.com/a", "first", now),
            record("news", "us", "https://example.com/b", "other", now),
            record("news", "us", "https://example.com/a", "second", now),
            record("video", "us", "https://example.com/a", "other domain", now),
        ];

        let (kept, dropped) = prepare_batch(records);
        assert_eq!(dropped, 1);
        let titles: Vec<_> = kept.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["second", "other", "other domain"]);
    }
}
