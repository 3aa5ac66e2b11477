//! In-memory content store for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use jiff::Timestamp;
use pulse_postgres::model::{ContentRecord, NewContentRecord};
use pulse_postgres::query::{RecordFilter, UpsertSummary};
use pulse_postgres::types::{OffsetPage, OffsetPagination};

use super::ContentStore;
use crate::{Error, Result};

/// [`ContentStore`] backed by a map keyed on `(domain, natural_key)`.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(String, String), ContentRecord>>,
    failing: AtomicBool,
    upsert_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write and read fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("store lock").len()
    }

    pub fn records(&self, domain: &str) -> Vec<ContentRecord> {
        self.records
            .lock()
            .expect("store lock")
            .values()
            .filter(|record| record.domain == domain)
            .cloned()
            .collect()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::external("postgres", "store unavailable"));
        }
        Ok(())
    }
}

fn matches(record: &ContentRecord, filter: &RecordFilter) -> bool {
    match filter {
        RecordFilter::All => true,
        RecordFilter::Region(region) => &record.region == region,
        RecordFilter::Scope(scope) => &record.scope == scope,
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn upsert_many(&self, records: Vec<NewContentRecord>) -> Result<UpsertSummary> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;

        let mut summary = UpsertSummary::default();
        let mut map = self.records.lock().expect("store lock");
        let now = Timestamp::now();

        for new in records {
            let key = (new.domain.clone(), new.natural_key.clone());
            let (id, created_at) = match map.get(&key) {
                Some(existing) => {
                    summary.updated += 1;
                    (existing.id, existing.created_at)
                }
                None => {
                    summary.inserted += 1;
                    (new.id, now.into())
                }
            };

            let record = ContentRecord {
                id,
                domain: new.domain,
                natural_key: new.natural_key,
                scope: new.scope,
                region: new.region,
                category: new.category,
                title: new.title,
                description: new.description,
                content_url: new.content_url,
                image_url: new.image_url,
                author: new.author,
                source_name: new.source_name,
                engagement_score: new.engagement_score,
                published_at: new.published_at,
                fetched_at: new.fetched_at,
                created_at,
                updated_at: now.into(),
            };
            map.insert(key, record);
        }

        Ok(summary)
    }

    async fn list(
        &self,
        domain: &str,
        filter: RecordFilter,
        pagination: OffsetPagination,
    ) -> Result<OffsetPage<ContentRecord>> {
        self.check()?;

        let mut matching: Vec<_> = self
            .records(domain)
            .into_iter()
            .filter(|record| matches(record, &filter))
            .collect();
        matching.sort_by(|a, b| {
            b.published_at()
                .cmp(&a.published_at())
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = pagination
            .include_count
            .then(|| i64::try_from(matching.len()).unwrap_or(i64::MAX));
        let items = matching
            .into_iter()
            .skip(usize::try_from(pagination.offset).unwrap_or(0))
            .take(usize::try_from(pagination.limit).unwrap_or(0))
            .collect();

        Ok(OffsetPage::new(items, total))
    }

    async fn find_by_key(&self, domain: &str, natural_key: &str) -> Result<Option<ContentRecord>> {
        self.check()?;
        let map = self.records.lock().expect("store lock");
        Ok(map
            .get(&(domain.to_owned(), natural_key.to_owned()))
            .cloned())
    }

    async fn ping(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;

    use super::*;
    use crate::store::fixtures::record;

    #[tokio::test]
    async fn duplicate_key_overwrites_in_place() {
        let store = MemoryStore::new();
        let now = Timestamp::now();

        let first = store
            .upsert_many(vec![record("news", "us", "https://x/1", "A", now)])
            .await
            .unwrap();
        assert_eq!(first.inserted, 1);

        let original = store.find_by_key("news", "https://x/1").await.unwrap().unwrap();

        let second = store
            .upsert_many(vec![record("news", "us", "https://x/1", "B", now)])
            .await
            .unwrap();
        assert_eq!(second.updated, 1);
        assert_eq!(second.inserted, 0);

        let records = store.records("news");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "B");
        assert_eq!(records[0].id, original.id);
    }

    #[tokio::test]
    async fn lists_newest_first_within_region() {
        let store = MemoryStore::new();
        let base = Timestamp::now();
        let two_hours = SignedDuration::from_hours(2);

        store
            .upsert_many(vec![
                record("news", "us", "https://x/1", "old", base - two_hours),
                record("news", "in", "https://x/2", "india", base),
                record("news", "us:10", "https://x/3", "new", base),
            ])
            .await
            .unwrap();

        let page = store
            .list(
                "news",
                RecordFilter::Region("us".into()),
                OffsetPagination::default().with_count(),
            )
            .await
            .unwrap();

        let titles: Vec<_> = page.items.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["new", "old"]);
        assert_eq!(page.total, Some(2));
    }
}
