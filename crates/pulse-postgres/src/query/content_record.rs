//! Content record repository: idempotent upserts and paginated reads.

use std::collections::HashMap;
use std::future::Future;

use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::{Query, QueryFragment, QueryId};
use diesel::sql_types::Bool;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::model::{ContentRecord, NewContentRecord};
use crate::types::{OffsetPage, OffsetPagination};
use crate::{PgConnection, PgError, PgResult, TRACING_TARGET_QUERY, schema};

/// Counts reported by a bulk upsert.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Rows created for previously unseen keys.
    pub inserted: usize,
    /// Existing rows overwritten in place.
    pub updated: usize,
    /// Rows rejected by the database.
    pub failed: usize,
}

impl UpsertSummary {
    /// Rows actually created or changed.
    #[inline]
    pub fn stored(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Read-path filter.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    /// Every record of the domain.
    #[default]
    All,
    /// Records whose region matches, across all categories.
    Region(String),
    /// Records with this exact scope string.
    Scope(String),
}

/// Repository for content record database operations.
pub trait ContentRecordRepository {
    /// Inserts records whose `(domain, natural_key)` is new and overwrites
    /// the display fields of existing ones.
    ///
    /// Duplicate keys within `records` collapse to their last occurrence.
    /// When the batch statement is rejected because of a bad row, rows are
    /// retried one by one so the rest of the batch is still written.
    fn upsert_content_records(
        &mut self,
        records: Vec<NewContentRecord>,
    ) -> impl Future<Output = PgResult<UpsertSummary>> + Send;

    /// Lists records newest first (`published_at DESC, id DESC`).
    fn list_content_records(
        &mut self,
        domain: &str,
        filter: RecordFilter,
        pagination: OffsetPagination,
    ) -> impl Future<Output = PgResult<OffsetPage<ContentRecord>>> + Send;

    /// Finds a record by its natural key.
    fn find_content_record_by_key(
        &mut self,
        domain: &str,
        natural_key: &str,
    ) -> impl Future<Output = PgResult<Option<ContentRecord>>> + Send;
}

impl ContentRecordRepository for PgConnection {
    async fn upsert_content_records(
        &mut self,
        records: Vec<NewContentRecord>,
    ) -> PgResult<UpsertSummary> {
        upsert_with_fallback(self, collapse_duplicate_keys(records)).await
    }

    async fn list_content_records(
        &mut self,
        domain: &str,
        filter: RecordFilter,
        pagination: OffsetPagination,
    ) -> PgResult<OffsetPage<ContentRecord>> {
        use schema::content_records::{self, dsl};

        let filtered = || {
            let query = content_records::table
                .filter(dsl::domain.eq(domain.to_owned()))
                .into_boxed::<Pg>();
            match &filter {
                RecordFilter::All => query,
                RecordFilter::Region(region) => query.filter(dsl::region.eq(region.clone())),
                RecordFilter::Scope(scope) => query.filter(dsl::scope.eq(scope.clone())),
            }
        };

        let total = if pagination.include_count {
            Some(
                filtered()
                    .count()
                    .get_result::<i64>(self)
                    .await
                    .map_err(PgError::from)?,
            )
        } else {
            None
        };

        let items = filtered()
            .select(ContentRecord::as_select())
            .order((dsl::published_at.desc(), dsl::id.desc()))
            .limit(pagination.limit)
            .offset(pagination.offset)
            .load(self)
            .await
            .map_err(PgError::from)?;

        Ok(OffsetPage::new(items, total))
    }

    async fn find_content_record_by_key(
        &mut self,
        record_domain: &str,
        key: &str,
    ) -> PgResult<Option<ContentRecord>> {
        use schema::content_records::dsl::*;

        let record = content_records
            .filter(domain.eq(record_domain))
            .filter(natural_key.eq(key))
            .select(ContentRecord::as_select())
            .first(self)
            .await
            .optional()
            .map_err(PgError::from)?;

        Ok(record)
    }
}

/// Executes one upsert statement for a slice of records.
trait BatchWriter {
    fn write_batch(
        &mut self,
        records: &[NewContentRecord],
    ) -> impl Future<Output = PgResult<UpsertSummary>> + Send;
}

impl BatchWriter for PgConnection {
    fn write_batch(
        &mut self,
        records: &[NewContentRecord],
    ) -> impl Future<Output = PgResult<UpsertSummary>> + Send {
        upsert_batch(self, records)
    }
}

/// Writes `records` in one statement, falling back to one statement per
/// row when the batch is rejected because of a bad row.
async fn upsert_with_fallback<W>(
    writer: &mut W,
    records: Vec<NewContentRecord>,
) -> PgResult<UpsertSummary>
where
    W: BatchWriter + Send,
{
    if records.is_empty() {
        return Ok(UpsertSummary::default());
    }

    let err = match writer.write_batch(&records).await {
        Ok(summary) => return Ok(summary),
        Err(err) if err.is_row_level() && records.len() > 1 => err,
        Err(err) => return Err(err),
    };

    tracing::warn!(
        target: TRACING_TARGET_QUERY,
        error = %err,
        batch_size = records.len(),
        "Bulk upsert rejected, retrying rows individually"
    );

    let mut summary = UpsertSummary::default();
    for record in &records {
        match writer.write_batch(std::slice::from_ref(record)).await {
            Ok(single) => {
                summary.inserted += single.inserted;
                summary.updated += single.updated;
            }
            Err(err) if err.is_row_level() => {
                tracing::warn!(
                    target: TRACING_TARGET_QUERY,
                    error = %err,
                    natural_key = %record.natural_key,
                    "Skipping record rejected by the database"
                );
                summary.failed += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(summary)
}

/// Builds one `INSERT .. ON CONFLICT DO UPDATE` statement for the slice.
///
/// The surrogate `id` and `created_at` are never overwritten. The statement
/// returns `xmax = 0` per row, which holds only for tuples it created.
fn upsert_statement(
    records: &[NewContentRecord],
) -> impl Query<SqlType = Bool> + QueryFragment<Pg> + QueryId + Send + '_ {
    use schema::content_records::{self, dsl};

    diesel::insert_into(content_records::table)
        .values(records)
        .on_conflict((dsl::domain, dsl::natural_key))
        .do_update()
        .set((
            dsl::scope.eq(excluded(dsl::scope)),
            dsl::region.eq(excluded(dsl::region)),
            dsl::category.eq(excluded(dsl::category)),
            dsl::title.eq(excluded(dsl::title)),
            dsl::description.eq(excluded(dsl::description)),
            dsl::content_url.eq(excluded(dsl::content_url)),
            dsl::image_url.eq(excluded(dsl::image_url)),
            dsl::author.eq(excluded(dsl::author)),
            dsl::source_name.eq(excluded(dsl::source_name)),
            dsl::engagement_score.eq(excluded(dsl::engagement_score)),
            dsl::published_at.eq(excluded(dsl::published_at)),
            dsl::fetched_at.eq(excluded(dsl::fetched_at)),
            dsl::updated_at.eq(excluded(dsl::updated_at)),
        ))
        .returning(diesel::dsl::sql::<Bool>("(xmax = 0)"))
}

async fn upsert_batch(
    conn: &mut PgConnection,
    records: &[NewContentRecord],
) -> PgResult<UpsertSummary> {
    let inserted_flags: Vec<bool> = upsert_statement(records)
        .get_results(conn)
        .await
        .map_err(PgError::from)?;

    let inserted = inserted_flags.iter().filter(|flag| **flag).count();
    let summary = UpsertSummary {
        inserted,
        updated: inserted_flags.len() - inserted,
        failed: 0,
    };

    tracing::debug!(
        target: TRACING_TARGET_QUERY,
        inserted = summary.inserted,
        updated = summary.updated,
        "Upserted content records"
    );
    Ok(summary)
}

/// Keeps the last occurrence of each `(domain, natural_key)`, preserving the
/// order of first appearance.
///
/// Postgres rejects an `ON CONFLICT DO UPDATE` statement that touches the
/// same row twice.
fn collapse_duplicate_keys(records: Vec<NewContentRecord>) -> Vec<NewContentRecord> {
    let mut positions: HashMap<(String, String), usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<NewContentRecord> = Vec::with_capacity(records.len());

    for record in records {
        let key = (record.domain.clone(), record.natural_key.clone());
        match positions.get(&key) {
            Some(&index) => unique[index] = record,
            None => {
                positions.insert(key, unique.len());
                unique.push(record);
            }
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use diesel::result::{DatabaseErrorKind, Error as DieselError};
    use uuid::Uuid;

    use super::*;

    /// Writer that rejects any batch containing one of `bad_keys`.
    #[derive(Default)]
    struct RejectingWriter {
        bad_keys: HashSet<String>,
        existing: HashSet<String>,
        transient: bool,
        batch_sizes: Vec<usize>,
    }

    impl RejectingWriter {
        fn rejecting(keys: &[&str]) -> Self {
            Self {
                bad_keys: keys.iter().map(|k| (*k).to_owned()).collect(),
                ..Self::default()
            }
        }
    }

    impl BatchWriter for RejectingWriter {
        fn write_batch(
            &mut self,
            records: &[NewContentRecord],
        ) -> impl Future<Output = PgResult<UpsertSummary>> + Send {
            self.batch_sizes.push(records.len());

            let rejected = records
                .iter()
                .any(|record| self.bad_keys.contains(&record.natural_key));
            let outcome = if rejected {
                let kind = if self.transient {
                    DatabaseErrorKind::ClosedConnection
                } else {
                    DatabaseErrorKind::CheckViolation
                };
                Err(PgError::Query(DieselError::DatabaseError(
                    kind,
                    Box::new("content_records_natural_key_not_empty".to_owned()),
                )))
            } else {
                let updated = records
                    .iter()
                    .filter(|record| self.existing.contains(&record.natural_key))
                    .count();
                Ok(UpsertSummary {
                    inserted: records.len() - updated,
                    updated,
                    failed: 0,
                })
            };

            std::future::ready(outcome)
        }
    }

    fn record(key: &str, title: &str) -> NewContentRecord {
        let now = jiff::Timestamp::now();
        NewContentRecord {
            id: Uuid::now_v7(),
            domain: "news".to_owned(),
            natural_key: key.to_owned(),
            scope: "us".to_owned(),
            region: "us".to_owned(),
            category: None,
            title: title.to_owned(),
            description: String::new(),
            content_url: key.to_owned(),
            image_url: None,
            author: None,
            source_name: None,
            engagement_score: None,
            published_at: now.into(),
            fetched_at: now.into(),
        }
    }

    #[test]
    fn collapse_keeps_last_occurrence() {
        let records = vec![
            record("https://x/1", "A"),
            record("https://x/2", "other"),
            record("https://x/1", "B"),
        ];

        let unique = collapse_duplicate_keys(records);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].natural_key, "https://x/1");
        assert_eq!(unique[0].title, "B");
        assert_eq!(unique[1].natural_key, "https://x/2");
    }

    #[test]
    fn same_key_in_other_domain_is_distinct() {
        let mut video = record("https://x/1", "V");
        video.domain = "video".to_owned();

        let unique = collapse_duplicate_keys(vec![record("https://x/1", "A"), video]);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn summary_counts_stored_rows() {
        let summary = UpsertSummary {
            inserted: 3,
            updated: 2,
            failed: 1,
        };
        assert_eq!(summary.stored(), 5);
    }

    #[test]
    fn upsert_statement_targets_natural_key() {
        let records = vec![record("https://x/1", "A")];
        let sql = diesel::debug_query::<Pg, _>(&upsert_statement(&records)).to_string();

        assert!(sql.contains(r#"INSERT INTO "content_records""#), "{sql}");
        assert!(
            sql.contains(r#"ON CONFLICT ("domain", "natural_key") DO UPDATE SET"#),
            "{sql}"
        );
        assert!(sql.contains("RETURNING (xmax = 0)"), "{sql}");

        let set_list = sql
            .split("DO UPDATE SET")
            .nth(1)
            .and_then(|rest| rest.split("RETURNING").next())
            .unwrap();
        assert!(set_list.contains(r#""title" = excluded."title""#));
        assert!(set_list.contains(r#""engagement_score" = excluded."engagement_score""#));
        assert!(set_list.contains(r#""updated_at" = excluded."updated_at""#));
        assert!(!set_list.contains(r#""id" ="#));
        assert!(!set_list.contains(r#""created_at" ="#));
    }

    #[tokio::test]
    async fn fallback_writes_rows_around_a_bad_one() {
        let mut writer = RejectingWriter::rejecting(&["https://x/2"]);
        writer.existing.insert("https://x/3".to_owned());
        let records = vec![
            record("https://x/1", "A"),
            record("https://x/2", "bad"),
            record("https://x/3", "C"),
        ];

        let summary = upsert_with_fallback(&mut writer, records).await.unwrap();

        assert_eq!(
            summary,
            UpsertSummary {
                inserted: 1,
                updated: 1,
                failed: 1,
            }
        );
        assert_eq!(writer.batch_sizes, [3, 1, 1, 1]);
    }

    #[tokio::test]
    async fn clean_batch_is_one_statement() {
        let mut writer = RejectingWriter::default();
        let records = vec![record("https://x/1", "A"), record("https://x/2", "B")];

        let summary = upsert_with_fallback(&mut writer, records).await.unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(writer.batch_sizes, [2]);
    }

    #[tokio::test]
    async fn transient_failure_is_not_retried_per_row() {
        let mut writer = RejectingWriter::rejecting(&["https://x/1"]);
        writer.transient = true;
        let records = vec![record("https://x/1", "A"), record("https://x/2", "B")];

        let err = upsert_with_fallback(&mut writer, records).await.unwrap_err();

        assert!(err.is_transient());
        assert_eq!(writer.batch_sizes, [2]);
    }

    #[tokio::test]
    async fn empty_batch_skips_the_database() {
        let mut writer = RejectingWriter::default();
        let summary = upsert_with_fallback(&mut writer, Vec::new()).await.unwrap();

        assert_eq!(summary, UpsertSummary::default());
        assert!(writer.batch_sizes.is_empty());
    }
}
