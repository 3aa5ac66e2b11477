//! Repository traits implemented on [`PgConnection`](crate::PgConnection).

mod content_record;

pub use content_record::{ContentRecordRepository, RecordFilter, UpsertSummary};
