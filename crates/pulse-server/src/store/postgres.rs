//! Postgres-backed content store.

use async_trait::async_trait;
use pulse_postgres::PgClient;
use pulse_postgres::model::{ContentRecord, NewContentRecord};
use pulse_postgres::query::{ContentRecordRepository, RecordFilter, UpsertSummary};
use pulse_postgres::types::{OffsetPage, OffsetPagination};

use super::{ContentStore, TRACING_TARGET};
use crate::Result;

/// [`ContentStore`] over the `content_records` table.
#[derive(Clone)]
pub struct PgStore {
    client: PgClient,
}

impl PgStore {
    /// Creates a store over an existing pool.
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }

    /// Returns the underlying client.
    #[inline]
    pub fn client(&self) -> &PgClient {
        &self.client
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn upsert_many(&self, records: Vec<NewContentRecord>) -> Result<UpsertSummary> {
        let mut conn = self.client.get_connection().await?;
        let summary = conn.upsert_content_records(records).await?;

        tracing::debug!(
            target: TRACING_TARGET,
            inserted = summary.inserted,
            updated = summary.updated,
            failed = summary.failed,
            "Upserted content records"
        );

        Ok(summary)
    }

    async fn list(
        &self,
        domain: &str,
        filter: RecordFilter,
        pagination: OffsetPagination,
    ) -> Result<OffsetPage<ContentRecord>> {
        let mut conn = self.client.get_connection().await?;
        Ok(conn.list_content_records(domain, filter, pagination).await?)
    }

    async fn find_by_key(&self, domain: &str, natural_key: &str) -> Result<Option<ContentRecord>> {
        let mut conn = self.client.get_connection().await?;
        Ok(conn.find_content_record_by_key(domain, natural_key).await?)
    }

    async fn ping(&self) -> bool {
        match self.client.ping().await {
            Ok(latency) => {
                tracing::trace!(
                    target: TRACING_TARGET,
                    latency_ms = latency.as_millis(),
                    "Store ping succeeded"
                );
                true
            }
            Err(err) => {
                tracing::warn!(target: TRACING_TARGET, error = %err, "Store ping failed");
                false
            }
        }
    }
}
