//! Item listing and lookup request types.

use pulse_nats::stream::Scope;
use pulse_postgres::query::RecordFilter;
use pulse_postgres::types::OffsetPagination;
use serde::{Deserialize, Serialize};

use crate::handler::{ErrorKind, Result};

/// Query parameters for listing items.
#[must_use]
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ListItems {
    /// Restricts the listing to a region (`us`) or to one category of a
    /// region (`us:10`).
    pub scope: Option<String>,
    /// 1-based page number.
    pub page: Option<i64>,
    /// Page size.
    pub limit: Option<i64>,
}

impl ListItems {
    /// Default page size.
    pub const DEFAULT_LIMIT: i64 = 20;
    /// Largest accepted page size.
    pub const MAX_LIMIT: i64 = 100;

    /// Returns the page number, at least 1.
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Returns the page size clamped to `1..=100`.
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    /// Returns the pagination, counting the total.
    pub fn pagination(&self) -> OffsetPagination {
        OffsetPagination::from_page(self.page(), self.limit()).with_count()
    }

    /// Parses the scope into a store filter.
    ///
    /// A bare region matches every category of that region; a scope with a
    /// category matches that exact scope.
    pub fn filter(&self) -> Result<RecordFilter> {
        let Some(raw) = self.scope.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Ok(RecordFilter::All);
        };

        let scope = raw.parse::<Scope>().map_err(|e| {
            ErrorKind::BadRequest
                .with_message("Invalid scope")
                .with_resource("scope")
                .with_context(e.to_string())
        })?;

        Ok(match scope.category() {
            Some(_) => RecordFilter::Scope(scope.to_string()),
            None => RecordFilter::Region(scope.region_code().to_owned()),
        })
    }
}

/// Query parameters for a natural key lookup.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupItem {
    /// Canonical URL or source-native identifier.
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(scope: Option<&str>, page: Option<i64>, limit: Option<i64>) -> ListItems {
        ListItems {
            scope: scope.map(str::to_owned),
            page,
            limit,
        }
    }

    #[test]
    fn defaults_and_clamping() {
        let params = query(None, None, None);
        assert_eq!((params.page(), params.limit()), (1, 20));

        let params = query(None, Some(0), Some(500));
        assert_eq!((params.page(), params.limit()), (1, 100));

        let pagination = query(None, Some(2), Some(20)).pagination();
        assert_eq!(pagination.offset, 20);
        assert!(pagination.include_count);
    }

    #[test]
    fn scope_filters() {
        assert_eq!(query(None, None, None).filter().unwrap(), RecordFilter::All);
        assert_eq!(
            query(Some("us"), None, None).filter().unwrap(),
            RecordFilter::Region("us".to_owned())
        );
        assert_eq!(
            query(Some("us:10"), None, None).filter().unwrap(),
            RecordFilter::Scope("us:10".to_owned())
        );
        assert_eq!(
            query(Some(":10"), None, None).filter().unwrap_err().kind(),
            ErrorKind::BadRequest
        );
    }
}
