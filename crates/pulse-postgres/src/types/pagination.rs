//! Offset pagination for list queries.

use serde::{Deserialize, Serialize};

/// `LIMIT`/`OFFSET` window over a list query.
///
/// Callers clamp the page size; this type only keeps the window non-empty
/// and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetPagination {
    pub limit: i64,
    pub offset: i64,
    /// Also count every matching row.
    #[serde(default)]
    pub include_count: bool,
}

impl OffsetPagination {
    /// Window for the 1-based `page` of `page_size` rows.
    pub fn from_page(page: i64, page_size: i64) -> Self {
        let limit = page_size.max(1);
        Self {
            limit,
            offset: (page.max(1) - 1).saturating_mul(limit),
            include_count: false,
        }
    }

    /// Requests the total count alongside the rows.
    pub fn with_count(mut self) -> Self {
        self.include_count = true;
        self
    }
}

impl Default for OffsetPagination {
    fn default() -> Self {
        Self::from_page(1, 20)
    }
}

/// Rows of one window, plus the total when it was requested.
#[derive(Debug, Clone)]
pub struct OffsetPage<T> {
    pub items: Vec<T>,
    pub total: Option<i64>,
}

impl<T> OffsetPage<T> {
    pub fn new(items: Vec<T>, total: Option<i64>) -> Self {
        Self { items, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window() {
        let pagination = OffsetPagination::from_page(3, 25);
        assert_eq!((pagination.limit, pagination.offset), (25, 50));
        assert!(!pagination.include_count);
        assert!(pagination.with_count().include_count);
    }

    #[test]
    fn non_positive_inputs_fall_back_to_first_row() {
        let pagination = OffsetPagination::from_page(0, 0);
        assert_eq!((pagination.limit, pagination.offset), (1, 0));

        let pagination = OffsetPagination::from_page(-4, 10);
        assert_eq!(pagination.offset, 0);
    }
}
