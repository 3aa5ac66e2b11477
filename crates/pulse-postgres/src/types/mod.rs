//! Query parameter and result types.

mod pagination;

pub use pagination::{OffsetPage, OffsetPagination};
