//! Extractors whose rejections are converted into handler errors.

mod enhanced_path;
mod enhanced_query;

pub use self::enhanced_path::Path;
pub use self::enhanced_query::Query;
