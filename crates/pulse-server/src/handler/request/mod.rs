//! Request types for HTTP handlers.

mod fetch;
mod items;
mod paths;

pub use fetch::*;
pub use items::*;
pub use paths::*;
