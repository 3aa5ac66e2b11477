//! Response types for HTTP handlers.

mod error_response;
mod fetch;
mod items;
mod monitors;

pub use error_response::ErrorResponse;
pub use fetch::*;
pub use items::*;
pub use monitors::*;
