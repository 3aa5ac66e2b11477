//! JetStream work queue for distributed fetch processing.
//!
//! This module provides:
//!
//! - The per-domain [`FetchStream`] declaration (work-queue retention)
//! - The wire payloads exchanged over it
//! - A typed publisher and a typed durable pull subscriber

mod fetch_request;
mod fetch_result;
mod fetch_stream;
mod publisher;
mod scope;
mod subscriber;

pub use fetch_request::{FetchRequest, Priority};
pub use fetch_result::{DeadLetter, FetchResult};
pub use fetch_stream::FetchStream;
pub use publisher::{PublishReceipt, StreamPublisher};
pub use scope::{Scope, ScopeParseError};
pub use subscriber::{StreamSubscriber, TypedMessage, TypedMessageStream};
