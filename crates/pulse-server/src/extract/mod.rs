//! Request extractors with JSON error responses.
//!
//! [`Path`] and [`Query`] are drop-in replacements for their axum
//! counterparts whose rejections render as [`handler::Error`].
//!
//! [`handler::Error`]: crate::handler::Error

mod reject;

pub use crate::extract::reject::{Path, Query};
