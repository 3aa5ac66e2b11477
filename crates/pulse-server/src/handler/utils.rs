//! Helpers shared by the handlers.

use crate::handler::{ErrorKind, Result};
use crate::service::ContentDomain;

/// Rejects a `{domain}` path segment naming another domain as not found.
pub(crate) fn ensure_domain(served: &ContentDomain, requested: &str) -> Result<()> {
    if served.matches(requested) {
        return Ok(());
    }

    Err(ErrorKind::NotFound
        .with_message(format!("Unknown content domain '{requested}'"))
        .with_resource("domain"))
}
