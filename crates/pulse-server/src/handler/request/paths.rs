//! Path parameter types for HTTP handlers.

use serde::{Deserialize, Serialize};

/// Path parameters for domain-level operations.
#[must_use]
#[derive(Debug, Serialize, Deserialize)]
pub struct DomainPathParams {
    /// Content domain named in the URL.
    pub domain: String,
}

/// Path parameters for scope-level operations.
///
/// The scope stays a string so a malformed scope is reported after the
/// domain check, as a `400` naming the scope.
#[must_use]
#[derive(Debug, Serialize, Deserialize)]
pub struct ScopePathParams {
    /// Content domain named in the URL.
    pub domain: String,
    /// Scope in `region` or `region:category` form.
    pub scope: String,
}
