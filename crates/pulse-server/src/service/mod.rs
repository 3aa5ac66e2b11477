//! Application state and dependency injection.

mod config;
mod health_cache;

use std::sync::Arc;

use derive_more::{Deref, Display};
use serde::Serialize;

pub use crate::service::config::ServiceConfig;
pub use crate::service::health_cache::{HealthCache, HealthReport};
use crate::pipeline::FetchScheduler;
use crate::queue::FetchQueue;
use crate::store::ContentStore;

/// The content domain an instance serves (`news`, `video`, `viral`).
///
/// Every route is mounted under `/{domain}`; requests naming another domain
/// are rejected as not found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deref, Display, Serialize)]
#[serde(transparent)]
pub struct ContentDomain(Arc<str>);

impl ContentDomain {
    /// Creates a domain from its name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the domain name.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns whether `name` names this domain.
    #[inline]
    pub fn matches(&self, name: &str) -> bool {
        self.as_str() == name
    }
}

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Clone)]
pub struct ServiceState {
    // Identity:
    pub domain: ContentDomain,

    // External services:
    pub store: Arc<dyn ContentStore>,
    pub queue: Arc<dyn FetchQueue>,

    // Internal services:
    pub scheduler: FetchScheduler,
    pub health_cache: HealthCache,
}

impl ServiceState {
    /// Assembles the state from already-connected services.
    pub fn new(
        domain: ContentDomain,
        store: Arc<dyn ContentStore>,
        queue: Arc<dyn FetchQueue>,
        scheduler: FetchScheduler,
    ) -> Self {
        Self {
            domain,
            store,
            queue,
            scheduler,
            health_cache: HealthCache::new(),
        }
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

// External services:
impl_di!(store: Arc<dyn ContentStore>);
impl_di!(queue: Arc<dyn FetchQueue>);

// Internal services:
impl_di!(domain: ContentDomain);
impl_di!(scheduler: FetchScheduler);
impl_di!(health_cache: HealthCache);
