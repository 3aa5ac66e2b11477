//! Scope to source resolution.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use pulse_nats::stream::Scope;

use super::{
    ContentSource, HackerNewsSource, ImgflipSource, NewsApiSource, PageRequest, RedditSource,
    SourceKind, SourcePage, SourceResult, YouTubeSource,
};

/// The upstream adapter serving a scope.
#[derive(Debug, Clone)]
pub enum SourceStrategy {
    NewsApi(NewsApiSource),
    YouTube(YouTubeSource),
    Reddit(RedditSource),
    HackerNews(HackerNewsSource),
    Imgflip(ImgflipSource),
}

impl SourceStrategy {
    /// Returns the kind of adapter.
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::NewsApi(_) => SourceKind::NewsApi,
            Self::YouTube(_) => SourceKind::YouTube,
            Self::Reddit(_) => SourceKind::Reddit,
            Self::HackerNews(_) => SourceKind::HackerNews,
            Self::Imgflip(_) => SourceKind::Imgflip,
        }
    }
}

#[async_trait]
impl ContentSource for SourceStrategy {
    fn name(&self) -> &'static str {
        match self {
            Self::NewsApi(source) => source.name(),
            Self::YouTube(source) => source.name(),
            Self::Reddit(source) => source.name(),
            Self::HackerNews(source) => source.name(),
            Self::Imgflip(source) => source.name(),
        }
    }

    async fn fetch_page(&self, scope: &Scope, page: &PageRequest) -> SourceResult<SourcePage> {
        match self {
            Self::NewsApi(source) => source.fetch_page(scope, page).await,
            Self::YouTube(source) => source.fetch_page(scope, page).await,
            Self::Reddit(source) => source.fetch_page(scope, page).await,
            Self::HackerNews(source) => source.fetch_page(scope, page).await,
            Self::Imgflip(source) => source.fetch_page(scope, page).await,
        }
    }
}

/// Maps each configured scope to the source that serves it.
///
/// Built once at startup. A scope missing from the map is not configured
/// for this service and is rejected by the coordinator and the HTTP
/// triggers alike.
#[derive(Clone, Default)]
pub struct StrategyMap {
    strategies: HashMap<Scope, Arc<dyn ContentSource>>,
}

impl StrategyMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the source for `scope`.
    pub fn with_source(mut self, scope: Scope, source: impl ContentSource + 'static) -> Self {
        self.strategies.insert(scope, Arc::new(source));
        self
    }

    /// Adds or replaces a shared source for `scope`.
    pub fn insert(&mut self, scope: Scope, source: Arc<dyn ContentSource>) {
        self.strategies.insert(scope, source);
    }

    /// Returns the source for `scope`.
    pub fn resolve(&self, scope: &Scope) -> Option<Arc<dyn ContentSource>> {
        self.strategies.get(scope).cloned()
    }

    /// Returns whether `scope` is configured.
    pub fn contains(&self, scope: &Scope) -> bool {
        self.strategies.contains_key(scope)
    }

    /// Returns every configured scope in sorted order.
    pub fn scopes(&self) -> Vec<Scope> {
        let mut scopes: Vec<Scope> = self.strategies.keys().cloned().collect();
        scopes.sort();
        scopes
    }

    /// Number of configured scopes.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns whether no scope is configured.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl fmt::Debug for StrategyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for scope in self.scopes() {
            if let Some(source) = self.strategies.get(&scope) {
                map.entry(&scope.to_string(), &source.name());
            }
        }
        map.finish()
    }
}
