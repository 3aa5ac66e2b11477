//! Source adapter configuration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use pulse_nats::stream::Scope;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::{
    ContentSource, HackerNewsSource, ImgflipSource, NewsApiSource, RedditSource, SourceStrategy,
    StrategyMap, YouTubeSource,
};
use crate::{Error, Result};

/// Which upstream API a service instance polls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SourceKind {
    /// NewsAPI top headlines.
    #[default]
    NewsApi,
    /// YouTube most-popular chart.
    #[strum(serialize = "youtube")]
    #[serde(rename = "youtube")]
    YouTube,
    /// Reddit hot listings.
    Reddit,
    /// HackerNews story lists.
    HackerNews,
    /// Imgflip popular meme templates.
    Imgflip,
}

impl SourceKind {
    /// Returns whether the upstream requires an API key.
    pub const fn requires_api_key(self) -> bool {
        matches!(self, Self::NewsApi | Self::YouTube)
    }

    /// Returns the public endpoint used when no base URL is configured.
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::NewsApi => NewsApiSource::DEFAULT_BASE_URL,
            Self::YouTube => YouTubeSource::DEFAULT_BASE_URL,
            Self::Reddit => RedditSource::DEFAULT_BASE_URL,
            Self::HackerNews => HackerNewsSource::DEFAULT_BASE_URL,
            Self::Imgflip => ImgflipSource::DEFAULT_BASE_URL,
        }
    }
}

/// Upstream API selection and HTTP client settings.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct SourceConfig {
    /// Upstream API for every scope without an override (news-api, youtube, reddit, hacker-news, imgflip)
    #[cfg_attr(
        feature = "config",
        arg(long = "source-kind", env = "SOURCE_KIND", default_value = "news-api")
    )]
    pub source_kind: SourceKind,

    /// Per-scope overrides as `scope=kind`, comma-separated (e.g. `memes=reddit,global=imgflip`)
    #[cfg_attr(
        feature = "config",
        arg(long = "source-strategies", env = "SOURCE_STRATEGIES", value_delimiter = ',')
    )]
    #[serde(default)]
    pub source_strategies: Vec<String>,

    /// API key for keyed upstreams (news-api, youtube)
    #[cfg_attr(feature = "config", arg(long = "source-api-key", env = "SOURCE_API_KEY"))]
    pub source_api_key: Option<String>,

    /// Overrides the endpoint of the `SOURCE_KIND` upstream
    #[cfg_attr(
        feature = "config",
        arg(long = "source-base-url", env = "SOURCE_BASE_URL")
    )]
    pub source_base_url: Option<String>,

    /// Upstream HTTP request timeout in seconds (1-300)
    #[cfg_attr(
        feature = "config",
        arg(
            long = "http-client-timeout-secs",
            env = "HTTP_CLIENT_TIMEOUT_SECS",
            default_value_t = DEFAULT_HTTP_TIMEOUT_SECS
        )
    )]
    pub http_client_timeout_secs: u64,
}

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const MAX_HTTP_TIMEOUT_SECS: u64 = 300;

/// Some upstreams (Reddit in particular) reject requests without one.
const USER_AGENT: &str = concat!("pulse-fetcher/", env!("CARGO_PKG_VERSION"));

impl SourceConfig {
    /// Creates a configuration for `kind` with default settings.
    pub fn new(kind: SourceKind) -> Self {
        Self {
            source_kind: kind,
            source_strategies: Vec::new(),
            source_api_key: None,
            source_base_url: None,
            http_client_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.source_api_key = Some(api_key.into());
        self
    }

    /// Overrides the upstream endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.source_base_url = Some(base_url.into());
        self
    }

    /// Serves `scope` from `kind` instead of the default kind.
    pub fn with_strategy(mut self, scope: &Scope, kind: SourceKind) -> Self {
        self.source_strategies.push(format!("{scope}={kind}"));
        self
    }

    /// Sets the HTTP client timeout.
    pub fn with_http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_client_timeout_secs = secs;
        self
    }

    /// Returns the HTTP client timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_client_timeout_secs)
    }

    /// Returns the endpoint used for `kind`.
    ///
    /// The configured override applies to the default kind only.
    pub fn base_url(&self, kind: SourceKind) -> &str {
        match self.source_base_url.as_deref() {
            Some(url) if kind == self.source_kind => url,
            _ => kind.default_base_url(),
        }
    }

    /// Parses the per-scope overrides.
    pub fn overrides(&self) -> Result<HashMap<Scope, SourceKind>> {
        let mut overrides = HashMap::new();

        for entry in self.source_strategies.iter().map(|e| e.trim()) {
            if entry.is_empty() {
                continue;
            }

            let invalid = |reason: String| {
                Error::config(format!("invalid SOURCE_STRATEGIES entry '{entry}': {reason}"))
            };
            let (scope, kind) = entry
                .split_once('=')
                .ok_or_else(|| invalid("expected scope=kind".to_owned()))?;
            let scope = scope.trim().parse::<Scope>().map_err(|e| invalid(e.to_string()))?;
            let kind = kind
                .trim()
                .parse::<SourceKind>()
                .map_err(|_| invalid(format!("unknown source kind '{}'", kind.trim())))?;

            if overrides.insert(scope.clone(), kind).is_some() {
                return Err(invalid(format!("scope '{scope}' is mapped twice")));
            }
        }

        Ok(overrides)
    }

    /// Returns every kind in use, default first.
    pub fn kinds(&self) -> Result<Vec<SourceKind>> {
        let mut kinds = vec![self.source_kind];
        for kind in self.overrides()?.into_values() {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        for kind in self.kinds()? {
            if kind.requires_api_key() && self.api_key().is_none() {
                return Err(Error::config(format!(
                    "SOURCE_API_KEY is required for source '{kind}'"
                )));
            }

            if let Err(e) = url::Url::parse(self.base_url(kind)) {
                return Err(Error::config(format!(
                    "source base url '{}' is invalid: {e}",
                    self.base_url(kind)
                )));
            }
        }

        if self.http_client_timeout_secs == 0
            || self.http_client_timeout_secs > MAX_HTTP_TIMEOUT_SECS
        {
            return Err(Error::config(format!(
                "HTTP client timeout {} seconds is invalid. Must be between 1 and {} seconds.",
                self.http_client_timeout_secs, MAX_HTTP_TIMEOUT_SECS
            )));
        }

        Ok(())
    }

    /// Builds the shared HTTP client used by the adapters.
    pub fn build_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.http_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config("failed to build HTTP client").with_source(e))
    }

    /// Builds the adapter for `kind`.
    pub fn build_source(&self, kind: SourceKind, client: Client) -> Result<SourceStrategy> {
        let base_url = self.base_url(kind);
        let api_key = self.api_key().unwrap_or_default();

        let strategy = match kind {
            SourceKind::NewsApi => {
                NewsApiSource::new(client, base_url, api_key).map(SourceStrategy::NewsApi)
            }
            SourceKind::YouTube => {
                YouTubeSource::new(client, base_url, api_key).map(SourceStrategy::YouTube)
            }
            SourceKind::Reddit => RedditSource::new(client, base_url).map(SourceStrategy::Reddit),
            SourceKind::HackerNews => {
                HackerNewsSource::new(client, base_url).map(SourceStrategy::HackerNews)
            }
            SourceKind::Imgflip => ImgflipSource::new(client, base_url).map(SourceStrategy::Imgflip),
        };

        strategy.map_err(|e| {
            Error::config(format!("failed to configure source '{kind}'")).with_source(e)
        })
    }

    /// Maps each of `scopes` to its override or to the default kind.
    ///
    /// One adapter is built per kind and shared by its scopes. An override
    /// naming a scope outside `scopes` is rejected.
    pub fn build_strategies(&self, scopes: &[Scope]) -> Result<StrategyMap> {
        self.validate()?;

        let overrides = self.overrides()?;
        if let Some(scope) = overrides.keys().find(|scope| !scopes.contains(scope)) {
            return Err(Error::config(format!(
                "SOURCE_STRATEGIES maps scope '{scope}', which is not a configured fetch scope"
            )));
        }

        let client = self.build_client()?;
        let mut sources: HashMap<SourceKind, Arc<dyn ContentSource>> = HashMap::new();
        let mut strategies = StrategyMap::new();

        for scope in scopes {
            let kind = overrides.get(scope).copied().unwrap_or(self.source_kind);
            let source = match sources.get(&kind) {
                Some(source) => Arc::clone(source),
                None => {
                    let source: Arc<dyn ContentSource> =
                        Arc::new(self.build_source(kind, client.clone())?);
                    sources.insert(kind, Arc::clone(&source));
                    source
                }
            };
            strategies.insert(scope.clone(), source);
        }

        Ok(strategies)
    }

    fn api_key(&self) -> Option<&str> {
        self.source_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::new(SourceKind::default())
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("source_kind", &self.source_kind)
            .field("source_strategies", &self.source_strategies)
            .field("source_api_key", &self.source_api_key.as_ref().map(|_| "***"))
            .field("source_base_url", &self.source_base_url)
            .field("http_client_timeout_secs", &self.http_client_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kinds() {
        assert_eq!("news-api".parse::<SourceKind>().unwrap(), SourceKind::NewsApi);
        assert_eq!("YouTube".parse::<SourceKind>().unwrap(), SourceKind::YouTube);
        assert_eq!("hacker-news".parse::<SourceKind>().unwrap(), SourceKind::HackerNews);
        assert_eq!("imgflip".parse::<SourceKind>().unwrap(), SourceKind::Imgflip);
        assert!("rss".parse::<SourceKind>().is_err());
        assert_eq!(SourceKind::YouTube.to_string(), "youtube");
    }

    #[test]
    fn keyed_sources_require_api_key() {
        assert!(SourceConfig::new(SourceKind::NewsApi).validate().is_err());
        assert!(
            SourceConfig::new(SourceKind::YouTube)
                .with_api_key("  ")
                .validate()
                .is_err()
        );
        assert!(
            SourceConfig::new(SourceKind::NewsApi)
                .with_api_key("key")
                .validate()
                .is_ok()
        );
        assert!(SourceConfig::new(SourceKind::Reddit).validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_timeout() {
        let config = SourceConfig::new(SourceKind::HackerNews).with_http_timeout_secs(0);
        assert!(config.validate().is_err());

        let config = SourceConfig::new(SourceKind::HackerNews).with_http_timeout_secs(301);
        assert!(config.validate().is_err());
    }

    fn scopes(names: &[&str]) -> Vec<Scope> {
        names.iter().map(|n| n.parse().unwrap()).collect()
    }

    #[test]
    fn base_url_override_applies_to_default_kind() {
        let config = SourceConfig::new(SourceKind::Reddit).with_base_url("http://localhost:9000");
        assert_eq!(config.base_url(SourceKind::Reddit), "http://localhost:9000");
        assert_eq!(
            config.base_url(SourceKind::Imgflip),
            ImgflipSource::DEFAULT_BASE_URL
        );
    }

    #[test]
    fn builds_mixed_strategies() {
        let mut config = SourceConfig::new(SourceKind::Reddit);
        config.source_strategies = vec![" global = imgflip ".to_owned(), "top=hacker-news".to_owned()];

        let map = config
            .build_strategies(&scopes(&["memes", "global", "top"]))
            .unwrap();

        let resolved: Vec<_> = map
            .scopes()
            .iter()
            .map(|scope| (scope.to_string(), map.resolve(scope).unwrap().name()))
            .collect();
        assert_eq!(
            resolved,
            [
                ("global".to_owned(), "imgflip"),
                ("memes".to_owned(), "reddit"),
                ("top".to_owned(), "hacker-news"),
            ]
        );
    }

    #[test]
    fn rejects_bad_overrides() {
        let fetch_scopes = scopes(&["memes", "global"]);

        for entry in ["global", "global=rss", "=imgflip", "elsewhere=imgflip"] {
            let mut config = SourceConfig::new(SourceKind::Reddit);
            config.source_strategies = vec![entry.to_owned()];
            assert!(config.build_strategies(&fetch_scopes).is_err(), "{entry}");
        }

        let config = SourceConfig::new(SourceKind::Reddit)
            .with_strategy(&fetch_scopes[1], SourceKind::Imgflip)
            .with_strategy(&fetch_scopes[1], SourceKind::HackerNews);
        assert!(config.overrides().is_err());
    }

    #[test]
    fn keyed_override_requires_api_key() {
        let config = SourceConfig::new(SourceKind::Reddit)
            .with_strategy(&"us".parse().unwrap(), SourceKind::NewsApi);
        assert!(config.validate().is_err());
        assert!(config.with_api_key("key").validate().is_ok());
    }

    #[test]
    fn debug_masks_api_key() {
        let config = SourceConfig::new(SourceKind::NewsApi).with_api_key("secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
    }
}
