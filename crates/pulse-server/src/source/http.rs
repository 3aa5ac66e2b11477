//! Shared request helper for the JSON adapters.

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use url::Url;

use super::{SourceError, SourceResult, TRACING_TARGET};

/// Sends `request` and decodes a JSON body.
///
/// Non-2xx responses become [`SourceError::Status`]. Decoding goes through
/// `serde_json` so malformed bodies surface as [`SourceError::Decode`].
pub(super) async fn get_json<T>(request: RequestBuilder) -> SourceResult<T>
where
    T: DeserializeOwned,
{
    let response = request.send().await?;
    let status = response.status();
    let url = response.url().clone();

    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            url: redact(&url),
        });
    }

    let body = response.bytes().await?;
    tracing::trace!(
        target: TRACING_TARGET,
        url = %redact(&url),
        body_size = body.len(),
        "Received upstream response"
    );

    Ok(serde_json::from_slice(&body)?)
}

/// Parses a configured base URL.
pub(super) fn parse_base_url(raw: &str) -> SourceResult<Url> {
    Url::parse(raw).map_err(|e| SourceError::InvalidUrl {
        url: raw.to_owned(),
        reason: e.to_string(),
    })
}

/// Strips the query string, which may carry API keys.
fn redact(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

/// Truncates `text` to at most `max_chars` characters, appending an ellipsis
/// when anything was cut.
pub(super) fn truncate(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}

/// Returns `None` for blank strings.
pub(super) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 5), "héllo...");
        assert_eq!(truncate("  short  ", 10), "short");
    }

    #[test]
    fn non_empty_drops_blank() {
        assert_eq!(non_empty(Some("   ".into())), None);
        assert_eq!(non_empty(Some(" a ".into())), Some("a".into()));
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn redact_strips_query() {
        let url = Url::parse("https://example.com/v2?apiKey=secret").unwrap();
        assert_eq!(redact(&url), "https://example.com/v2");
    }
}
