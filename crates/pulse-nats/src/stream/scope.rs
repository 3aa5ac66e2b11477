//! Fetch scope: the region/category pair a fetch targets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a scope string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeParseError {
    /// The region part is missing.
    #[error("scope region cannot be empty")]
    EmptyRegion,
    /// The category separator was present but nothing followed it.
    #[error("scope category cannot be empty")]
    EmptyCategory,
    /// A part contains characters outside `[a-z0-9_-]`.
    #[error("scope part '{0}' contains invalid characters")]
    InvalidCharacters(String),
}

/// Identifies a fetch target and doubles as the read-path filter.
///
/// The string form is `region` or `region:category` (for example `us` or
/// `us:10`). Both parts are normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Scope {
    region: String,
    category: Option<String>,
}

impl Scope {
    /// Creates a region-only scope.
    pub fn region(region: impl AsRef<str>) -> Result<Self, ScopeParseError> {
        Ok(Self {
            region: normalize(region.as_ref(), ScopeParseError::EmptyRegion)?,
            category: None,
        })
    }

    /// Creates a region × category scope.
    pub fn with_category(
        region: impl AsRef<str>,
        category: impl AsRef<str>,
    ) -> Result<Self, ScopeParseError> {
        Ok(Self {
            region: normalize(region.as_ref(), ScopeParseError::EmptyRegion)?,
            category: Some(normalize(
                category.as_ref(),
                ScopeParseError::EmptyCategory,
            )?),
        })
    }

    /// Returns the region part.
    #[inline]
    pub fn region_code(&self) -> &str {
        &self.region
    }

    /// Returns the category part, if any.
    #[inline]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Builds every scope of `regions × categories`, or one per region when
    /// no categories are given.
    pub fn cartesian(
        regions: &[String],
        categories: &[String],
    ) -> Result<Vec<Self>, ScopeParseError> {
        let mut scopes = Vec::with_capacity(regions.len() * categories.len().max(1));
        for region in regions {
            if categories.is_empty() {
                scopes.push(Self::region(region)?);
                continue;
            }
            for category in categories {
                scopes.push(Self::with_category(region, category)?);
            }
        }

        scopes.sort();
        scopes.dedup();
        Ok(scopes)
    }
}

fn normalize(part: &str, empty: ScopeParseError) -> Result<String, ScopeParseError> {
    let part = part.trim();
    if part.is_empty() {
        return Err(empty);
    }

    let valid = part
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ScopeParseError::InvalidCharacters(part.to_owned()));
    }

    Ok(part.to_ascii_lowercase())
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.category {
            Some(category) => write!(f, "{}:{}", self.region, category),
            None => f.write_str(&self.region),
        }
    }
}

impl FromStr for Scope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((region, category)) => Self::with_category(region, category),
            None => Self::region(s),
        }
    }
}

impl TryFrom<String> for Scope {
    type Error = ScopeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Scope> for String {
    fn from(value: Scope) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_region_and_category() {
        let scope: Scope = "US".parse().unwrap();
        assert_eq!(scope.region_code(), "us");
        assert_eq!(scope.category(), None);
        assert_eq!(scope.to_string(), "us");

        let scope: Scope = "in:10".parse().unwrap();
        assert_eq!(scope.region_code(), "in");
        assert_eq!(scope.category(), Some("10"));
        assert_eq!(scope.to_string(), "in:10");
    }

    #[test]
    fn reject_malformed_scopes() {
        assert_eq!("".parse::<Scope>(), Err(ScopeParseError::EmptyRegion));
        assert_eq!("us:".parse::<Scope>(), Err(ScopeParseError::EmptyCategory));
        assert!(matches!(
            "us.fetch".parse::<Scope>(),
            Err(ScopeParseError::InvalidCharacters(_))
        ));
        assert!("us:a:b".parse::<Scope>().is_err());
    }

    #[test]
    fn cartesian_product() {
        let regions = vec!["us".to_owned(), "in".to_owned()];
        let categories = vec!["10".to_owned(), "24".to_owned()];

        let scopes = Scope::cartesian(&regions, &categories).unwrap();
        let names: Vec<_> = scopes.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["in:10", "in:24", "us:10", "us:24"]);

        let scopes = Scope::cartesian(&regions, &[]).unwrap();
        assert_eq!(scopes.len(), 2);
    }

    #[test]
    fn serde_uses_string_form() {
        let scope = Scope::with_category("de", "memes").unwrap();
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, "\"de:memes\"");

        let back: Scope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scope);
        assert!(serde_json::from_str::<Scope>("\"\"").is_err());
    }
}
