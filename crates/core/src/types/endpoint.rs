//! REST endpoint paths.

use core::fmt;
use std::sync::Arc;

/// Errors that can occur when parsing an [`Endpoint`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// The path is empty or only slashes.
    #[error("endpoint path cannot be empty")]
    Empty,
    /// The path carries a query string or fragment.
    #[error("endpoint path must not contain '?' or '#': {0}")]
    QueryInPath(String),
}

/// A collection endpoint such as `/items` or `/inventory-checks`.
///
/// Endpoints are the unit of cache identity and invalidation. The stored
/// path always starts with exactly one `/` and never ends with one, so
/// `items`, `/items` and `/items/` are the same endpoint.
///
/// ```
/// use stocktake_core::Endpoint;
///
/// let items = Endpoint::parse("items/").unwrap();
/// assert_eq!(items.as_str(), "/items");
/// assert_eq!(items.member(7), "/items/7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(Arc<str>);

impl Endpoint {
    /// Parse an `Endpoint` from a path.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty or contains a query string.
    pub fn parse(path: &str) -> Result<Self, EndpointError> {
        if path.contains(['?', '#']) {
            return Err(EndpointError::QueryInPath(path.to_owned()));
        }
        let trimmed = path.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(EndpointError::Empty);
        }
        Ok(Self(Arc::from(format!("/{trimmed}"))))
    }

    /// Build an endpoint from a path known at compile time.
    ///
    /// Normalises slashes like [`Endpoint::parse`]; an empty path becomes `/`.
    #[must_use]
    pub fn from_static(path: &'static str) -> Self {
        Self(Arc::from(format!("/{}", path.trim_matches('/'))))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of a single member, e.g. `/items/7`.
    #[must_use]
    pub fn member(&self, id: impl fmt::Display) -> String {
        format!("{}/{id}", self.0)
    }

    /// Path below the collection, e.g. `/inventory-checks/process-discrepancy`.
    #[must_use]
    pub fn child(&self, segment: &str) -> String {
        format!("{}/{}", self.0, segment.trim_matches('/'))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
