//! List filters.
//!
//! A [`Filter`] is the set of query constraints for one list endpoint. Keys
//! are held in sorted order, so two filters with the same content compare
//! and hash equal no matter in which order their keys were set. Empty
//! values are never stored, which means they never reach a request or a URL.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Page number (1-based).
pub const PAGE: &str = "page";
/// Page size.
pub const LIMIT: &str = "limit";
/// Sort order.
pub const ORDER: &str = "order";
/// Continuation token for cursor pagination.
pub const CURSOR: &str = "cursor";
/// Free-text search.
pub const SEARCH: &str = "search";
/// Lower date bound (ISO 8601).
pub const FROM: &str = "from";
/// Upper date bound (ISO 8601).
pub const TO: &str = "to";

/// Keys whose values are parsed as integers when read back from a URL.
const NUMERIC_KEYS: &[&str] = &[PAGE, LIMIT];

/// A scalar filter value.
///
/// Values compare and hash by their wire form, so `Int(3)` equals
/// `Text("3")`: a filter read back from a URL equals the one that wrote it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Int(i64),
    Text(String),
}

impl PartialEq for FilterValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Int(n), Self::Text(s)) | (Self::Text(s), Self::Int(n)) => *s == n.to_string(),
        }
    }
}

impl Eq for FilterValue {}

impl Hash for FilterValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Int(n) => n.to_string().hash(state),
            Self::Text(s) => s.hash(state),
        }
    }
}

impl FilterValue {
    /// Empty text counts as "no value".
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Int(_) => false,
            Self::Text(s) => s.is_empty(),
        }
    }

    /// Integer view of the value; numeric text is accepted.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Int(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<crate::types::EntityStatus> for FilterValue {
    fn from(value: crate::types::EntityStatus) -> Self {
        Self::Text(value.as_str().to_owned())
    }
}

impl From<crate::types::CheckStatus> for FilterValue {
    fn from(value: crate::types::CheckStatus) -> Self {
        Self::Text(value.to_string())
    }
}

/// Query constraints for a list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    entries: BTreeMap<String, FilterValue>,
}

impl Filter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Filter::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Replace one key. An empty value clears the key instead.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        let key = key.into();
        let value = value.into();
        if value.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<FilterValue> {
        self.entries.remove(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Current page, defaulting to 1.
    #[must_use]
    pub fn page(&self) -> i64 {
        self.get(PAGE).and_then(FilterValue::as_i64).unwrap_or(1)
    }

    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        self.get(CURSOR).and_then(FilterValue::as_str)
    }

    /// Overlay every key of `other` onto this filter.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// Apply a patch in one step.
    pub fn apply(&mut self, patch: &FilterPatch) {
        for (key, value) in &patch.changes {
            match value {
                Some(value) if !value.is_empty() => {
                    self.entries.insert(key.clone(), value.clone());
                }
                _ => {
                    self.entries.remove(key);
                }
            }
        }
    }

    /// Key/value pairs as sent on the wire, in canonical order.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }

    /// Serialize to an `application/x-www-form-urlencoded` query string.
    ///
    /// ```
    /// use stocktake_core::Filter;
    ///
    /// let filter = Filter::new().with("search", "abc").with("page", 2);
    /// assert_eq!(filter.to_query_string(), "page=2&search=abc");
    /// ```
    #[must_use]
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_query_pairs())
            .finish()
    }

    /// Parse a query string (with or without a leading `?`).
    ///
    /// `page` and `limit` become integers; a non-numeric `page`/`limit` is
    /// dropped. Every other key stays text.
    #[must_use]
    pub fn from_query_string(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut filter = Self::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let key = key.into_owned();
            if NUMERIC_KEYS.contains(&key.as_str()) {
                if let Ok(n) = value.trim().parse::<i64>() {
                    filter.set(key, n);
                }
            } else {
                filter.set(key, value.into_owned());
            }
        }
        filter
    }
}

impl<K: Into<String>, V: Into<FilterValue>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filter = Self::new();
        for (key, value) in iter {
            filter.set(key, value);
        }
        filter
    }
}

/// A set of changes applied to a [`Filter`] as one update.
///
/// `None` clears the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
    changes: BTreeMap<String, Option<FilterValue>>,
}

impl FilterPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.changes.insert(key.into(), Some(value.into()));
        self
    }

    #[must_use]
    pub fn clear(mut self, key: impl Into<String>) -> Self {
        self.changes.insert(key.into(), None);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Whether the patch sets or clears `key`.
    #[must_use]
    pub fn touches(&self, key: &str) -> bool {
        self.changes.contains_key(key)
    }
}
