//! Response envelopes for list and single-entity endpoints.
//!
//! The backend is not consistent about wrapping: lists arrive as
//! `{ data: [...], pagination?, meta? }` (sometimes as a bare array) and single
//! entities as `{ data: T }` or a bare `T`. Everything is normalised here so
//! callers only ever see [`QueryResult`] or the entity type itself.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pagination block reported by the server, passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub total: Option<u64>,
    pub total_pages: Option<u64>,
    pub next_cursor: Option<String>,
}

impl Pagination {
    /// Whether the server reported another page after this one.
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        if self.next_cursor.as_deref().is_some_and(|c| !c.is_empty()) {
            return true;
        }
        matches!((self.page, self.total_pages), (Some(page), Some(total)) if page < total)
    }
}

/// One page of a list endpoint.
///
/// Replaced wholesale on every successful fetch; never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult<T> {
    pub items: Vec<T>,
    pub pagination: Option<Pagination>,
    pub meta: Option<Value>,
}

impl<T> Default for QueryResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            pagination: None,
            meta: None,
        }
    }
}

#[derive(Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    pagination: Option<Pagination>,
    #[serde(default)]
    meta: Option<Value>,
}

impl QueryResult<Value> {
    /// Normalise a raw list response.
    ///
    /// When only `meta` is present, pagination is read from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is neither an array nor an object whose
    /// `data` is an array.
    pub fn from_response(body: Value) -> Result<Self, serde_json::Error> {
        if let Value::Array(items) = body {
            return Ok(Self {
                items,
                pagination: None,
                meta: None,
            });
        }

        let envelope: ListEnvelope = serde_json::from_value(body)?;
        let items = match envelope.data {
            Some(Value::Array(items)) => items,
            None | Some(Value::Null) => Vec::new(),
            Some(other) => {
                return Err(serde::de::Error::invalid_type(
                    unexpected(&other),
                    &"an array of list items",
                ));
            }
        };
        let pagination = envelope.pagination.or_else(|| {
            envelope
                .meta
                .as_ref()
                .filter(|m| m.is_object())
                .and_then(|m| serde_json::from_value(m.clone()).ok())
        });

        Ok(Self {
            items,
            pagination,
            meta: envelope.meta,
        })
    }

    /// Decode every item into a typed schema.
    ///
    /// # Errors
    ///
    /// Returns the first item that does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<QueryResult<T>, serde_json::Error> {
        let items = self
            .items
            .iter()
            .cloned()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?;
        Ok(QueryResult {
            items,
            pagination: self.pagination.clone(),
            meta: self.meta.clone(),
        })
    }
}

/// Decode a single entity from `{ data: T }`, `{ <wrapper>: T }` or a bare `T`.
///
/// # Errors
///
/// Returns an error if none of the shapes match `T`.
pub fn decode_entity<T: DeserializeOwned>(
    body: Value,
    wrapper: Option<&str>,
) -> Result<T, serde_json::Error> {
    if let Value::Object(map) = &body {
        for key in wrapper.into_iter().chain(std::iter::once("data")) {
            if let Some(inner) = map.get(key)
                && inner.is_object()
                && let Ok(value) = serde_json::from_value(inner.clone())
            {
                return Ok(value);
            }
        }
    }
    serde_json::from_value(body)
}

fn unexpected(value: &Value) -> serde::de::Unexpected<'_> {
    use serde::de::Unexpected;
    match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    }
}
