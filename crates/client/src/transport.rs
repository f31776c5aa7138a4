//! HTTP transport.
//!
//! Everything above this module talks to the backend through the
//! [`Transport`] trait, which takes an [`ApiRequest`] and returns the decoded
//! JSON body. [`HttpTransport`] is the reqwest implementation.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::token::TokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    const fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// One request against the backend, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute path below the base URL, e.g. `/items/7`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    #[must_use]
    pub fn post(path: impl Into<String>, body: Option<Value>) -> Self {
        Self::new(Method::Post, path, body)
    }

    #[must_use]
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path, Some(body))
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    #[must_use]
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Value of one query parameter.
    #[must_use]
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Sends requests to the backend.
pub trait Transport: Send + Sync + 'static {
    /// Send a request and return the JSON body (`Null` for an empty body).
    ///
    /// Non-success statuses are returned as errors.
    fn send(&self, request: ApiRequest) -> impl Future<Output = Result<Value, ClientError>> + Send;
}

// =============================================================================
// HttpTransport
// =============================================================================

/// reqwest-backed [`Transport`] with bearer authentication.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

struct HttpTransportInner {
    client: reqwest::Client,
    base_url: Url,
    tokens: TokenStore,
}

impl HttpTransport {
    /// Create a transport for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, tokens: TokenStore) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("stocktake/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpTransportInner {
                client,
                base_url: config.base_url.clone(),
                tokens,
            }),
        })
    }

    fn url_for(&self, request: &ApiRequest) -> Url {
        let mut url = self.inner.base_url.clone();
        let path = format!(
            "{}/{}",
            self.inner.base_url.path().trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        url.set_path(&path);
        url.set_query(None);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        url
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.inner.base_url.as_str())
            .field("tokens", &self.inner.tokens)
            .finish_non_exhaustive()
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: ApiRequest) -> Result<Value, ClientError> {
        let url = self.url_for(&request);
        let mut builder = self.inner.client.request(request.method.as_reqwest(), url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let builder = self.inner.tokens.authorize(builder).await;

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let err = ClientError::from_status(status.as_u16(), &text);
            warn!(status = %status, error = %err, "Backend returned non-success status");
            return Err(err);
        }

        debug!(status = %status, bytes = text.len(), "Backend responded");
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            warn!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ClientError::from(e)
        })
    }
}
