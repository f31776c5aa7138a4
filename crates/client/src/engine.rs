//! Query engine: cached, deduplicated reads.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use stocktake_core::query::decode_entity;
use stocktake_core::{Endpoint, Filter, QueryResult, Resource};
use tracing::{debug, instrument};

use crate::cache::{CacheKey, CachedPage, QueryCache};
use crate::error::ClientError;
use crate::transport::{ApiRequest, Transport};

/// Executes list reads through the shared [`QueryCache`].
pub struct QueryEngine<T: Transport> {
    transport: Arc<T>,
    cache: QueryCache,
}

impl<T: Transport> Clone for QueryEngine<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            cache: self.cache.clone(),
        }
    }
}

impl<T: Transport> fmt::Debug for QueryEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngine")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> QueryEngine<T> {
    #[must_use]
    pub const fn new(transport: Arc<T>, cache: QueryCache) -> Self {
        Self { transport, cache }
    }

    #[must_use]
    pub const fn cache(&self) -> &QueryCache {
        &self.cache
    }

    #[must_use]
    pub const fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Fetch one page of `endpoint` under `filter`.
    ///
    /// Served from cache when an entry for the same (endpoint, filter) pair
    /// exists; concurrent identical calls share one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a list.
    pub async fn fetch(&self, endpoint: &Endpoint, filter: &Filter) -> Result<CachedPage, ClientError> {
        self.fetch_key(&CacheKey::new(endpoint, filter)).await
    }

    /// Fetch and decode a typed list.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or an item does not match `R`.
    pub async fn list<R: Resource>(&self, filter: &Filter) -> Result<QueryResult<R>, ClientError> {
        let page = self.fetch(&R::endpoint(), filter).await?;
        Ok(page.decode()?)
    }

    #[instrument(skip_all, fields(key = %key))]
    pub(crate) async fn fetch_key(&self, key: &CacheKey) -> Result<CachedPage, ClientError> {
        let transport = Arc::clone(&self.transport);
        let request = list_request(key);
        self.cache
            .get_or_fetch(key, async move {
                debug!("Fetching list page");
                let body = transport.send(request).await?;
                Ok(QueryResult::from_response(body)?)
            })
            .await
    }

    /// Fetch from the network even if a cached page exists, then cache it.
    #[instrument(skip_all, fields(key = %key))]
    pub(crate) async fn refetch_key(&self, key: &CacheKey) -> Result<CachedPage, ClientError> {
        let body = self.transport.send(list_request(key)).await?;
        let page = QueryResult::from_response(body)?;
        Ok(self.cache.insert(key, page).await)
    }

    /// Fetch a single entity. Accepts `{ data: T }`, `{ <wrapper>: T }` or a
    /// bare `T`. Single-entity reads are not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body does not match `R`.
    #[instrument(skip_all, fields(endpoint = %endpoint, id = %id))]
    pub async fn get_one<R: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        id: impl fmt::Display,
        wrapper: Option<&str>,
    ) -> Result<R, ClientError> {
        let body: Value = self.transport.send(ApiRequest::get(endpoint.member(&id))).await?;
        Ok(decode_entity(body, wrapper)?)
    }
}

fn list_request(key: &CacheKey) -> ApiRequest {
    ApiRequest::get(key.endpoint().as_str()).with_query(key.params().to_vec())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use stocktake_core::filter::{CURSOR, LIMIT, PAGE, SEARCH};
    use stocktake_core::{Item, ItemId};

    use super::*;
    use crate::testing::FakeTransport;
    use crate::transport::Method;

    fn engine(transport: &Arc<FakeTransport>) -> QueryEngine<FakeTransport> {
        QueryEngine::new(Arc::clone(transport), QueryCache::new(100, Duration::from_secs(60)))
    }

    fn items() -> Endpoint {
        Endpoint::parse("/items").unwrap()
    }

    #[tokio::test]
    async fn test_identical_filters_share_one_request() {
        let transport = FakeTransport::new();
        transport
            .route(Method::Get, "/items")
            .delay(Duration::from_millis(30))
            .json(json!({"data": [{"id": 1}]}));
        let engine = engine(&transport);

        let a = Filter::new().with(LIMIT, 10).with("warehouseId", 3);
        let b = Filter::new().with("warehouseId", 3).with(LIMIT, 10);
        let endpoint = items();
        let (first, second) = tokio::join!(engine.fetch(&endpoint, &a), engine.fetch(&endpoint, &b));
        assert_eq!(first.unwrap().items.len(), 1);
        assert_eq!(second.unwrap().items.len(), 1);

        engine.fetch(&endpoint, &a).await.unwrap();
        assert_eq!(transport.count(Method::Get, "/items"), 1);
    }

    #[tokio::test]
    async fn test_different_filters_get_independent_entries() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({"data": []}));
        let engine = engine(&transport);

        engine.fetch(&items(), &Filter::new().with(PAGE, 1)).await.unwrap();
        engine.fetch(&items(), &Filter::new().with(PAGE, 2)).await.unwrap();
        assert_eq!(transport.count(Method::Get, "/items"), 2);
    }

    #[tokio::test]
    async fn test_filter_becomes_query_string() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({"data": []}));
        let engine = engine(&transport);

        engine
            .fetch(&items(), &Filter::new().with(SEARCH, "abc").with(CURSOR, ""))
            .await
            .unwrap();
        let request = transport.requests().pop().unwrap();
        assert_eq!(request.query, vec![("search".to_string(), "abc".to_string())]);
    }

    #[tokio::test]
    async fn test_pagination_is_reported_verbatim() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({
            "data": [{"id": 1}],
            "pagination": {"page": 3, "limit": 1, "total": 17, "totalPages": 99}
        }));
        let page = engine(&transport).fetch(&items(), &Filter::new()).await.unwrap();
        let pagination = page.pagination.clone().unwrap();
        assert_eq!(pagination.total, Some(17));
        assert_eq!(pagination.total_pages, Some(99));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried_on_next_read() {
        let transport = FakeTransport::new();
        transport
            .route(Method::Get, "/items")
            .fail(ClientError::Transport("connection refused".into()));
        let engine = engine(&transport);

        assert!(engine.fetch(&items(), &Filter::new()).await.unwrap_err().is_transport());
        transport.route(Method::Get, "/items").json(json!([]));
        engine.fetch(&items(), &Filter::new()).await.unwrap();
        assert_eq!(transport.count(Method::Get, "/items"), 2);
    }

    #[tokio::test]
    async fn test_refetch_bypasses_cache() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({"data": []}));
        let engine = engine(&transport);
        let key = CacheKey::new(&items(), &Filter::new());

        engine.fetch_key(&key).await.unwrap();
        engine.refetch_key(&key).await.unwrap();
        engine.fetch_key(&key).await.unwrap();
        assert_eq!(transport.count(Method::Get, "/items"), 2);
    }

    #[tokio::test]
    async fn test_typed_list_and_single_entity() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({
            "data": [{"id": 7, "code": "BOLT-M6", "name": "M6 bolt"}]
        }));
        transport
            .route(Method::Get, "/items/7")
            .json(json!({"data": {"id": 7, "code": "BOLT-M6", "name": "M6 bolt"}}));
        let engine = engine(&transport);

        let list = engine.list::<Item>(&Filter::new()).await.unwrap();
        assert_eq!(list.items[0].code, "BOLT-M6");

        let item: Item = engine.get_one(&items(), ItemId::new(7), None).await.unwrap();
        assert_eq!(item.id, ItemId::new(7));
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_a_decode_error() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({"data": [{"name": "no id"}]}));
        let err = engine(&transport).list::<Item>(&Filter::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
