//! Mutation gateway: writes that invalidate cached reads.
//!
//! A successful write against an endpoint invalidates every cached page of
//! that endpoint regardless of filter. A failed write leaves the cache alone.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use stocktake_core::{Endpoint, EntityStatus};
use tracing::{debug, instrument, warn};

use crate::cache::QueryCache;
use crate::error::ClientError;
use crate::transport::{ApiRequest, Transport};

pub struct MutationGateway<T: Transport> {
    transport: Arc<T>,
    cache: QueryCache,
}

impl<T: Transport> Clone for MutationGateway<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            cache: self.cache.clone(),
        }
    }
}

impl<T: Transport> fmt::Debug for MutationGateway<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationGateway").finish_non_exhaustive()
    }
}

impl<T: Transport> MutationGateway<T> {
    #[must_use]
    pub const fn new(transport: Arc<T>, cache: QueryCache) -> Self {
        Self { transport, cache }
    }

    /// `POST /{entity}`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded or the server rejects it.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn create<P: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        payload: &P,
    ) -> Result<Value, ClientError> {
        let body = serde_json::to_value(payload)?;
        self.execute(endpoint, ApiRequest::post(endpoint.as_str(), Some(body)))
            .await
    }

    /// `PUT /{entity}/{id}` with a partial payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded or the server rejects it.
    #[instrument(skip_all, fields(endpoint = %endpoint, id = %id))]
    pub async fn update<P: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        id: impl fmt::Display,
        payload: &P,
    ) -> Result<Value, ClientError> {
        let body = serde_json::to_value(payload)?;
        self.execute(endpoint, ApiRequest::put(endpoint.member(&id), body))
            .await
    }

    /// `DELETE /{entity}/{id}`. Logical where the entity has a status.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the delete.
    #[instrument(skip_all, fields(endpoint = %endpoint, id = %id))]
    pub async fn remove(&self, endpoint: &Endpoint, id: impl fmt::Display) -> Result<Value, ClientError> {
        self.execute(endpoint, ApiRequest::delete(endpoint.member(&id)))
            .await
    }

    /// Reverse a logical delete by setting `status` back to `active`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the update.
    pub async fn restore(&self, endpoint: &Endpoint, id: impl fmt::Display) -> Result<Value, ClientError> {
        self.update(endpoint, id, &json!({ "status": EntityStatus::Active }))
            .await
    }

    /// `POST /{entity}/{sub_path}` for transitions that are not plain CRUD,
    /// such as `/inventory-checks/7/complete`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the action.
    #[instrument(skip_all, fields(endpoint = %endpoint, action = sub_path))]
    pub async fn post_action(
        &self,
        endpoint: &Endpoint,
        sub_path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.execute(endpoint, ApiRequest::post(endpoint.child(sub_path), body))
            .await
    }

    async fn execute(&self, endpoint: &Endpoint, request: ApiRequest) -> Result<Value, ClientError> {
        match self.transport.send(request).await {
            Ok(body) => {
                self.cache.invalidate_endpoint(endpoint);
                debug!("Mutation succeeded");
                Ok(body)
            }
            Err(err) => {
                warn!(error = %err, "Mutation failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use stocktake_core::filter::{PAGE, SEARCH};
    use stocktake_core::{Filter, ItemId};

    use super::*;
    use crate::engine::QueryEngine;
    use crate::testing::FakeTransport;
    use crate::transport::Method;

    fn setup() -> (Arc<FakeTransport>, QueryEngine<FakeTransport>, MutationGateway<FakeTransport>) {
        let transport = FakeTransport::new();
        let cache = QueryCache::new(100, Duration::from_secs(60));
        let engine = QueryEngine::new(Arc::clone(&transport), cache.clone());
        let gateway = MutationGateway::new(Arc::clone(&transport), cache);
        (transport, engine, gateway)
    }

    #[tokio::test]
    async fn test_update_invalidates_every_filtered_view() {
        let (transport, engine, gateway) = setup();
        transport.route(Method::Get, "/items").json(json!({"data": []}));
        transport.route(Method::Get, "/bins").json(json!({"data": []}));
        transport.route(Method::Put, "/items/7").json(json!({"data": {"id": 7}}));

        let items = Endpoint::parse("/items").unwrap();
        let bins = Endpoint::parse("/bins").unwrap();
        let filters = [
            Filter::new(),
            Filter::new().with(PAGE, 2),
            Filter::new().with(SEARCH, "bolt").with("status", "active"),
        ];
        for filter in &filters {
            engine.fetch(&items, filter).await.unwrap();
        }
        engine.fetch(&bins, &Filter::new()).await.unwrap();

        gateway
            .update(&items, ItemId::new(7), &json!({"name": "M6 bolt"}))
            .await
            .unwrap();

        for filter in &filters {
            engine.fetch(&items, filter).await.unwrap();
        }
        engine.fetch(&bins, &Filter::new()).await.unwrap();
        assert_eq!(transport.count(Method::Get, "/items"), 6);
        assert_eq!(transport.count(Method::Get, "/bins"), 1);
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_cache() {
        let (transport, engine, gateway) = setup();
        transport.route(Method::Get, "/items").json(json!({"data": []}));
        transport.route(Method::Post, "/items").fail(ClientError::Validation {
            status: 400,
            message: "code is required".into(),
        });
        let items = Endpoint::parse("/items").unwrap();

        engine.fetch(&items, &Filter::new()).await.unwrap();
        let err = gateway.create(&items, &json!({"name": "x"})).await.unwrap_err();
        assert_eq!(err.to_string(), "code is required");
        engine.fetch(&items, &Filter::new()).await.unwrap();
        assert_eq!(transport.count(Method::Get, "/items"), 1);
    }

    #[tokio::test]
    async fn test_restore_sets_status_active() {
        let (transport, _, gateway) = setup();
        transport.route(Method::Put, "/partners/5").json(json!({"data": {"id": 5}}));
        let partners = Endpoint::parse("/partners").unwrap();

        gateway.restore(&partners, 5).await.unwrap();
        let request = transport.requests().pop().unwrap();
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.body, Some(json!({"status": "active"})));
    }

    #[tokio::test]
    async fn test_remove_and_actions_hit_member_paths() {
        let (transport, _, gateway) = setup();
        transport.route(Method::Delete, "/warehouses/3").json(json!({}));
        transport.route(Method::Post, "/inventory-checks/9/complete").json(json!({}));
        let warehouses = Endpoint::parse("/warehouses").unwrap();
        let checks = Endpoint::parse("/inventory-checks").unwrap();

        gateway.remove(&warehouses, 3).await.unwrap();
        gateway.post_action(&checks, "9/complete", None).await.unwrap();
        assert_eq!(transport.count(Method::Delete, "/warehouses/3"), 1);
        assert_eq!(transport.count(Method::Post, "/inventory-checks/9/complete"), 1);
    }
}
