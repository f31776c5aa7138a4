//! Top-level client wiring transport, cache, list views and the check
//! workflow together.

use std::fmt;
use std::sync::Arc;

use stocktake_core::{Endpoint, Filter};

use crate::cache::QueryCache;
use crate::config::ClientConfig;
use crate::engine::QueryEngine;
use crate::error::ClientError;
use crate::filter_store::{FilterStore, Location};
use crate::list_view::FilteredList;
use crate::mutation::MutationGateway;
use crate::reconciliation::CheckWorkflow;
use crate::token::TokenStore;
use crate::transport::{HttpTransport, Transport};

// =============================================================================
// InventoryClient
// =============================================================================

/// Entry point to the inventory backend.
///
/// Cheap to clone; clones share the transport, the query cache and the
/// token store.
pub struct InventoryClient<T: Transport = HttpTransport> {
    inner: Arc<InventoryClientInner<T>>,
}

struct InventoryClientInner<T: Transport> {
    config: ClientConfig,
    tokens: TokenStore,
    engine: QueryEngine<T>,
    gateway: MutationGateway<T>,
}

impl<T: Transport> Clone for InventoryClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> fmt::Debug for InventoryClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InventoryClient")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("tokens", &self.inner.tokens)
            .finish_non_exhaustive()
    }
}

impl InventoryClient<HttpTransport> {
    /// Connect over HTTP, loading the bearer token from `config.token_file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token file cannot be read or the HTTP client
    /// cannot be built.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let tokens = TokenStore::load(&config.token_file).await?;
        let transport = HttpTransport::new(&config, tokens.clone())?;
        Ok(Self::with_transport(config, tokens, Arc::new(transport)))
    }
}

impl<T: Transport> InventoryClient<T> {
    #[must_use]
    pub fn with_transport(config: ClientConfig, tokens: TokenStore, transport: Arc<T>) -> Self {
        let cache = QueryCache::from_config(&config);
        Self {
            inner: Arc::new(InventoryClientInner {
                engine: QueryEngine::new(Arc::clone(&transport), cache.clone()),
                gateway: MutationGateway::new(transport, cache),
                config,
                tokens,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    #[must_use]
    pub fn engine(&self) -> &QueryEngine<T> {
        &self.inner.engine
    }

    #[must_use]
    pub fn gateway(&self) -> &MutationGateway<T> {
        &self.inner.gateway
    }

    /// A list view over `endpoint` using the configured default limit.
    #[must_use]
    pub fn list_view(&self, endpoint: Endpoint, initial: Filter) -> FilteredList<T> {
        let store = FilterStore::new(self.inner.config.default_limit, initial);
        FilteredList::new(self.inner.engine.clone(), endpoint, store)
    }

    /// A list view whose filters are mirrored into `location`.
    #[must_use]
    pub fn list_view_with_location(
        &self,
        endpoint: Endpoint,
        initial: Filter,
        location: Arc<dyn Location>,
    ) -> FilteredList<T> {
        let store = FilterStore::with_location(self.inner.config.default_limit, initial, location);
        FilteredList::new(self.inner.engine.clone(), endpoint, store)
    }

    #[must_use]
    pub fn checks(&self) -> CheckWorkflow<T> {
        CheckWorkflow::new(
            self.inner.engine.clone(),
            self.inner.gateway.clone(),
            self.inner.config.resolution_policy,
        )
    }

    /// Drop every cached page, e.g. after switching accounts.
    pub fn clear_cache(&self) {
        self.inner.engine.cache().invalidate_all();
    }
}
