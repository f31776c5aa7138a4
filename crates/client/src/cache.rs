//! Query cache.
//!
//! List pages are cached under a content-addressed [`CacheKey`]: the endpoint
//! plus the filter's canonical query pairs. Identical filters share a slot no
//! matter how they were built, and concurrent loads of the same slot are
//! coalesced by moka into a single fetch.
//!
//! Invalidation is per endpoint. Each endpoint has a generation counter that
//! is part of the moka key; bumping it makes every existing slot for that
//! endpoint unreachable, including slots whose fetch is still in flight.
//! Orphaned slots age out through the normal TTL and capacity limits.
//! [`QueryCache::invalidate_all`] bumps a global counter that every
//! endpoint's generation includes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;
use stocktake_core::{Endpoint, Filter, QueryResult};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// A cached list page.
pub type CachedPage = Arc<QueryResult<Value>>;

/// Structural identity of one list request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    endpoint: Endpoint,
    params: Vec<(String, String)>,
}

impl CacheKey {
    #[must_use]
    pub fn new(endpoint: &Endpoint, filter: &Filter) -> Self {
        Self {
            endpoint: endpoint.clone(),
            params: filter.to_query_pairs(),
        }
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Query pairs in canonical order.
    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.endpoint)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    key: CacheKey,
    generation: u64,
}

/// Shared cache of list pages. Cheap to clone.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<QueryCacheInner>,
}

struct QueryCacheInner {
    pages: Cache<SlotKey, CachedPage>,
    generations: RwLock<HashMap<Endpoint, u64>>,
    cleared: AtomicU64,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.pages.entry_count())
            .finish_non_exhaustive()
    }
}

impl QueryCache {
    #[must_use]
    pub fn new(max_capacity: u64, time_to_live: Duration) -> Self {
        let pages = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(time_to_live)
            .build();

        Self {
            inner: Arc::new(QueryCacheInner {
                pages,
                generations: RwLock::new(HashMap::new()),
                cleared: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.cache_capacity, config.cache_ttl)
    }

    /// Current generation of `endpoint`. It changes whenever the endpoint's
    /// cached pages are invalidated, so a page loaded under an older
    /// generation is stale.
    #[must_use]
    pub fn generation(&self, endpoint: &Endpoint) -> u64 {
        let own = self
            .inner
            .generations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(endpoint)
            .copied()
            .unwrap_or(0);
        own + self.inner.cleared.load(Ordering::Acquire)
    }

    fn slot(&self, key: &CacheKey) -> SlotKey {
        SlotKey {
            key: key.clone(),
            generation: self.generation(key.endpoint()),
        }
    }

    /// Return the cached page for `key`, running `fetch` only if there is
    /// none. Concurrent callers with the same key share one `fetch`.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; failures are not cached.
    pub async fn get_or_fetch<F>(&self, key: &CacheKey, fetch: F) -> Result<CachedPage, ClientError>
    where
        F: Future<Output = Result<QueryResult<Value>, ClientError>>,
    {
        let slot = self.slot(key);
        if let Some(page) = self.inner.pages.get(&slot).await {
            debug!(key = %key, "Cache hit");
            return Ok(page);
        }
        self.inner
            .pages
            .try_get_with(slot, async move { fetch.await.map(Arc::new) })
            .await
            .map_err(|e: Arc<ClientError>| (*e).clone())
    }

    /// Cached page for `key`, if present and not invalidated.
    pub async fn get(&self, key: &CacheKey) -> Option<CachedPage> {
        self.inner.pages.get(&self.slot(key)).await
    }

    /// Store a freshly fetched page, replacing any previous one.
    pub async fn insert(&self, key: &CacheKey, page: QueryResult<Value>) -> CachedPage {
        let page = Arc::new(page);
        self.inner.pages.insert(self.slot(key), Arc::clone(&page)).await;
        page
    }

    /// Mark every cached page of `endpoint` stale, whatever its filter.
    pub fn invalidate_endpoint(&self, endpoint: &Endpoint) {
        let mut generations = self
            .inner
            .generations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let generation = generations.entry(endpoint.clone()).or_insert(0);
        *generation += 1;
        debug!(endpoint = %endpoint, generation = *generation, "Invalidated endpoint");
    }

    /// Drop every cached page.
    pub fn invalidate_all(&self) {
        self.inner.cleared.fetch_add(1, Ordering::AcqRel);
        self.inner.pages.invalidate_all();
    }
}
