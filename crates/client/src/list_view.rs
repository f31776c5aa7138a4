//! List views: a [`FilterStore`] bound to the [`QueryEngine`].
//!
//! Every filter change produces exactly one load, returned as a
//! [`LoadTicket`] tagged with the cache key it was issued for. When a ticket
//! completes after the filter has moved on, its page still lands in its own
//! cache slot but is not shown. The previous page stays visible while a new
//! one loads, and a failed load keeps it too. A ticket that is dropped or
//! whose `wait` is cancelled releases its in-flight count.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use stocktake_core::{Endpoint, Filter, FilterPatch, FilterValue, Pagination, QueryResult};
use tracing::{debug, warn};

use crate::cache::{CacheKey, CachedPage};
use crate::engine::QueryEngine;
use crate::error::ClientError;
use crate::filter_store::FilterStore;
use crate::transport::Transport;

/// What happened to a completed load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page is now the view's data.
    Applied,
    /// The filter changed while loading; the result was not shown.
    Superseded,
}

/// Point-in-time view state.
#[derive(Debug, Clone)]
pub struct ListSnapshot {
    pub filter: Filter,
    /// Last successfully loaded page, possibly for an earlier filter.
    pub data: Option<CachedPage>,
    /// Error of the latest load for the current filter.
    pub error: Option<ClientError>,
    /// Loading with nothing to show yet.
    pub is_loading: bool,
    /// A load for the current filter is in flight.
    pub is_fetching: bool,
    /// `data` belongs to an earlier filter.
    pub is_previous_data: bool,
    /// `data` was invalidated by a write since it was loaded; reload to
    /// refresh it.
    pub is_stale: bool,
}

impl ListSnapshot {
    #[must_use]
    pub fn pagination(&self) -> Option<&Pagination> {
        self.data.as_ref().and_then(|page| page.pagination.as_ref())
    }

    /// Decode the visible page into `R`.
    ///
    /// # Errors
    ///
    /// Returns an error if an item does not match `R`.
    pub fn decode<R: DeserializeOwned>(&self) -> Result<QueryResult<R>, ClientError> {
        self.data
            .as_ref()
            .map_or_else(|| Ok(QueryResult::default()), |page| Ok(page.decode()?))
    }
}

struct ListState {
    current: CacheKey,
    data: Option<CachedPage>,
    data_key: Option<CacheKey>,
    /// Cache generation `data` was loaded under.
    data_generation: u64,
    error: Option<ClientError>,
    /// Loads in flight for `current`.
    pending: usize,
    /// Bumped whenever `current` changes.
    epoch: u64,
}

struct ListQuery<T: Transport> {
    engine: QueryEngine<T>,
    state: Mutex<ListState>,
}

impl<T: Transport> ListQuery<T> {
    fn lock(&self) -> MutexGuard<'_, ListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, epoch: u64) {
        let mut state = self.lock();
        if state.epoch == epoch {
            state.pending = state.pending.saturating_sub(1);
        }
    }

    fn complete(
        &self,
        key: &CacheKey,
        epoch: u64,
        generation: u64,
        result: Result<CachedPage, ClientError>,
    ) -> Result<LoadOutcome, ClientError> {
        let mut state = self.lock();
        if state.epoch == epoch {
            state.pending = state.pending.saturating_sub(1);
        }
        if state.current != *key {
            debug!(key = %key, current = %state.current, "Discarding superseded load");
            return Ok(LoadOutcome::Superseded);
        }
        match result {
            Ok(page) => {
                state.data = Some(page);
                state.data_key = Some(key.clone());
                state.data_generation = generation;
                state.error = None;
                Ok(LoadOutcome::Applied)
            }
            Err(err) => {
                warn!(key = %key, error = %err, "List load failed; keeping previous data");
                state.error = Some(err.clone());
                Err(err)
            }
        }
    }
}

/// A pending load. Nothing is sent until [`LoadTicket::wait`] is awaited.
#[must_use = "a load does nothing until awaited"]
pub struct LoadTicket<T: Transport> {
    query: Arc<ListQuery<T>>,
    key: CacheKey,
    epoch: u64,
    bypass_cache: bool,
    settled: bool,
}

impl<T: Transport> fmt::Debug for LoadTicket<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadTicket")
            .field("key", &self.key)
            .field("bypass_cache", &self.bypass_cache)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> LoadTicket<T> {
    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Run the load and fold its result into the view.
    ///
    /// # Errors
    ///
    /// Returns the load error if the ticket is still current. Errors of
    /// superseded loads are dropped.
    pub async fn wait(mut self) -> Result<LoadOutcome, ClientError> {
        let engine = &self.query.engine;
        let generation = engine.cache().generation(self.key.endpoint());
        let result = if self.bypass_cache {
            engine.refetch_key(&self.key).await
        } else {
            engine.fetch_key(&self.key).await
        };
        self.settled = true;
        self.query.complete(&self.key, self.epoch, generation, result)
    }
}

impl<T: Transport> Drop for LoadTicket<T> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(key = %self.key, "Load abandoned");
            self.query.release(self.epoch);
        }
    }
}

/// A filtered, paginated list of one endpoint.
pub struct FilteredList<T: Transport> {
    endpoint: Endpoint,
    store: FilterStore,
    query: Arc<ListQuery<T>>,
}

impl<T: Transport> fmt::Debug for FilteredList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteredList")
            .field("endpoint", &self.endpoint)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> FilteredList<T> {
    #[must_use]
    pub fn new(engine: QueryEngine<T>, endpoint: Endpoint, store: FilterStore) -> Self {
        let current = CacheKey::new(&endpoint, store.filter());
        Self {
            endpoint,
            store,
            query: Arc::new(ListQuery {
                engine,
                state: Mutex::new(ListState {
                    current,
                    data: None,
                    data_key: None,
                    data_generation: 0,
                    error: None,
                    pending: 0,
                    epoch: 0,
                }),
            }),
        }
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[must_use]
    pub const fn filters(&self) -> &FilterStore {
        &self.store
    }

    /// Load the current filter.
    pub fn load(&mut self) -> LoadTicket<T> {
        self.issue(false)
    }

    /// Reload the current filter from the network, skipping the cache.
    pub fn refetch(&mut self) -> LoadTicket<T> {
        self.issue(true)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> LoadTicket<T> {
        self.store.set(key, value);
        self.issue(false)
    }

    pub fn set_many(&mut self, patch: &FilterPatch) -> LoadTicket<T> {
        self.store.set_many(patch);
        self.issue(false)
    }

    pub fn reset(&mut self) -> LoadTicket<T> {
        self.store.reset();
        self.issue(false)
    }

    pub fn go_to_page(&mut self, page: i64) -> LoadTicket<T> {
        self.store.go_to_page(page);
        self.issue(false)
    }

    pub fn go_to_next_page(&mut self) -> LoadTicket<T> {
        self.store.go_to_next_page();
        self.issue(false)
    }

    pub fn go_to_previous_page(&mut self) -> LoadTicket<T> {
        self.store.go_to_previous_page();
        self.issue(false)
    }

    pub fn set_next_cursor(&mut self, cursor: impl Into<String>) -> LoadTicket<T> {
        self.store.set_next_cursor(cursor);
        self.issue(false)
    }

    /// Follow the `nextCursor` of the visible page, if there is one.
    pub fn go_to_next_cursor_page(&mut self) -> Option<LoadTicket<T>> {
        let cursor = self
            .snapshot()
            .pagination()
            .and_then(|p| p.next_cursor.clone())
            .filter(|c| !c.is_empty())?;
        Some(self.set_next_cursor(cursor))
    }

    /// Step back one cursor page; `None` when already on the first page.
    pub fn go_to_previous_cursor_page(&mut self) -> Option<LoadTicket<T>> {
        self.store
            .go_to_previous_cursor_page()
            .then(|| self.issue(false))
    }

    pub fn go_to_first_page(&mut self) -> LoadTicket<T> {
        self.store.go_to_first_page();
        self.issue(false)
    }

    #[must_use]
    pub fn snapshot(&self) -> ListSnapshot {
        let state = self.query.lock();
        let is_fetching = state.pending > 0;
        let is_stale = state.data_key.as_ref().is_some_and(|k| {
            self.query.engine.cache().generation(k.endpoint()) != state.data_generation
        });
        ListSnapshot {
            filter: self.store.get(),
            data: state.data.clone(),
            error: state.error.clone(),
            is_loading: is_fetching && state.data.is_none(),
            is_fetching,
            is_previous_data: state.data_key.as_ref().is_some_and(|k| *k != state.current),
            is_stale,
        }
    }

    fn issue(&mut self, bypass_cache: bool) -> LoadTicket<T> {
        let key = CacheKey::new(&self.endpoint, self.store.filter());
        let epoch = {
            let mut state = self.query.lock();
            if state.current == key {
                state.pending += 1;
            } else {
                state.current = key.clone();
                state.pending = 1;
                state.epoch += 1;
            }
            state.error = None;
            state.epoch
        };
        LoadTicket {
            query: Arc::clone(&self.query),
            key,
            epoch,
            bypass_cache,
            settled: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use stocktake_core::filter::{CURSOR, SEARCH};

    use super::*;
    use crate::cache::QueryCache;
    use crate::mutation::MutationGateway;
    use crate::testing::FakeTransport;
    use crate::transport::Method;

    fn list(transport: &Arc<FakeTransport>) -> FilteredList<FakeTransport> {
        let engine = QueryEngine::new(Arc::clone(transport), QueryCache::new(100, Duration::from_secs(60)));
        FilteredList::new(engine, Endpoint::parse("/items").unwrap(), FilterStore::new(10, Filter::new()))
    }

    fn first_id(snapshot: &ListSnapshot) -> Option<i64> {
        snapshot.data.as_ref()?.items.first()?.get("id")?.as_i64()
    }

    #[tokio::test]
    async fn test_initial_load() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({"data": [{"id": 1}]}));
        let mut list = list(&transport);

        let ticket = list.load();
        let snapshot = list.snapshot();
        assert!(snapshot.is_loading);
        assert!(snapshot.is_fetching);

        assert_eq!(ticket.wait().await.unwrap(), LoadOutcome::Applied);
        let snapshot = list.snapshot();
        assert!(!snapshot.is_loading && !snapshot.is_fetching);
        assert_eq!(first_id(&snapshot), Some(1));
    }

    #[tokio::test]
    async fn test_previous_data_stays_visible_while_fetching() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({"data": [{"id": 1}]}));
        transport
            .route(Method::Get, "/items")
            .query("page", "2")
            .json(json!({"data": [{"id": 2}]}));
        let mut list = list(&transport);
        list.load().wait().await.unwrap();

        let ticket = list.go_to_next_page();
        let snapshot = list.snapshot();
        assert!(snapshot.is_fetching);
        assert!(!snapshot.is_loading);
        assert!(snapshot.is_previous_data);
        assert_eq!(first_id(&snapshot), Some(1));

        ticket.wait().await.unwrap();
        let snapshot = list.snapshot();
        assert!(!snapshot.is_previous_data);
        assert_eq!(first_id(&snapshot), Some(2));
    }

    #[tokio::test]
    async fn test_last_filter_wins() {
        let transport = FakeTransport::new();
        transport
            .route(Method::Get, "/items")
            .query(SEARCH, "slow")
            .delay(Duration::from_millis(80))
            .json(json!({"data": [{"id": 100}]}));
        transport
            .route(Method::Get, "/items")
            .query(SEARCH, "fast")
            .json(json!({"data": [{"id": 200}]}));
        let mut list = list(&transport);

        let slow = list.set(SEARCH, "slow");
        let fast = list.set(SEARCH, "fast");
        let (slow, fast) = tokio::join!(slow.wait(), fast.wait());
        assert_eq!(fast.unwrap(), LoadOutcome::Applied);
        assert_eq!(slow.unwrap(), LoadOutcome::Superseded);
        assert_eq!(first_id(&list.snapshot()), Some(200));

        // The superseded page still filled its own slot.
        let before = transport.total();
        list.set(SEARCH, "slow").wait().await.unwrap();
        assert_eq!(transport.total(), before);
        assert_eq!(first_id(&list.snapshot()), Some(100));
    }

    #[tokio::test]
    async fn test_error_keeps_last_good_data() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({"data": [{"id": 1}]}));
        transport
            .route(Method::Get, "/items")
            .query(SEARCH, "boom")
            .fail(ClientError::Server {
                status: 500,
                message: "database unavailable".into(),
            });
        let mut list = list(&transport);
        list.load().wait().await.unwrap();

        let err = list.set(SEARCH, "boom").wait().await.unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 500, .. }));
        let snapshot = list.snapshot();
        assert!(snapshot.error.is_some());
        assert!(!snapshot.is_fetching);
        assert_eq!(first_id(&snapshot), Some(1));

        list.set(SEARCH, "").wait().await.unwrap();
        assert!(list.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_abandoned_load_releases_fetching() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({"data": [{"id": 1}]}));
        transport
            .route(Method::Get, "/items")
            .query(SEARCH, "slow")
            .delay(Duration::from_secs(5))
            .json(json!({"data": []}));
        let mut list = list(&transport);

        drop(list.set(SEARCH, "a"));
        assert!(!list.snapshot().is_fetching);
        list.load().wait().await.unwrap();
        assert!(!list.snapshot().is_fetching);

        let ticket = list.set(SEARCH, "slow");
        assert!(list.snapshot().is_fetching);
        assert!(tokio::time::timeout(Duration::from_millis(20), ticket.wait()).await.is_err());
        let snapshot = list.snapshot();
        assert!(!snapshot.is_fetching);
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn test_old_ticket_for_revisited_filter_keeps_count() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({"data": []}));
        let mut list = list(&transport);

        let stale = list.set(SEARCH, "a");
        drop(list.set(SEARCH, "b"));
        let current = list.set(SEARCH, "a");
        stale.wait().await.unwrap();
        assert!(list.snapshot().is_fetching);
        current.wait().await.unwrap();
        assert!(!list.snapshot().is_fetching);
    }

    #[tokio::test]
    async fn test_retry_clears_previous_error() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").fail(ClientError::Timeout);
        let mut list = list(&transport);

        assert!(list.load().wait().await.is_err());
        assert!(list.snapshot().error.is_some());

        let retry = list.load();
        let snapshot = list.snapshot();
        assert!(snapshot.error.is_none());
        assert!(snapshot.is_fetching);
        assert!(retry.wait().await.is_err());
        assert!(list.snapshot().error.is_some());
    }

    #[tokio::test]
    async fn test_write_marks_page_stale_until_reload() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({"data": [{"id": 7}]}));
        transport.route(Method::Put, "/bins/1").json(json!({}));
        transport.route(Method::Put, "/items/7").json(json!({}));
        let cache = QueryCache::new(100, Duration::from_secs(60));
        let engine = QueryEngine::new(Arc::clone(&transport), cache.clone());
        let gateway = MutationGateway::new(Arc::clone(&transport), cache);
        let items = Endpoint::parse("/items").unwrap();
        let mut list = FilteredList::new(engine, items.clone(), FilterStore::new(10, Filter::new()));

        list.load().wait().await.unwrap();
        assert!(!list.snapshot().is_stale);

        gateway.update(&Endpoint::parse("/bins").unwrap(), 1, &json!({})).await.unwrap();
        assert!(!list.snapshot().is_stale);

        gateway.update(&items, 7, &json!({"name": "Bolt"})).await.unwrap();
        let snapshot = list.snapshot();
        assert!(snapshot.is_stale);
        assert!(!snapshot.is_previous_data);
        assert_eq!(first_id(&snapshot), Some(7));

        list.load().wait().await.unwrap();
        assert!(!list.snapshot().is_stale);
        assert_eq!(transport.count(Method::Get, "/items"), 2);
    }

    #[tokio::test]
    async fn test_refetch_goes_to_network() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({"data": []}));
        let mut list = list(&transport);

        list.load().wait().await.unwrap();
        list.load().wait().await.unwrap();
        assert_eq!(transport.count(Method::Get, "/items"), 1);
        list.refetch().wait().await.unwrap();
        assert_eq!(transport.count(Method::Get, "/items"), 2);
    }

    #[tokio::test]
    async fn test_cursor_navigation() {
        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({
            "data": [{"id": 1}], "pagination": {"nextCursor": "c1"}
        }));
        transport.route(Method::Get, "/items").query(CURSOR, "c1").json(json!({
            "data": [{"id": 2}], "pagination": {"nextCursor": null}
        }));
        let mut list = list(&transport);
        list.load().wait().await.unwrap();

        list.go_to_next_cursor_page().unwrap().wait().await.unwrap();
        assert_eq!(first_id(&list.snapshot()), Some(2));
        assert!(list.go_to_next_cursor_page().is_none());

        list.go_to_previous_cursor_page().unwrap().wait().await.unwrap();
        assert_eq!(first_id(&list.snapshot()), Some(1));
        assert!(list.go_to_previous_cursor_page().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_decodes_items() {
        #[derive(serde::Deserialize)]
        struct Row {
            id: i64,
        }

        let transport = FakeTransport::new();
        transport.route(Method::Get, "/items").json(json!({"data": [{"id": 5}, {"id": 6}]}));
        let mut list = list(&transport);
        assert!(list.snapshot().decode::<Row>().unwrap().items.is_empty());

        list.load().wait().await.unwrap();
        let rows: Vec<i64> = list.snapshot().decode::<Row>().unwrap().items.iter().map(|r| r.id).collect();
        assert_eq!(rows, vec![5, 6]);
    }
}
