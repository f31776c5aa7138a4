//! Filter store for one list view.
//!
//! The store owns the canonical [`Filter`]. When bound to a [`Location`] it
//! writes every change into the location's query string (replacing, never
//! pushing) and seeds itself from that query string once, at construction.
//! It never reads the location again afterwards.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use stocktake_core::filter::{CURSOR, LIMIT, PAGE};
use stocktake_core::{Filter, FilterPatch, FilterValue};

/// A navigable location whose query string mirrors a filter.
pub trait Location: Send + Sync + fmt::Debug {
    /// Current query string, without the leading `?`.
    fn query_string(&self) -> String;

    /// Replace the current history entry's query string.
    fn replace_query_string(&self, query: &str);
}

/// A [`Location`] held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocation {
    state: Arc<Mutex<MemoryLocationState>>,
}

#[derive(Debug, Default)]
struct MemoryLocationState {
    query: String,
    replacements: usize,
}

impl MemoryLocation {
    #[must_use]
    pub fn new(query: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryLocationState {
                query: query.trim_start_matches('?').to_string(),
                replacements: 0,
            })),
        }
    }

    /// How many times the query string has been replaced.
    #[must_use]
    pub fn replacements(&self) -> usize {
        self.lock().replacements
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryLocationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Location for MemoryLocation {
    fn query_string(&self) -> String {
        self.lock().query.clone()
    }

    fn replace_query_string(&self, query: &str) {
        let mut state = self.lock();
        query.clone_into(&mut state.query);
        state.replacements += 1;
    }
}

/// Current filters of a list view.
#[derive(Debug)]
pub struct FilterStore {
    filter: Filter,
    initial: Filter,
    location: Option<Arc<dyn Location>>,
    /// Cursors of the pages before the current one; `None` is the first page.
    cursor_trail: Vec<Option<String>>,
}

impl FilterStore {
    /// A store starting at `{limit: default_limit}` merged with `initial`.
    #[must_use]
    pub fn new(default_limit: u32, initial: Filter) -> Self {
        let mut defaults = Filter::new().with(LIMIT, default_limit);
        defaults.merge(&initial);
        Self {
            filter: defaults.clone(),
            initial: defaults,
            location: None,
            cursor_trail: Vec::new(),
        }
    }

    /// A store mirrored into `location`.
    ///
    /// Keys present in the location's query string win; `initial` only fills
    /// keys the location does not carry. The default limit is not seeded, so
    /// it stays out of the location until [`FilterStore::reset`].
    #[must_use]
    pub fn with_location(default_limit: u32, initial: Filter, location: Arc<dyn Location>) -> Self {
        let mut store = Self::new(default_limit, initial.clone());
        let mut seeded = initial;
        seeded.merge(&Filter::from_query_string(&location.query_string()));
        store.filter = seeded;
        store.location = Some(location);
        store.sync();
        store
    }

    /// Current filter snapshot.
    #[must_use]
    pub fn get(&self) -> Filter {
        self.filter.clone()
    }

    #[must_use]
    pub const fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Replace one key; an empty value clears it.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        let key = key.into();
        if key == CURSOR {
            self.cursor_trail.clear();
        }
        self.filter.set(key, value);
        self.sync();
    }

    /// Apply several changes as one update.
    pub fn set_many(&mut self, patch: &FilterPatch) {
        if patch.is_empty() {
            return;
        }
        if patch.touches(CURSOR) {
            self.cursor_trail.clear();
        }
        self.filter.apply(patch);
        self.sync();
    }

    /// Back to `{limit: default_limit}` merged with the initial filters.
    pub fn reset(&mut self) {
        self.filter = self.initial.clone();
        self.cursor_trail.clear();
        self.sync();
    }

    /// Current page, defaulting to 1.
    #[must_use]
    pub fn page(&self) -> i64 {
        self.filter.page()
    }

    pub fn go_to_page(&mut self, page: i64) {
        self.set(PAGE, page.max(1));
    }

    pub fn go_to_next_page(&mut self) {
        self.go_to_page(self.page().saturating_add(1));
    }

    /// Never goes below page 1.
    pub fn go_to_previous_page(&mut self) {
        self.go_to_page(self.page().saturating_sub(1));
    }

    /// Move to the page starting at `cursor`, remembering the current one.
    pub fn set_next_cursor(&mut self, cursor: impl Into<String>) {
        let cursor = cursor.into();
        if cursor.is_empty() {
            return;
        }
        self.cursor_trail
            .push(self.filter.cursor().map(str::to_owned));
        self.filter.set(CURSOR, cursor);
        self.sync();
    }

    /// Step back to the previously visited cursor page.
    ///
    /// Returns `false` when already on the first page.
    pub fn go_to_previous_cursor_page(&mut self) -> bool {
        let Some(previous) = self.cursor_trail.pop() else {
            return false;
        };
        match previous {
            Some(cursor) => self.filter.set(CURSOR, cursor),
            None => {
                self.filter.remove(CURSOR);
            }
        }
        self.sync();
        true
    }

    #[must_use]
    pub fn has_previous_cursor_page(&self) -> bool {
        !self.cursor_trail.is_empty()
    }

    /// Clear the cursor, and reset `page` to 1 if it is set.
    pub fn go_to_first_page(&mut self) {
        let mut patch = FilterPatch::new().clear(CURSOR);
        if self.filter.contains(PAGE) {
            patch = patch.set(PAGE, 1);
        }
        self.set_many(&patch);
    }

    fn sync(&self) {
        if let Some(location) = &self.location {
            location.replace_query_string(&self.filter.to_query_string());
        }
    }
}
