//! Application state shared across handlers.

use std::sync::Arc;

use crate::db::ShopStore;
use crate::search::SearchService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The store is the only shared
/// resource; there is no cache.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn ShopStore>,
    search: SearchService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `store` - Shop persistence
    /// * `search_url` - Absolute URL of the search endpoint, used in page links
    #[must_use]
    pub fn new(store: Arc<dyn ShopStore>, search_url: impl Into<String>) -> Self {
        let search = SearchService::new(Arc::clone(&store), search_url);

        Self {
            inner: Arc::new(AppStateInner { store, search }),
        }
    }

    /// Get a reference to the shop store.
    #[must_use]
    pub fn store(&self) -> &dyn ShopStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the search service.
    #[must_use]
    pub fn search(&self) -> &SearchService {
        &self.inner.search
    }
}
