//! Shop search.
//!
//! A search runs in three steps: validate the query string into
//! [`SearchParams`], fetch one page of matching shops from the store, then
//! fetch the pickups and shipping zones of exactly those shops in two bulk
//! reads and join them in memory.

mod pagination;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use shopmap_core::ShopId;

use crate::db::{RepositoryError, ShopStore};
use crate::filters::{SearchParams, ValidationError};
use crate::models::{Pickup, Shipping, Shop};

pub use pagination::{Page, PageLinks};

/// Payment methods accepted at every shop with a pickup point.
pub const PAYMENT_METHODS: &[&str] = &[
    "Bitcoin", "Dash", "Litecoin", "Ethereum", "Ripple", "Stellar", "Nimiq",
];

/// Search errors. Either kind aborts the whole request.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

/// A shop as returned by search, with its related records attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShopView {
    #[serde(flatten)]
    pub shop: Shop,
    pub pickups: Vec<Pickup>,
    pub shippings: Vec<Shipping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepts: Option<&'static [&'static str]>,
}

impl ShopView {
    fn new(shop: Shop, pickups: Vec<Pickup>, shippings: Vec<Shipping>) -> Self {
        let accepts = (!pickups.is_empty()).then_some(PAYMENT_METHODS);
        Self {
            shop,
            pickups,
            shippings,
            accepts,
        }
    }
}

/// Runs validated searches against a [`ShopStore`].
#[derive(Clone)]
pub struct SearchService {
    store: Arc<dyn ShopStore>,
    path: String,
}

impl SearchService {
    /// `path` is the absolute URL of the search endpoint, used for page links.
    #[must_use]
    pub fn new(store: Arc<dyn ShopStore>, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// Validate a raw query string, then search.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Validation` without touching the store if the
    /// query is invalid, or `SearchError::Store` if the store fails.
    pub async fn search_query(&self, raw: Option<&str>) -> Result<Page<ShopView>, SearchError> {
        let params = SearchParams::from_query(raw)?;
        self.search(&params).await
    }

    /// Run an already validated search.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Store` if any store read fails.
    #[instrument(skip(self, params), fields(predicates = params.predicates.len(), limit = params.limit, page = params.page))]
    pub async fn search(&self, params: &SearchParams) -> Result<Page<ShopView>, SearchError> {
        let (shops, total) = self.store.search_shops(&params.to_query()).await?;

        let ids: Vec<ShopId> = shops.iter().map(|s| s.id).collect();
        let mut pickups: HashMap<ShopId, Vec<Pickup>> = HashMap::new();
        for pickup in self.store.pickups_for_shops(&ids).await? {
            pickups.entry(pickup.shop_id).or_default().push(pickup);
        }
        let mut shippings: HashMap<ShopId, Vec<Shipping>> = HashMap::new();
        for link in self.store.shippings_for_shops(&ids).await? {
            shippings.entry(link.shop_id).or_default().push(link.shipping);
        }

        let data: Vec<ShopView> = shops
            .into_iter()
            .map(|shop| {
                let id = shop.id;
                ShopView::new(
                    shop,
                    pickups.remove(&id).unwrap_or_default(),
                    shippings.remove(&id).unwrap_or_default(),
                )
            })
            .collect();

        tracing::debug!(returned = data.len(), total, "Search complete");

        let links = PageLinks::new(&self.path, &params.query_pairs);
        Ok(Page::new(data, total, params.page, params.limit, &links))
    }
}
