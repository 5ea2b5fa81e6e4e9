//! Integration tests for shopmap.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopmap-integration-tests
//! ```
//!
//! Everything runs in-process: the directory's in-memory store stands in for
//! `PostGIS`, and the scripted providers below stand in for Google Maps.
//!
//! # Test Categories
//!
//! - `search_flow` - Filter parsing through paginated search results
//! - `import_flow` - Batch reconciliation, geocoding fallback, row isolation

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

use shopmap_core::{ExternalKey, GeoPoint, ShopId, UserId};
use shopmap_directory::db::{MemoryShopStore, RepositoryError, ShopQuery, ShopStore};
use shopmap_directory::geocoding::{
    CoordinateGeocoder, Geocode, GeocodingError, LocationResolver, PlaceProvider,
};
use shopmap_directory::models::{
    NewPickup, NewShop, Pickup, ShippingLink, Shop, ShopFields,
};

/// Geocoder answering from a fixed table; unknown inputs are not found.
#[derive(Default)]
pub struct ScriptedGeocoder {
    answers: HashMap<String, Geocode>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedGeocoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn answer(mut self, input: &str, geocode: Geocode) -> Self {
        self.answers.insert(input.to_string(), geocode);
        self
    }

    /// Make lookups for `input` fail with an API error.
    #[must_use]
    pub fn fail(mut self, input: &str) -> Self {
        self.failing.insert(input.to_string());
        self
    }

    /// Inputs seen so far, in call order.
    ///
    /// # Panics
    ///
    /// Panics if the call log lock is poisoned.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CoordinateGeocoder for ScriptedGeocoder {
    #[allow(clippy::unwrap_used)]
    async fn geocode(&self, address: &str) -> Result<Geocode, GeocodingError> {
        self.calls.lock().unwrap().push(address.to_string());
        if self.failing.contains(address) {
            return Err(GeocodingError::Api {
                status: "OVER_QUERY_LIMIT".to_string(),
                message: "quota exceeded".to_string(),
            });
        }
        Ok(self
            .answers
            .get(address)
            .copied()
            .unwrap_or_else(Geocode::not_found))
    }
}

/// Place provider that finds every input, unless told otherwise.
///
/// Place ids are `place:<input>`; details carry reviews and two photos so
/// trimming is observable.
#[derive(Default)]
pub struct ScriptedPlaces {
    unknown: HashSet<String>,
    stall: bool,
}

impl ScriptedPlaces {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report no candidate for `input`.
    #[must_use]
    pub fn unknown(mut self, input: &str) -> Self {
        self.unknown.insert(input.to_string());
        self
    }

    /// Never answer a place search.
    #[must_use]
    pub const fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }
}

#[async_trait]
impl PlaceProvider for ScriptedPlaces {
    async fn find_place(&self, input: &str) -> Result<Option<String>, GeocodingError> {
        if self.stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.unknown.contains(input) {
            return Ok(None);
        }
        Ok(Some(format!("place:{input}")))
    }

    async fn place_details(&self, place_id: &str) -> Result<JsonValue, GeocodingError> {
        Ok(json!({
            "place_id": place_id,
            "name": place_id.trim_start_matches("place:"),
            "reviews": [{"rating": 5}],
            "photos": [{"photo_reference": "a"}, {"photo_reference": "b"}],
        }))
    }
}

/// Resolver over the scripted providers with a short per-call timeout.
#[must_use]
pub fn resolver(geocoder: Arc<ScriptedGeocoder>, places: ScriptedPlaces) -> Arc<LocationResolver> {
    Arc::new(LocationResolver::new(
        geocoder,
        Arc::new(places),
        Duration::from_millis(250),
    ))
}

/// Point literal for tests.
///
/// # Panics
///
/// Panics on out-of-range coordinates.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn point(lat: f64, lng: f64) -> GeoPoint {
    GeoPoint::new(lat, lng).unwrap()
}

/// Create a shop owned by user 1, optionally with a pickup at `at`.
///
/// # Panics
///
/// Panics if the store rejects the shop.
#[allow(clippy::unwrap_used)]
pub async fn seed_shop(
    store: &MemoryShopStore,
    label: &str,
    city: &str,
    at: Option<GeoPoint>,
) -> ShopId {
    let shop = store
        .create_shop(&NewShop {
            owner: UserId::new(1),
            fields: ShopFields {
                label: label.to_string(),
                city: Some(city.to_string()),
                ..ShopFields::default()
            },
            external_key: None,
        })
        .await
        .unwrap();

    if let Some(geo_location) = at {
        store
            .create_pickup(
                shop.id,
                &NewPickup {
                    geo_location,
                    place_id: None,
                    place_information: None,
                },
            )
            .await
            .unwrap();
    }
    shop.id
}

/// How [`FaultyStore`] misbehaves for a partner number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail the key lookup with a store error.
    Error,
    /// Panic inside the key lookup.
    Panic,
}

/// Memory store that misbehaves for selected partner numbers.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryShopStore,
    faults: HashMap<String, Fault>,
}

impl FaultyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fault(mut self, partner_number: &str, fault: Fault) -> Self {
        self.faults.insert(partner_number.to_string(), fault);
        self
    }
}

#[async_trait]
impl ShopStore for FaultyStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.inner.ping().await
    }

    async fn search_shops(&self, query: &ShopQuery) -> Result<(Vec<Shop>, u64), RepositoryError> {
        self.inner.search_shops(query).await
    }

    async fn pickups_for_shops(&self, shops: &[ShopId]) -> Result<Vec<Pickup>, RepositoryError> {
        self.inner.pickups_for_shops(shops).await
    }

    async fn shippings_for_shops(
        &self,
        shops: &[ShopId],
    ) -> Result<Vec<ShippingLink>, RepositoryError> {
        self.inner.shippings_for_shops(shops).await
    }

    async fn find_shop(&self, id: ShopId) -> Result<Option<Shop>, RepositoryError> {
        self.inner.find_shop(id).await
    }

    async fn list_shops(&self, owner: Option<UserId>) -> Result<Vec<Shop>, RepositoryError> {
        self.inner.list_shops(owner).await
    }

    #[allow(clippy::panic)]
    async fn find_by_external_key(
        &self,
        key: &ExternalKey,
    ) -> Result<Option<Shop>, RepositoryError> {
        match self.faults.get(&key.object_id) {
            Some(Fault::Error) => Err(RepositoryError::DataCorruption(format!(
                "unreadable shop for {key}"
            ))),
            Some(Fault::Panic) => panic!("store blew up on {key}"),
            None => self.inner.find_by_external_key(key).await,
        }
    }

    async fn create_shop(&self, shop: &NewShop) -> Result<Shop, RepositoryError> {
        self.inner.create_shop(shop).await
    }

    async fn update_shop(&self, id: ShopId, fields: &ShopFields) -> Result<Shop, RepositoryError> {
        self.inner.update_shop(id, fields).await
    }

    async fn delete_shop(&self, id: ShopId) -> Result<(), RepositoryError> {
        self.inner.delete_shop(id).await
    }

    async fn delete_pickups(&self, shop: ShopId) -> Result<u64, RepositoryError> {
        self.inner.delete_pickups(shop).await
    }

    async fn create_pickup(
        &self,
        shop: ShopId,
        pickup: &NewPickup,
    ) -> Result<Pickup, RepositoryError> {
        self.inner.create_pickup(shop, pickup).await
    }
}
