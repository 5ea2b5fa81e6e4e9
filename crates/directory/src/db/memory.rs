//! In-process [`ShopStore`] used by tests and local tooling.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use shopmap_core::{ExternalKey, GeoPoint, PickupId, ShippingId, ShopId, UserId};

use super::query::ShopQuery;
use super::{RepositoryError, ShopStore};
use crate::models::{NewPickup, NewShop, Pickup, Shipping, ShippingLink, Shop, ShopFields};

#[derive(Default)]
struct Tables {
    shops: BTreeMap<ShopId, Shop>,
    pickups: BTreeMap<PickupId, Pickup>,
    shippings: BTreeMap<ShippingId, Shipping>,
    links: Vec<(ShopId, ShippingId)>,
    next_shop: i64,
    next_pickup: i64,
    next_shipping: i64,
}

impl Tables {
    fn pickups_of(&self, shop: ShopId) -> Vec<&Pickup> {
        self.pickups.values().filter(|p| p.shop_id == shop).collect()
    }
}

/// Shop store holding everything in memory behind an async lock.
///
/// Evaluates the same [`super::Predicate`]s as the SQL store, with the same
/// inclusive boundaries, so it can stand in for it in tests.
#[derive(Default)]
pub struct MemoryShopStore {
    tables: RwLock<Tables>,
}

impl MemoryShopStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shipping zone and attach it to `shops`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if any of the shops does not exist,
    /// or `RepositoryError::DataCorruption` for a non-positive radius.
    pub async fn insert_shipping(
        &self,
        geo_location: GeoPoint,
        radius: f64,
        countries: Vec<String>,
        shops: &[ShopId],
    ) -> Result<Shipping, RepositoryError> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(RepositoryError::DataCorruption(format!(
                "shipping radius must be positive, got {radius}"
            )));
        }

        let mut t = self.tables.write().await;
        if shops.iter().any(|id| !t.shops.contains_key(id)) {
            return Err(RepositoryError::NotFound);
        }

        t.next_shipping += 1;
        let shipping = Shipping {
            id: ShippingId::new(t.next_shipping),
            geo_location,
            radius,
            countries,
        };
        t.shippings.insert(shipping.id, shipping.clone());
        for shop in shops {
            t.links.push((*shop, shipping.id));
        }
        Ok(shipping)
    }

    /// Number of stored shops.
    pub async fn shop_count(&self) -> usize {
        self.tables.read().await.shops.len()
    }
}

#[async_trait]
impl ShopStore for MemoryShopStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn search_shops(&self, query: &ShopQuery) -> Result<(Vec<Shop>, u64), RepositoryError> {
        let t = self.tables.read().await;

        let matching: Vec<&Shop> = t
            .shops
            .values()
            .filter(|shop| {
                let pickups = if query.predicates.iter().any(super::Predicate::is_spatial) {
                    t.pickups_of(shop.id)
                } else {
                    Vec::new()
                };
                query
                    .predicates
                    .iter()
                    .all(|p| p.matches(&shop.fields, &pickups))
            })
            .collect();

        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let page = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn pickups_for_shops(&self, shops: &[ShopId]) -> Result<Vec<Pickup>, RepositoryError> {
        let t = self.tables.read().await;
        Ok(t
            .pickups
            .values()
            .filter(|p| shops.contains(&p.shop_id))
            .cloned()
            .collect())
    }

    async fn shippings_for_shops(
        &self,
        shops: &[ShopId],
    ) -> Result<Vec<ShippingLink>, RepositoryError> {
        let t = self.tables.read().await;
        let mut links: Vec<ShippingLink> = t
            .links
            .iter()
            .filter(|(shop, _)| shops.contains(shop))
            .filter_map(|(shop, shipping)| {
                t.shippings.get(shipping).map(|s| ShippingLink {
                    shop_id: *shop,
                    shipping: s.clone(),
                })
            })
            .collect();
        links.sort_by_key(|l| l.shipping.id);
        Ok(links)
    }

    async fn find_shop(&self, id: ShopId) -> Result<Option<Shop>, RepositoryError> {
        Ok(self.tables.read().await.shops.get(&id).cloned())
    }

    async fn list_shops(&self, owner: Option<UserId>) -> Result<Vec<Shop>, RepositoryError> {
        let t = self.tables.read().await;
        Ok(t
            .shops
            .values()
            .filter(|s| owner.is_none_or(|o| s.user_id == o))
            .cloned()
            .collect())
    }

    async fn find_by_external_key(
        &self,
        key: &ExternalKey,
    ) -> Result<Option<Shop>, RepositoryError> {
        let t = self.tables.read().await;
        Ok(t
            .shops
            .values()
            .find(|s| s.external_key().as_ref() == Some(key))
            .cloned())
    }

    async fn create_shop(&self, shop: &NewShop) -> Result<Shop, RepositoryError> {
        let mut t = self.tables.write().await;

        if let Some(key) = &shop.external_key
            && t.shops
                .values()
                .any(|s| s.external_key().as_ref() == Some(key))
        {
            return Err(RepositoryError::Conflict(format!(
                "import key {key} already exists"
            )));
        }

        t.next_shop += 1;
        let now = Utc::now();
        let created = Shop {
            id: ShopId::new(t.next_shop),
            user_id: shop.owner,
            fields: shop.fields.clone(),
            source_id: shop.external_key.as_ref().map(|k| k.source_id.clone()),
            object_id: shop.external_key.as_ref().map(|k| k.object_id.clone()),
            created_at: now,
            updated_at: now,
        };
        t.shops.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_shop(&self, id: ShopId, fields: &ShopFields) -> Result<Shop, RepositoryError> {
        let mut t = self.tables.write().await;
        let shop = t.shops.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        shop.fields = fields.clone();
        shop.updated_at = Utc::now();
        Ok(shop.clone())
    }

    async fn delete_shop(&self, id: ShopId) -> Result<(), RepositoryError> {
        let mut t = self.tables.write().await;
        if t.shops.remove(&id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        t.pickups.retain(|_, p| p.shop_id != id);
        t.links.retain(|(shop, _)| *shop != id);
        Ok(())
    }

    async fn delete_pickups(&self, shop: ShopId) -> Result<u64, RepositoryError> {
        let mut t = self.tables.write().await;
        let before = t.pickups.len();
        t.pickups.retain(|_, p| p.shop_id != shop);
        Ok((before - t.pickups.len()) as u64)
    }

    async fn create_pickup(
        &self,
        shop: ShopId,
        pickup: &NewPickup,
    ) -> Result<Pickup, RepositoryError> {
        let mut t = self.tables.write().await;
        if !t.shops.contains_key(&shop) {
            return Err(RepositoryError::NotFound);
        }

        t.next_pickup += 1;
        let now = Utc::now();
        let created = Pickup {
            id: PickupId::new(t.next_pickup),
            shop_id: shop,
            geo_location: pickup.geo_location,
            place_id: pickup.place_id.clone(),
            place_information: pickup.place_information.clone(),
            created_at: now,
            updated_at: now,
        };
        t.pickups.insert(created.id, created.clone());
        Ok(created)
    }
}
