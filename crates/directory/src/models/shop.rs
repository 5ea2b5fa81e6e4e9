//! Shop, pickup and shipping domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use shopmap_core::{Email, ExternalKey, GeoPoint, PickupId, ShippingId, ShopId, UserId};

/// Editable business fields of a shop.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShopFields {
    pub label: String,
    pub email: Option<Email>,
    pub description: Option<String>,
    pub address_line_1: Option<String>,
    pub address_line_2: Option<String>,
    pub address_line_3: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,
    pub website: Option<String>,
    pub digital_goods: bool,
}

/// A stored shop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shop {
    pub id: ShopId,
    pub user_id: UserId,
    #[serde(flatten)]
    pub fields: ShopFields,
    /// Import source; set together with `object_id` for imported shops.
    pub source_id: Option<String>,
    pub object_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shop {
    /// The reconciliation key, when this shop came from an import.
    #[must_use]
    pub fn external_key(&self) -> Option<ExternalKey> {
        match (&self.source_id, &self.object_id) {
            (Some(source), Some(object)) => Some(ExternalKey::new(source, object)),
            _ => None,
        }
    }
}

/// Input for creating a shop.
#[derive(Debug, Clone)]
pub struct NewShop {
    pub owner: UserId,
    pub fields: ShopFields,
    pub external_key: Option<ExternalKey>,
}

/// A pickup location of a shop. Replaced wholesale on import, never edited.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pickup {
    pub id: PickupId,
    pub shop_id: ShopId,
    pub geo_location: GeoPoint,
    pub place_id: Option<String>,
    /// Trimmed place-details payload (no reviews, at most one photo).
    pub place_information: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a pickup.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPickup {
    pub geo_location: GeoPoint,
    pub place_id: Option<String>,
    pub place_information: Option<JsonValue>,
}

/// A shipping zone: a circle around a point plus the countries it serves.
///
/// Zones are shared between shops through a join table, which never leaks
/// into the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shipping {
    pub id: ShippingId,
    pub geo_location: GeoPoint,
    pub radius: f64,
    pub countries: Vec<String>,
}

/// A shipping zone as seen from one of the shops it is attached to.
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingLink {
    pub shop_id: ShopId,
    pub shipping: Shipping,
}
