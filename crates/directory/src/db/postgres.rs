//! `PostgreSQL` + `PostGIS` implementation of [`ShopStore`].
//!
//! Searches are assembled with `sqlx::QueryBuilder`: request values are always
//! bound parameters, and the only identifiers pushed into SQL text come from
//! the closed field enums in [`super::query`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use shopmap_core::{Email, ExternalKey, GeoPoint, PickupId, ShippingId, ShopId, UserId};

use super::query::{Predicate, ShopQuery, like_pattern};
use super::{RepositoryError, ShopStore};
use crate::models::{NewPickup, NewShop, Pickup, Shipping, ShippingLink, Shop, ShopFields};

const SHOP_COLUMNS: &str = "s.id, s.user_id, s.label, s.email, s.description, \
     s.address_line_1, s.address_line_2, s.address_line_3, s.city, s.country, s.zip, \
     s.website, s.digital_goods, s.source_id, s.object_id, s.created_at, s.updated_at";

const PICKUP_COLUMNS: &str = "id, shop_id, \
     ST_Y(geo_location::geometry) AS lat, ST_X(geo_location::geometry) AS lng, \
     place_id, place_information, created_at, updated_at";

/// Shop repository backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgShopStore {
    pool: PgPool,
}

impl PgShopStore {
    /// Create a new store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct ShopRow {
    id: ShopId,
    user_id: UserId,
    label: String,
    email: Option<Email>,
    description: Option<String>,
    address_line_1: Option<String>,
    address_line_2: Option<String>,
    address_line_3: Option<String>,
    city: Option<String>,
    country: Option<String>,
    zip: Option<String>,
    website: Option<String>,
    digital_goods: bool,
    source_id: Option<String>,
    object_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ShopRow> for Shop {
    fn from(r: ShopRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            fields: ShopFields {
                label: r.label,
                email: r.email,
                description: r.description,
                address_line_1: r.address_line_1,
                address_line_2: r.address_line_2,
                address_line_3: r.address_line_3,
                city: r.city,
                country: r.country,
                zip: r.zip,
                website: r.website,
                digital_goods: r.digital_goods,
            },
            source_id: r.source_id,
            object_id: r.object_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PickupRow {
    id: PickupId,
    shop_id: ShopId,
    lat: f64,
    lng: f64,
    place_id: Option<String>,
    place_information: Option<JsonValue>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PickupRow> for Pickup {
    type Error = RepositoryError;

    fn try_from(r: PickupRow) -> Result<Self, Self::Error> {
        let geo_location = GeoPoint::new(r.lat, r.lng).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid location on pickup {}: {e}", r.id))
        })?;

        Ok(Self {
            id: r.id,
            shop_id: r.shop_id,
            geo_location,
            place_id: r.place_id,
            place_information: r.place_information,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ShippingRow {
    shop_id: ShopId,
    id: ShippingId,
    lat: f64,
    lng: f64,
    radius: f64,
    countries: Vec<String>,
}

impl TryFrom<ShippingRow> for ShippingLink {
    type Error = RepositoryError;

    fn try_from(r: ShippingRow) -> Result<Self, Self::Error> {
        let geo_location = GeoPoint::new(r.lat, r.lng).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid location on shipping {}: {e}", r.id))
        })?;

        Ok(Self {
            shop_id: r.shop_id,
            shipping: Shipping {
                id: r.id,
                geo_location,
                radius: r.radius,
                countries: r.countries,
            },
        })
    }
}

/// Append ` AND <predicate>` for every predicate.
fn push_predicates(qb: &mut QueryBuilder<'_, Postgres>, predicates: &[Predicate]) {
    for predicate in predicates {
        qb.push(" AND ");
        match predicate {
            Predicate::Contains { field, any_of } => {
                qb.push("(");
                for (i, needle) in any_of.iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    qb.push("LOWER(COALESCE(s.")
                        .push(field.column())
                        .push(", '')) LIKE ")
                        .push_bind(like_pattern(needle))
                        .push(" ESCAPE '\\'");
                }
                qb.push(")");
            }
            Predicate::Equals { field, value } => {
                qb.push("s.")
                    .push(field.column())
                    .push(" = ")
                    .push_bind(*value);
            }
            Predicate::WithinBox(bbox) => {
                let (sw, ne) = (bbox.south_west(), bbox.north_east());
                qb.push(
                    "EXISTS (SELECT 1 FROM directory.pickups p WHERE p.shop_id = s.id \
                     AND ST_Covers(ST_MakeEnvelope(",
                )
                .push_bind(sw.lng())
                .push(", ")
                .push_bind(sw.lat())
                .push(", ")
                .push_bind(ne.lng())
                .push(", ")
                .push_bind(ne.lat())
                .push(", 4326), p.geo_location::geometry))");
            }
            Predicate::WithinRadius { center, radius } => {
                // use_spheroid = false: sphere distance, inclusive, same model as GeoPoint::distance_km
                qb.push(
                    "EXISTS (SELECT 1 FROM directory.pickups p WHERE p.shop_id = s.id \
                     AND ST_DWithin(p.geo_location, ST_SetSRID(ST_MakePoint(",
                )
                .push_bind(center.lng())
                .push(", ")
                .push_bind(center.lat())
                .push("), 4326)::geography, ")
                .push_bind(radius.meters())
                .push(", false))");
            }
        }
    }
}

fn map_unique_violation(err: sqlx::Error, key: Option<&ExternalKey>) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err
        && db.is_unique_violation()
    {
        let what = key.map_or_else(|| "shop".to_string(), |k| format!("import key {k}"));
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}

fn id_values(shops: &[ShopId]) -> Vec<i64> {
    shops.iter().map(ShopId::as_i64).collect()
}

#[async_trait]
impl ShopStore for PgShopStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(predicates = query.predicates.len()))]
    async fn search_shops(&self, query: &ShopQuery) -> Result<(Vec<Shop>, u64), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM directory.shops s WHERE TRUE");
        push_predicates(&mut count, &query.predicates);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT ");
        select
            .push(SHOP_COLUMNS)
            .push(" FROM directory.shops s WHERE TRUE");
        push_predicates(&mut select, &query.predicates);
        select
            .push(" ORDER BY s.id LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.offset).unwrap_or(i64::MAX));

        let rows: Vec<ShopRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let total = u64::try_from(total)
            .map_err(|_| RepositoryError::DataCorruption(format!("negative count {total}")))?;

        Ok((rows.into_iter().map(Shop::from).collect(), total))
    }

    async fn pickups_for_shops(&self, shops: &[ShopId]) -> Result<Vec<Pickup>, RepositoryError> {
        if shops.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<PickupRow> = sqlx::query_as(&format!(
            "SELECT {PICKUP_COLUMNS} FROM directory.pickups WHERE shop_id = ANY($1) ORDER BY id"
        ))
        .bind(id_values(shops))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Pickup::try_from).collect()
    }

    async fn shippings_for_shops(
        &self,
        shops: &[ShopId],
    ) -> Result<Vec<ShippingLink>, RepositoryError> {
        if shops.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<ShippingRow> = sqlx::query_as(
            r"
            SELECT ss.shop_id, sh.id,
                   ST_Y(sh.geo_location::geometry) AS lat,
                   ST_X(sh.geo_location::geometry) AS lng,
                   sh.radius, sh.countries
            FROM directory.shop_shipping ss
            JOIN directory.shippings sh ON sh.id = ss.shipping_id
            WHERE ss.shop_id = ANY($1)
            ORDER BY sh.id
            ",
        )
        .bind(id_values(shops))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ShippingLink::try_from).collect()
    }

    async fn find_shop(&self, id: ShopId) -> Result<Option<Shop>, RepositoryError> {
        let row: Option<ShopRow> = sqlx::query_as(&format!(
            "SELECT {SHOP_COLUMNS} FROM directory.shops s WHERE s.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Shop::from))
    }

    async fn list_shops(&self, owner: Option<UserId>) -> Result<Vec<Shop>, RepositoryError> {
        let rows: Vec<ShopRow> = sqlx::query_as(&format!(
            "SELECT {SHOP_COLUMNS} FROM directory.shops s \
             WHERE $1::BIGINT IS NULL OR s.user_id = $1 ORDER BY s.id"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Shop::from).collect())
    }

    async fn find_by_external_key(
        &self,
        key: &ExternalKey,
    ) -> Result<Option<Shop>, RepositoryError> {
        let row: Option<ShopRow> = sqlx::query_as(&format!(
            "SELECT {SHOP_COLUMNS} FROM directory.shops s \
             WHERE s.source_id = $1 AND s.object_id = $2"
        ))
        .bind(&key.source_id)
        .bind(&key.object_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Shop::from))
    }

    #[instrument(skip(self, shop), fields(owner = %shop.owner))]
    async fn create_shop(&self, shop: &NewShop) -> Result<Shop, RepositoryError> {
        let f = &shop.fields;
        let row: ShopRow = sqlx::query_as(&format!(
            r"
            WITH s AS (
                INSERT INTO directory.shops
                    (user_id, label, email, description, address_line_1, address_line_2,
                     address_line_3, city, country, zip, website, digital_goods,
                     source_id, object_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                RETURNING *
            )
            SELECT {SHOP_COLUMNS} FROM s
            "
        ))
        .bind(shop.owner)
        .bind(&f.label)
        .bind(&f.email)
        .bind(&f.description)
        .bind(&f.address_line_1)
        .bind(&f.address_line_2)
        .bind(&f.address_line_3)
        .bind(&f.city)
        .bind(&f.country)
        .bind(&f.zip)
        .bind(&f.website)
        .bind(f.digital_goods)
        .bind(shop.external_key.as_ref().map(|k| k.source_id.as_str()))
        .bind(shop.external_key.as_ref().map(|k| k.object_id.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, shop.external_key.as_ref()))?;

        Ok(row.into())
    }

    async fn update_shop(&self, id: ShopId, fields: &ShopFields) -> Result<Shop, RepositoryError> {
        let row: Option<ShopRow> = sqlx::query_as(&format!(
            r"
            WITH s AS (
                UPDATE directory.shops
                SET label = $2, email = $3, description = $4, address_line_1 = $5,
                    address_line_2 = $6, address_line_3 = $7, city = $8, country = $9,
                    zip = $10, website = $11, digital_goods = $12, updated_at = NOW()
                WHERE id = $1
                RETURNING *
            )
            SELECT {SHOP_COLUMNS} FROM s
            "
        ))
        .bind(id)
        .bind(&fields.label)
        .bind(&fields.email)
        .bind(&fields.description)
        .bind(&fields.address_line_1)
        .bind(&fields.address_line_2)
        .bind(&fields.address_line_3)
        .bind(&fields.city)
        .bind(&fields.country)
        .bind(&fields.zip)
        .bind(&fields.website)
        .bind(fields.digital_goods)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Shop::from).ok_or(RepositoryError::NotFound)
    }

    async fn delete_shop(&self, id: ShopId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM directory.shops WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_pickups(&self, shop: ShopId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM directory.pickups WHERE shop_id = $1")
            .bind(shop)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn create_pickup(
        &self,
        shop: ShopId,
        pickup: &NewPickup,
    ) -> Result<Pickup, RepositoryError> {
        let row: PickupRow = sqlx::query_as(&format!(
            r"
            INSERT INTO directory.pickups (shop_id, geo_location, place_id, place_information)
            VALUES ($1, ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography, $4, $5)
            RETURNING {PICKUP_COLUMNS}
            "
        ))
        .bind(shop)
        .bind(pickup.geo_location.lng())
        .bind(pickup.geo_location.lat())
        .bind(&pickup.place_id)
        .bind(&pickup.place_information)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopmap_core::{BoundingBox, Radius};

    use super::*;
    use crate::db::query::{FlagField, TextField};

    fn where_clause(predicates: &[Predicate]) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("WHERE TRUE");
        push_predicates(&mut qb, predicates);
        qb.sql().to_string()
    }

    #[test]
    fn test_contains_binds_each_needle() {
        let sql = where_clause(&[Predicate::Contains {
            field: TextField::City,
            any_of: vec!["berlin".into(), "potsdam".into()],
        }]);
        assert_eq!(
            sql,
            "WHERE TRUE AND (LOWER(COALESCE(s.city, '')) LIKE $1 ESCAPE '\\' \
             OR LOWER(COALESCE(s.city, '')) LIKE $2 ESCAPE '\\')"
        );
    }

    #[test]
    fn test_flag_and_spatial_predicates_are_conjoined() {
        let sql = where_clause(&[
            Predicate::Equals {
                field: FlagField::DigitalGoods,
                value: true,
            },
            Predicate::WithinBox(BoundingBox::parse("52,13,53,14").unwrap()),
            Predicate::WithinRadius {
                center: GeoPoint::new(52.5, 13.4).unwrap(),
                radius: Radius::from_km(10.0).unwrap(),
            },
        ]);
        assert!(sql.starts_with("WHERE TRUE AND s.digital_goods = $1 AND EXISTS"));
        assert!(sql.contains("ST_MakeEnvelope($2, $3, $4, $5, 4326)"));
        assert!(sql.contains("ST_DWithin(p.geo_location"));
        assert!(sql.ends_with("$8, false))"));
    }

    #[test]
    fn test_no_predicates_is_unfiltered() {
        assert_eq!(where_clause(&[]), "WHERE TRUE");
    }
}
