//! Batch import of partner spreadsheets.
//!
//! Each row is reconciled against the shop carrying the same
//! `(source_id, partner number)` key: created when absent, updated in place
//! otherwise. The shop's pickups are then replaced by a freshly geocoded one.
//!
//! A batch never aborts. Store failures, validation problems and panics are
//! recorded against the row that caused them and the next row is processed.

pub mod row;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use shopmap_core::{Email, ExternalKey, PickupId, ShopId, UserId};

use crate::db::{RepositoryError, ShopStore};
use crate::geocoding::{LocationResolver, Resolution};
use crate::models::{NewShop, ShopFields};

pub use row::{ImportRow, columns, heading_key};

/// Source tag used when none is configured.
pub const DEFAULT_SOURCE_ID: &str = "salamantex";

/// Why a single row could not be imported.
#[derive(Debug, Error)]
pub enum RowError {
    /// A required column is blank.
    #[error("Column `{0}` is required.")]
    MissingField(&'static str),

    /// The store rejected a read or write.
    #[error("Store error: {0}")]
    Store(#[from] RepositoryError),

    /// Processing the row panicked.
    #[error("Row processing panicked: {0}")]
    Panicked(String),
}

/// What happened to a row that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Created {
        shop_id: ShopId,
        pickup: Option<PickupId>,
    },
    Updated {
        shop_id: ShopId,
        pickup: Option<PickupId>,
    },
    /// No company name; the row is ignored.
    Skipped,
}

impl RowOutcome {
    /// The pickup written for this row, if the address resolved.
    #[must_use]
    pub const fn pickup(&self) -> Option<PickupId> {
        match self {
            Self::Created { pickup, .. } | Self::Updated { pickup, .. } => *pickup,
            Self::Skipped => None,
        }
    }
}

/// A row that failed, with enough context to find it in the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 1-based position among the data rows.
    pub row: usize,
    pub partner_number: Option<String>,
    pub message: String,
}

/// Result of a whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Successful rows with their 1-based position.
    pub outcomes: Vec<(usize, RowOutcome)>,
    pub failures: Vec<RowFailure>,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ImportReport {
    fn record(&mut self, row: usize, input: &ImportRow, result: Result<RowOutcome, RowError>) {
        match result {
            Ok(outcome) => {
                match outcome {
                    RowOutcome::Created { .. } => self.created += 1,
                    RowOutcome::Updated { .. } => self.updated += 1,
                    RowOutcome::Skipped => self.skipped += 1,
                }
                self.outcomes.push((row, outcome));
            }
            Err(e) => {
                tracing::warn!(
                    row,
                    partner_number = input.partner_number.as_deref().unwrap_or_default(),
                    error = %e,
                    "Import row failed"
                );
                self.failed += 1;
                self.failures.push(RowFailure {
                    row,
                    partner_number: input.partner_number.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Number of rows processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }

    /// Rows that ended with a pickup.
    #[must_use]
    pub fn located(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.pickup().is_some())
            .count()
    }
}

/// Reconciles spreadsheet rows into shops and pickups.
#[derive(Clone)]
pub struct Importer {
    store: Arc<dyn ShopStore>,
    resolver: Arc<LocationResolver>,
    source_id: String,
}

impl Importer {
    #[must_use]
    pub fn new(
        store: Arc<dyn ShopStore>,
        resolver: Arc<LocationResolver>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            resolver,
            source_id: source_id.into(),
        }
    }

    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Import one row on behalf of `user`.
    ///
    /// New shops are owned by `user`; existing shops keep their owner.
    ///
    /// # Errors
    ///
    /// Returns `RowError` for a missing partner number or a store failure.
    /// A malformed company mail is dropped with a warning, and geocoding
    /// problems leave the shop without a pickup.
    #[instrument(
        skip(self, row),
        fields(partner_number = row.partner_number.as_deref().unwrap_or_default())
    )]
    pub async fn import_row(&self, row: &ImportRow, user: UserId) -> Result<RowOutcome, RowError> {
        if row.company_name.is_none() {
            tracing::debug!("Row without company name skipped");
            return Ok(RowOutcome::Skipped);
        }

        let partner_number = row
            .partner_number
            .as_deref()
            .ok_or(RowError::MissingField(columns::PARTNER_NUMBER))?;
        let email = Email::parse_optional(row.company_mail.as_deref()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Company mail ignored");
            None
        });
        let key = ExternalKey::new(&self.source_id, partner_number);

        let (shop_id, created) = match self.store.find_by_external_key(&key).await? {
            Some(existing) => {
                let fields = row.apply_to(existing.fields, email);
                let shop = self.store.update_shop(existing.id, &fields).await?;
                (shop.id, false)
            }
            None => {
                let fields = row.apply_to(ShopFields::default(), email);
                let shop = self
                    .store
                    .create_shop(&NewShop {
                        owner: user,
                        fields,
                        external_key: Some(key),
                    })
                    .await?;
                (shop.id, true)
            }
        };

        let removed = self.store.delete_pickups(shop_id).await?;
        if removed > 0 {
            tracing::debug!(shop_id = %shop_id, removed, "Replaced existing pickups");
        }

        let pickup = match self.resolver.resolve(&row.address_query()).await {
            Resolution::Resolved(location) => Some(
                self.store
                    .create_pickup(shop_id, &location.into_pickup())
                    .await?
                    .id,
            ),
            Resolution::NotFound => None,
        };

        Ok(if created {
            RowOutcome::Created { shop_id, pickup }
        } else {
            RowOutcome::Updated { shop_id, pickup }
        })
    }

    /// Import rows in order, one at a time. Always completes.
    #[instrument(skip(self, rows), fields(rows = rows.len(), source_id = %self.source_id))]
    pub async fn import_batch(&self, rows: &[ImportRow], user: UserId) -> ImportReport {
        let mut report = ImportReport::default();

        for (index, row) in rows.iter().enumerate() {
            let result = AssertUnwindSafe(self.import_row(row, user))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(RowError::Panicked(panic_message(panic.as_ref()))));
            report.record(index + 1, row, result);
        }

        tracing::info!(
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            "Import batch finished"
        );
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Value as JsonValue, json};

    use shopmap_core::GeoPoint;

    use super::*;
    use crate::db::{MemoryShopStore, ShopQuery};
    use crate::geocoding::{
        Accuracy, CoordinateGeocoder, Geocode, GeocodingError, PlaceProvider,
    };
    use crate::models::{NewPickup, Pickup, ShippingLink, Shop};

    struct FixedGeocoder(Option<GeoPoint>);

    #[async_trait]
    impl CoordinateGeocoder for FixedGeocoder {
        async fn geocode(&self, _address: &str) -> Result<Geocode, GeocodingError> {
            Ok(self
                .0
                .map_or_else(Geocode::not_found, |p| Geocode::found(p, Accuracy::Rooftop)))
        }
    }

    struct EchoPlaces;

    #[async_trait]
    impl PlaceProvider for EchoPlaces {
        async fn find_place(&self, input: &str) -> Result<Option<String>, GeocodingError> {
            Ok(Some(format!("place:{input}")))
        }

        async fn place_details(&self, place_id: &str) -> Result<JsonValue, GeocodingError> {
            Ok(json!({ "place_id": place_id, "reviews": [] }))
        }
    }

    /// Delegates to a memory store but panics on one partner number.
    struct PanickingStore {
        inner: MemoryShopStore,
        poison: &'static str,
    }

    #[async_trait]
    impl ShopStore for PanickingStore {
        async fn ping(&self) -> Result<(), RepositoryError> {
            self.inner.ping().await
        }
        async fn search_shops(&self, q: &ShopQuery) -> Result<(Vec<Shop>, u64), RepositoryError> {
            self.inner.search_shops(q).await
        }
        async fn pickups_for_shops(&self, s: &[ShopId]) -> Result<Vec<Pickup>, RepositoryError> {
            self.inner.pickups_for_shops(s).await
        }
        async fn shippings_for_shops(
            &self,
            s: &[ShopId],
        ) -> Result<Vec<ShippingLink>, RepositoryError> {
            self.inner.shippings_for_shops(s).await
        }
        async fn find_shop(&self, id: ShopId) -> Result<Option<Shop>, RepositoryError> {
            self.inner.find_shop(id).await
        }
        async fn list_shops(&self, owner: Option<UserId>) -> Result<Vec<Shop>, RepositoryError> {
            self.inner.list_shops(owner).await
        }
        async fn find_by_external_key(
            &self,
            key: &ExternalKey,
        ) -> Result<Option<Shop>, RepositoryError> {
            assert_ne!(key.object_id, self.poison, "poisoned partner number");
            self.inner.find_by_external_key(key).await
        }
        async fn create_shop(&self, shop: &NewShop) -> Result<Shop, RepositoryError> {
            self.inner.create_shop(shop).await
        }
        async fn update_shop(
            &self,
            id: ShopId,
            fields: &ShopFields,
        ) -> Result<Shop, RepositoryError> {
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

    fn vienna() -> GeoPoint {
        GeoPoint::new(48.2082, 16.3738).unwrap()
    }

    fn importer(store: Arc<dyn ShopStore>, point: Option<GeoPoint>) -> Importer {
        let resolver = LocationResolver::new(
            Arc::new(FixedGeocoder(point)),
            Arc::new(EchoPlaces),
            Duration::from_secs(1),
        );
        Importer::new(store, Arc::new(resolver), DEFAULT_SOURCE_ID)
    }

    fn row(name: &str, partner: &str) -> ImportRow {
        ImportRow {
            company_name: Some(name.to_string()),
            partner_number: Some(partner.to_string()),
            company_mail: Some("office@kaffee.at".to_string()),
            address_lines: Some("Graben 1".to_string()),
            zip_code: Some("1010".to_string()),
            city: Some("Wien".to_string()),
            country: Some("AT".to_string()),
        }
    }

    #[tokio::test]
    async fn test_reimport_updates_in_place() {
        let store = Arc::new(MemoryShopStore::new());
        let importer = importer(store.clone(), Some(vienna()));
        let owner = UserId::new(3);

        let first = importer.import_row(&row("Kaffeehaus", "100"), owner).await.unwrap();
        let RowOutcome::Created { shop_id, pickup } = first else {
            panic!("expected create, got {first:?}");
        };
        assert!(pickup.is_some());

        let second = importer
            .import_row(&row("Kaffeehaus Neu", "100"), UserId::new(9))
            .await
            .unwrap();
        assert!(matches!(second, RowOutcome::Updated { shop_id: id, pickup: Some(_) } if id == shop_id));

        assert_eq!(store.shop_count().await, 1);
        let shop = store.find_shop(shop_id).await.unwrap().unwrap();
        assert_eq!(shop.fields.label, "Kaffeehaus Neu");
        assert_eq!(shop.user_id, owner);
        assert_eq!(
            shop.external_key(),
            Some(ExternalKey::new(DEFAULT_SOURCE_ID, "100"))
        );

        let pickups = store.pickups_for_shops(&[shop_id]).await.unwrap();
        assert_eq!(pickups.len(), 1);
        assert_eq!(
            pickups[0].place_id.as_deref(),
            Some("place:Kaffeehaus Neu Graben 1")
        );
    }

    #[tokio::test]
    async fn test_unresolved_address_clears_pickup() {
        let store = Arc::new(MemoryShopStore::new());
        importer(store.clone(), Some(vienna()))
            .import_row(&row("Kaffeehaus", "100"), UserId::new(1))
            .await
            .unwrap();

        let outcome = importer(store.clone(), None)
            .import_row(&row("Kaffeehaus", "100"), UserId::new(1))
            .await
            .unwrap();

        assert_eq!(outcome.pickup(), None);
        let RowOutcome::Updated { shop_id, .. } = outcome else {
            panic!("expected update");
        };
        assert!(store.pickups_for_shops(&[shop_id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_row_validation() {
        let store = Arc::new(MemoryShopStore::new());
        let importer = importer(store.clone(), Some(vienna()));

        let skipped = ImportRow {
            company_name: None,
            ..row("", "1")
        };
        assert_eq!(
            importer.import_row(&skipped, UserId::new(1)).await.unwrap(),
            RowOutcome::Skipped
        );

        let no_partner = ImportRow {
            partner_number: None,
            ..row("Shop", "")
        };
        let err = importer.import_row(&no_partner, UserId::new(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "Column `column1partnernumber` is required.");

        let bad_mail = ImportRow {
            company_mail: Some("office(at)kaffee.at".to_string()),
            ..row("Shop", "7")
        };
        let outcome = importer.import_row(&bad_mail, UserId::new(1)).await.unwrap();
        let RowOutcome::Created { shop_id, .. } = outcome else {
            panic!("expected create, got {outcome:?}");
        };
        let shop = store.find_shop(shop_id).await.unwrap().unwrap();
        assert_eq!(shop.fields.email, None);
        assert_eq!(shop.fields.label, "Shop");

        assert_eq!(store.shop_count().await, 1);
    }

    #[tokio::test]
    async fn test_batch_isolates_panicking_row() {
        let store = Arc::new(PanickingStore {
            inner: MemoryShopStore::new(),
            poison: "666",
        });
        let importer = importer(store.clone(), Some(vienna()));
        let rows = vec![
            row("Erster", "1"),
            row("Kaputt", "666"),
            ImportRow::default(),
            ImportRow {
                partner_number: None,
                ..row("Ohne Nummer", "")
            },
            row("Letzter", "2"),
        ];

        let report = importer.import_batch(&rows, UserId::new(1)).await;

        assert_eq!(report.total(), 5);
        assert_eq!(report.created, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.located(), 2);
        assert_eq!(report.failures[0].row, 2);
        assert_eq!(report.failures[0].partner_number.as_deref(), Some("666"));
        assert!(report.failures[0].message.contains("poisoned partner number"));
        assert_eq!(report.failures[1].row, 4);
        assert_eq!(store.inner.shop_count().await, 2);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic");
    }
}
