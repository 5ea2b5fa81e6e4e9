//! Import flow: spreadsheet rows through reconciliation, geocoding and search.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use shopmap_core::{ExternalKey, ShopId, UserId};
use shopmap_directory::db::{MemoryShopStore, ShopStore};
use shopmap_directory::geocoding::{Accuracy, Geocode};
use shopmap_directory::import::{DEFAULT_SOURCE_ID, ImportRow, Importer, RowOutcome};
use shopmap_directory::search::SearchService;
use shopmap_integration_tests::{
    Fault, FaultyStore, ScriptedGeocoder, ScriptedPlaces, point, resolver,
};

const IMPORTER: UserId = UserId::new(42);

fn headers() -> Vec<String> {
    [
        "Column1.CompanyName",
        "Column1.PartnerNumber",
        "Column1.CompanyMail",
        "Column1.AddressInfo.AddressLines",
        "Column1.AddressInfo.ZipCode",
        "Column1.AddressInfo.City",
        "Column1.AddressInfo.Country",
    ]
    .map(ToString::to_string)
    .to_vec()
}

fn row(name: &str, partner: &str, street: &str, city: &str) -> ImportRow {
    let cells = [name, partner, "office@example.at", street, "1010", city, "AT"]
        .map(ToString::to_string);
    ImportRow::from_cells(&headers(), &cells)
}

/// Geocoder that knows every test address by street.
fn street_geocoder() -> ScriptedGeocoder {
    ScriptedGeocoder::new()
        .answer("Graben 1 Wien", Geocode::found(point(48.2087, 16.3713), Accuracy::Rooftop))
        .answer("Herrengasse 5 Graz", Geocode::found(point(47.0707, 15.4395), Accuracy::Rooftop))
        .answer("Landstrasse 9 Linz", Geocode::found(point(48.3030, 14.2900), Accuracy::RangeInterpolated))
}

fn batch() -> Vec<ImportRow> {
    vec![
        row("Kaffee Graben", "1001", "Graben 1", "Wien"),
        row("Buchhandlung", "1002", "Herrengasse 5", "Graz"),
        row("Radverleih", "1003", "Landstrasse 9", "Linz"),
    ]
}

#[tokio::test]
async fn test_reimport_is_idempotent() {
    let store = Arc::new(MemoryShopStore::new());
    let importer = Importer::new(
        store.clone(),
        resolver(Arc::new(street_geocoder()), ScriptedPlaces::new()),
        DEFAULT_SOURCE_ID,
    );

    let first = importer.import_batch(&batch(), IMPORTER).await;
    assert_eq!((first.created, first.updated, first.failed), (3, 0, 0));
    assert_eq!(first.located(), 3);

    let second = importer.import_batch(&batch(), IMPORTER).await;
    assert_eq!((second.created, second.updated, second.failed), (0, 3, 0));
    assert_eq!(store.shop_count().await, 3);

    for ((_, before), (_, after)) in first.outcomes.iter().zip(&second.outcomes) {
        let (RowOutcome::Created { shop_id: a, .. }, RowOutcome::Updated { shop_id: b, .. }) =
            (before, after)
        else {
            panic!("unexpected outcomes {before:?} / {after:?}");
        };
        assert_eq!(a, b);
        let pickups = store.pickups_for_shops(&[*b]).await.unwrap();
        assert_eq!(pickups.len(), 1);
    }

    let shop = store
        .find_by_external_key(&ExternalKey::new(DEFAULT_SOURCE_ID, "1002"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shop.user_id, IMPORTER);
    assert_eq!(shop.fields.city.as_deref(), Some("Graz"));
    assert_eq!(shop.fields.email.unwrap().as_str(), "office@example.at");
}

#[tokio::test]
async fn test_approximate_result_falls_back_to_street() {
    let approximate = point(48.2082, 16.3738);
    let rooftop = point(48.2087, 16.3713);
    let geocoder = Arc::new(
        ScriptedGeocoder::new()
            .answer("Kaffee Graben Wien", Geocode::found(approximate, Accuracy::Approximate))
            .answer("Graben 1 Wien", Geocode::found(rooftop, Accuracy::Rooftop)),
    );
    let store = Arc::new(MemoryShopStore::new());
    let importer = Importer::new(
        store.clone(),
        resolver(Arc::clone(&geocoder), ScriptedPlaces::new()),
        DEFAULT_SOURCE_ID,
    );

    let outcome = importer
        .import_row(&row("Kaffee Graben", "1001", "Graben 1", "Wien"), IMPORTER)
        .await
        .unwrap();

    assert_eq!(geocoder.calls(), vec!["Kaffee Graben Wien", "Graben 1 Wien"]);
    let RowOutcome::Created { shop_id, pickup: Some(_) } = outcome else {
        panic!("expected a located shop, got {outcome:?}");
    };
    let pickup = &store.pickups_for_shops(&[shop_id]).await.unwrap()[0];
    assert_eq!(pickup.geo_location, rooftop);
    assert_eq!(pickup.place_id.as_deref(), Some("place:Kaffee Graben Graben 1"));

    let details = pickup.place_information.as_ref().unwrap();
    assert!(details.get("reviews").is_none());
    assert_eq!(details["photos"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_trusted_first_answer_is_final() {
    let geocoder = Arc::new(ScriptedGeocoder::new().answer(
        "Kaffee Graben Wien",
        Geocode::found(point(48.2, 16.37), Accuracy::GeometricCenter),
    ));
    let importer = Importer::new(
        Arc::new(MemoryShopStore::new()),
        resolver(Arc::clone(&geocoder), ScriptedPlaces::new()),
        DEFAULT_SOURCE_ID,
    );

    let outcome = importer
        .import_row(&row("Kaffee Graben", "1001", "Graben 1", "Wien"), IMPORTER)
        .await
        .unwrap();

    assert!(outcome.pickup().is_some());
    assert_eq!(geocoder.calls(), vec!["Kaffee Graben Wien"]);
}

#[tokio::test]
async fn test_lookup_failures_leave_shop_without_pickup() {
    let store = Arc::new(MemoryShopStore::new());
    let geocoder = street_geocoder().fail("Kaffee Graben Wien").fail("Graben 1 Wien");
    let places = ScriptedPlaces::new().unknown("Buchhandlung Herrengasse 5");
    let importer = Importer::new(
        store.clone(),
        resolver(Arc::new(geocoder), places),
        DEFAULT_SOURCE_ID,
    );

    let report = importer.import_batch(&batch(), IMPORTER).await;

    assert_eq!(report.created, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.located(), 1);
    assert!(report.outcomes[2].1.pickup().is_some());
}

#[tokio::test]
async fn test_stalled_place_search_times_out() {
    let store = Arc::new(MemoryShopStore::new());
    let importer = Importer::new(
        store.clone(),
        resolver(Arc::new(street_geocoder()), ScriptedPlaces::new().stalled()),
        DEFAULT_SOURCE_ID,
    );

    let outcome = importer
        .import_row(&row("Kaffee Graben", "1001", "Graben 1", "Wien"), IMPORTER)
        .await
        .unwrap();

    assert!(matches!(outcome, RowOutcome::Created { pickup: None, .. }));
    assert_eq!(store.shop_count().await, 1);
}

#[tokio::test]
async fn test_failing_rows_do_not_stop_the_batch() {
    let store = Arc::new(
        FaultyStore::new()
            .with_fault("1002", Fault::Error)
            .with_fault("1003", Fault::Panic),
    );
    let importer = Importer::new(
        store.clone(),
        resolver(Arc::new(street_geocoder()), ScriptedPlaces::new()),
        DEFAULT_SOURCE_ID,
    );

    let mut rows = batch();
    rows.push(row("", "1004", "Nirgendwo 1", "Wien"));
    rows.push(ImportRow {
        company_mail: Some("kein mail".to_string()),
        ..row("Trafik", "1005", "Graben 1", "Wien")
    });
    rows.push(row("Konditorei", "1006", "Graben 1", "Wien"));

    let report = importer.import_batch(&rows, IMPORTER).await;

    assert_eq!(report.total(), 6);
    assert_eq!(report.created, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 2);

    let failed_rows: Vec<(usize, Option<&str>)> = report
        .failures
        .iter()
        .map(|f| (f.row, f.partner_number.as_deref()))
        .collect();
    assert_eq!(
        failed_rows,
        vec![(2, Some("1002")), (3, Some("1003"))]
    );
    assert!(report.failures[1].message.contains("store blew up"));
    assert_eq!(store.inner.shop_count().await, 3);

    let trafik = store
        .inner
        .find_by_external_key(&ExternalKey::new(DEFAULT_SOURCE_ID, "1005"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(trafik.fields.email, None);
}

#[tokio::test]
async fn test_imported_shops_are_searchable_by_area() {
    let store = Arc::new(MemoryShopStore::new());
    let importer = Importer::new(
        store.clone(),
        resolver(Arc::new(street_geocoder()), ScriptedPlaces::new()),
        "acme",
    );
    let report = importer.import_batch(&batch(), IMPORTER).await;
    let RowOutcome::Created { shop_id: vienna, .. } = report.outcomes[0].1 else {
        panic!("expected created");
    };

    let search = SearchService::new(store.clone(), "http://localhost:3000/api/shops/search");
    let page = search
        .search_query(Some("filter[location]=48.2082,16.3738&filter[radius]=5"))
        .await
        .unwrap();

    let found: Vec<ShopId> = page.data.iter().map(|v| v.shop.id).collect();
    assert_eq!(found, vec![vienna]);
    assert_eq!(page.data[0].shop.source_id.as_deref(), Some("acme"));
    assert_eq!(page.data[0].pickups.len(), 1);
}
