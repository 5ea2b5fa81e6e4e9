//! Address resolution for imported shops.
//!
//! Two independent lookups feed one pickup location:
//!
//! - a coordinate geocoder (address text to lat/lng plus an accuracy class),
//!   retried once with the street address when the first answer is too vague
//! - a place provider (address text to place id, then place details)
//!
//! [`LocationResolver::resolve`] runs both, bounds every external call with a
//! timeout and downgrades any failure to [`Resolution::NotFound`]. Callers
//! never see a geocoding error.

pub mod google;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::instrument;

use shopmap_core::GeoPoint;

use crate::models::NewPickup;

pub use google::GoogleMapsClient;

/// How precisely a geocoder located an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    Rooftop,
    RangeInterpolated,
    GeometricCenter,
    Approximate,
    NotFound,
}

impl Accuracy {
    /// Map a Google `geometry.location_type`. Unknown values count as approximate.
    #[must_use]
    pub fn from_location_type(location_type: &str) -> Self {
        match location_type {
            "ROOFTOP" => Self::Rooftop,
            "RANGE_INTERPOLATED" => Self::RangeInterpolated,
            "GEOMETRIC_CENTER" => Self::GeometricCenter,
            _ => Self::Approximate,
        }
    }

    /// Whether a result with this accuracy is final without a retry.
    #[must_use]
    pub const fn is_trusted(self) -> bool {
        !matches!(self, Self::Approximate | Self::NotFound)
    }
}

/// Result of one coordinate lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geocode {
    pub point: Option<GeoPoint>,
    pub accuracy: Accuracy,
}

impl Geocode {
    #[must_use]
    pub const fn found(point: GeoPoint, accuracy: Accuracy) -> Self {
        Self {
            point: Some(point),
            accuracy,
        }
    }

    #[must_use]
    pub const fn not_found() -> Self {
        Self {
            point: None,
            accuracy: Accuracy::NotFound,
        }
    }
}

/// The external call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStep {
    Geocode,
    FindPlace,
    PlaceDetails,
}

impl fmt::Display for LookupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Geocode => "geocode",
            Self::FindPlace => "find_place",
            Self::PlaceDetails => "place_details",
        })
    }
}

/// Errors from the external geocoding services.
#[derive(Debug, Error)]
pub enum GeocodingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: String, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// No answer within the per-call budget.
    #[error("{step} timed out after {after:?}")]
    Timeout { step: LookupStep, after: Duration },
}

/// Address text to coordinates.
#[async_trait]
pub trait CoordinateGeocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Geocode, GeocodingError>;
}

/// Free-text place search and place details.
#[async_trait]
pub trait PlaceProvider: Send + Sync {
    /// Id of the first candidate, if any.
    async fn find_place(&self, input: &str) -> Result<Option<String>, GeocodingError>;

    /// Raw details payload for a place.
    async fn place_details(&self, place_id: &str) -> Result<JsonValue, GeocodingError>;
}

/// The address fields a resolution is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressQuery {
    pub label: String,
    pub address_line_1: String,
    pub city: String,
}

impl AddressQuery {
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        address_line_1: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            address_line_1: address_line_1.into(),
            city: city.into(),
        }
    }

    /// Geocoder input tried first.
    #[must_use]
    pub fn primary_geocode_input(&self) -> String {
        join_words(&self.label, &self.city)
    }

    /// Geocoder input used when the first answer is not trusted.
    #[must_use]
    pub fn fallback_geocode_input(&self) -> String {
        join_words(&self.address_line_1, &self.city)
    }

    /// Place search input.
    #[must_use]
    pub fn place_input(&self) -> String {
        join_words(&self.label, &self.address_line_1)
    }
}

fn join_words(a: &str, b: &str) -> String {
    format!("{} {}", a.trim(), b.trim()).trim().to_string()
}

/// A matched place with its trimmed details.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceMatch {
    pub place_id: String,
    pub details: JsonValue,
}

/// A fully resolved location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationResolution {
    pub point: GeoPoint,
    pub accuracy: Accuracy,
    pub place_id: String,
    pub place_information: JsonValue,
}

impl LocationResolution {
    /// The pickup to store for this resolution.
    #[must_use]
    pub fn into_pickup(self) -> NewPickup {
        NewPickup {
            geo_location: self.point,
            place_id: Some(self.place_id),
            place_information: Some(self.place_information),
        }
    }
}

/// Outcome of resolving an address.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(LocationResolution),
    NotFound,
}

impl Resolution {
    /// Combine the two lookups. Both must have produced something.
    #[must_use]
    pub fn join(coordinates: Geocode, place: Option<PlaceMatch>) -> Self {
        match (coordinates.point, place) {
            (Some(point), Some(place)) => Self::Resolved(LocationResolution {
                point,
                accuracy: coordinates.accuracy,
                place_id: place.place_id,
                place_information: place.details,
            }),
            _ => Self::NotFound,
        }
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Drop `reviews` and keep at most the first photo of a details payload.
#[must_use]
pub fn trim_place_details(mut details: JsonValue) -> JsonValue {
    if let Some(object) = details.as_object_mut() {
        object.remove("reviews");
        if let Some(photos) = object.get_mut("photos").and_then(JsonValue::as_array_mut) {
            photos.truncate(1);
        }
    }
    details
}

/// Resolves addresses through a coordinate geocoder and a place provider.
#[derive(Clone)]
pub struct LocationResolver {
    geocoder: Arc<dyn CoordinateGeocoder>,
    places: Arc<dyn PlaceProvider>,
    call_timeout: Duration,
}

impl LocationResolver {
    #[must_use]
    pub fn new(
        geocoder: Arc<dyn CoordinateGeocoder>,
        places: Arc<dyn PlaceProvider>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            geocoder,
            places,
            call_timeout,
        }
    }

    /// Resolve an address. Never fails: every error becomes `NotFound`.
    #[instrument(skip(self), fields(label = %address.label, city = %address.city))]
    pub async fn resolve(&self, address: &AddressQuery) -> Resolution {
        let (coordinates, place) =
            tokio::join!(self.coordinates(address), self.place(address));

        let resolution = Resolution::join(coordinates, place);
        if !resolution.is_resolved() {
            tracing::debug!("Address did not resolve");
        }
        resolution
    }

    async fn coordinates(&self, address: &AddressQuery) -> Geocode {
        let first = self
            .guarded(
                LookupStep::Geocode,
                address,
                self.geocoder.geocode(&address.primary_geocode_input()),
            )
            .await
            .unwrap_or_else(Geocode::not_found);

        if first.accuracy.is_trusted() && first.point.is_some() {
            return first;
        }

        tracing::debug!(accuracy = ?first.accuracy, "Retrying geocode with street address");
        self.guarded(
            LookupStep::Geocode,
            address,
            self.geocoder.geocode(&address.fallback_geocode_input()),
        )
        .await
        .unwrap_or_else(Geocode::not_found)
    }

    async fn place(&self, address: &AddressQuery) -> Option<PlaceMatch> {
        let place_id = self
            .guarded(
                LookupStep::FindPlace,
                address,
                self.places.find_place(&address.place_input()),
            )
            .await
            .flatten()?;

        let details = self
            .guarded(
                LookupStep::PlaceDetails,
                address,
                self.places.place_details(&place_id),
            )
            .await?;

        Some(PlaceMatch {
            place_id,
            details: trim_place_details(details),
        })
    }

    /// Apply the per-call timeout and log any failure.
    async fn guarded<T>(
        &self,
        step: LookupStep,
        address: &AddressQuery,
        call: impl Future<Output = Result<T, GeocodingError>>,
    ) -> Option<T> {
        let result = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GeocodingError::Timeout {
                step,
                after: self.call_timeout,
            }),
        };

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    step = %step,
                    label = %address.label,
                    city = %address.city,
                    "Geocoding lookup failed"
                );
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct ScriptedGeocoder {
        answers: HashMap<String, Geocode>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CoordinateGeocoder for ScriptedGeocoder {
        async fn geocode(&self, address: &str) -> Result<Geocode, GeocodingError> {
            self.calls.lock().unwrap().push(address.to_string());
            Ok(self
                .answers
                .get(address)
                .copied()
                .unwrap_or_else(Geocode::not_found))
        }
    }

    struct FixedPlaces {
        place_id: Option<&'static str>,
        stall: bool,
    }

    #[async_trait]
    impl PlaceProvider for FixedPlaces {
        async fn find_place(&self, _input: &str) -> Result<Option<String>, GeocodingError> {
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(self.place_id.map(ToString::to_string))
        }

        async fn place_details(&self, place_id: &str) -> Result<JsonValue, GeocodingError> {
            Ok(json!({
                "place_id": place_id,
                "reviews": [{"text": "great"}],
                "photos": [{"ref": 1}, {"ref": 2}],
            }))
        }
    }

    fn address() -> AddressQuery {
        AddressQuery::new("Café Kranzler", "Kurfürstendamm 18", "Berlin")
    }

    fn point() -> GeoPoint {
        GeoPoint::new(52.5037, 13.3319).unwrap()
    }

    fn resolver(geocoder: Arc<ScriptedGeocoder>, places: FixedPlaces) -> LocationResolver {
        LocationResolver::new(geocoder, Arc::new(places), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_approximate_triggers_street_fallback() {
        let geocoder = Arc::new(ScriptedGeocoder {
            answers: HashMap::from([
                (
                    "Café Kranzler Berlin".to_string(),
                    Geocode::found(GeoPoint::new(52.52, 13.40).unwrap(), Accuracy::Approximate),
                ),
                (
                    "Kurfürstendamm 18 Berlin".to_string(),
                    Geocode::found(point(), Accuracy::Rooftop),
                ),
            ]),
            ..ScriptedGeocoder::default()
        });
        let places = FixedPlaces {
            place_id: Some("ChIJ123"),
            stall: false,
        };

        let resolution = resolver(Arc::clone(&geocoder), places)
            .resolve(&address())
            .await;

        assert_eq!(
            *geocoder.calls.lock().unwrap(),
            vec!["Café Kranzler Berlin", "Kurfürstendamm 18 Berlin"]
        );
        let Resolution::Resolved(location) = resolution else {
            panic!("expected resolution");
        };
        assert_eq!(location.point, point());
        assert_eq!(location.accuracy, Accuracy::Rooftop);
        assert_eq!(location.place_id, "ChIJ123");
        assert!(location.place_information.get("reviews").is_none());
        assert_eq!(location.place_information["photos"], json!([{"ref": 1}]));
    }

    #[tokio::test]
    async fn test_trusted_first_answer_is_final() {
        let geocoder = Arc::new(ScriptedGeocoder {
            answers: HashMap::from([(
                "Café Kranzler Berlin".to_string(),
                Geocode::found(point(), Accuracy::GeometricCenter),
            )]),
            ..ScriptedGeocoder::default()
        });
        let places = FixedPlaces {
            place_id: Some("ChIJ123"),
            stall: false,
        };

        let resolution = resolver(Arc::clone(&geocoder), places)
            .resolve(&address())
            .await;

        assert!(resolution.is_resolved());
        assert_eq!(geocoder.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_place_candidate_is_not_found() {
        let geocoder = Arc::new(ScriptedGeocoder {
            answers: HashMap::from([(
                "Café Kranzler Berlin".to_string(),
                Geocode::found(point(), Accuracy::Rooftop),
            )]),
            ..ScriptedGeocoder::default()
        });
        let places = FixedPlaces {
            place_id: None,
            stall: false,
        };

        assert_eq!(
            resolver(geocoder, places).resolve(&address()).await,
            Resolution::NotFound
        );
    }

    #[tokio::test]
    async fn test_no_coordinates_is_not_found() {
        let places = FixedPlaces {
            place_id: Some("ChIJ123"),
            stall: false,
        };
        let resolution = resolver(Arc::new(ScriptedGeocoder::default()), places)
            .resolve(&address())
            .await;
        assert_eq!(resolution, Resolution::NotFound);
    }

    #[tokio::test]
    async fn test_stalled_call_times_out() {
        let geocoder = Arc::new(ScriptedGeocoder {
            answers: HashMap::from([(
                "Café Kranzler Berlin".to_string(),
                Geocode::found(point(), Accuracy::Rooftop),
            )]),
            ..ScriptedGeocoder::default()
        });
        let places = FixedPlaces {
            place_id: Some("ChIJ123"),
            stall: true,
        };

        assert_eq!(
            resolver(geocoder, places).resolve(&address()).await,
            Resolution::NotFound
        );
    }

    #[test]
    fn test_trim_place_details_without_photos() {
        let trimmed = trim_place_details(json!({"name": "x", "reviews": []}));
        assert_eq!(trimmed, json!({"name": "x"}));
    }

    #[test]
    fn test_address_inputs() {
        let a = AddressQuery::new("Shop", "", "Graz");
        assert_eq!(a.primary_geocode_input(), "Shop Graz");
        assert_eq!(a.fallback_geocode_input(), "Graz");
        assert_eq!(a.place_input(), "Shop");
    }

    #[test]
    fn test_accuracy_mapping() {
        assert!(Accuracy::from_location_type("ROOFTOP").is_trusted());
        assert!(!Accuracy::from_location_type("APPROXIMATE").is_trusted());
        assert!(!Accuracy::from_location_type("SOMETHING_NEW").is_trusted());
    }
}
