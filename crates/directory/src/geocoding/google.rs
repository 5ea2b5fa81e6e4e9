//! Google Maps Geocoding and Places client.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::instrument;
use url::Url;

use shopmap_core::GeoPoint;

use super::{Accuracy, CoordinateGeocoder, Geocode, GeocodingError, PlaceProvider};
use crate::config::GeocodingConfig;

const GEOCODE_PATH: &str = "/maps/api/geocode/json";
const FIND_PLACE_PATH: &str = "/maps/api/place/findplacefromtext/json";
const PLACE_DETAILS_PATH: &str = "/maps/api/place/details/json";

/// Client for the Google Maps web services used by the importer.
#[derive(Clone)]
pub struct GoogleMapsClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl GoogleMapsClient {
    /// Create a new client. Every request carries the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &GeocodingConfig) -> Result<Self, GeocodingError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, GeocodingError> {
        Url::parse_with_params(
            &format!("{}{path}", self.base_url),
            params
                .iter()
                .copied()
                .chain([("key", self.api_key.expose_secret())]),
        )
        .map_err(|e| GeocodingError::Parse(format!("invalid request URL: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, GeocodingError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeocodingError::Api {
                status: status.as_u16().to_string(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GeocodingError::Parse(e.to_string()))
    }
}

/// Google reports failures in the body; only `OK` and `ZERO_RESULTS` carry data.
fn check_status(status: &str, error_message: Option<String>) -> Result<bool, GeocodingError> {
    match status {
        "OK" => Ok(true),
        "ZERO_RESULTS" => Ok(false),
        other => Err(GeocodingError::Api {
            status: other.to_string(),
            message: error_message.unwrap_or_default(),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
    location_type: String,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct FindPlaceResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    place_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    error_message: Option<String>,
    result: Option<JsonValue>,
}

impl GeocodeResponse {
    fn into_geocode(self) -> Result<Geocode, GeocodingError> {
        if !check_status(&self.status, self.error_message)? {
            return Ok(Geocode::not_found());
        }
        let Some(first) = self.results.into_iter().next() else {
            return Ok(Geocode::not_found());
        };

        let location = first.geometry.location;
        let point = GeoPoint::new(location.lat, location.lng)
            .map_err(|e| GeocodingError::Parse(format!("invalid coordinates: {e}")))?;
        Ok(Geocode::found(
            point,
            Accuracy::from_location_type(&first.geometry.location_type),
        ))
    }
}

impl FindPlaceResponse {
    fn into_place_id(self) -> Result<Option<String>, GeocodingError> {
        if !check_status(&self.status, self.error_message)? {
            return Ok(None);
        }
        Ok(self.candidates.into_iter().next().and_then(|c| c.place_id))
    }
}

impl DetailsResponse {
    fn into_result(self) -> Result<JsonValue, GeocodingError> {
        check_status(&self.status, self.error_message)?;
        self.result
            .ok_or_else(|| GeocodingError::Parse("details response has no result".to_string()))
    }
}

#[async_trait]
impl CoordinateGeocoder for GoogleMapsClient {
    #[instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<Geocode, GeocodingError> {
        let url = self.url(GEOCODE_PATH, &[("address", address)])?;
        let response: GeocodeResponse = self.get(url).await?;
        response.into_geocode()
    }
}

#[async_trait]
impl PlaceProvider for GoogleMapsClient {
    #[instrument(skip(self))]
    async fn find_place(&self, input: &str) -> Result<Option<String>, GeocodingError> {
        let url = self.url(
            FIND_PLACE_PATH,
            &[
                ("input", input),
                ("inputtype", "textquery"),
                ("fields", "place_id"),
            ],
        )?;
        let response: FindPlaceResponse = self.get(url).await?;
        response.into_place_id()
    }

    #[instrument(skip(self))]
    async fn place_details(&self, place_id: &str) -> Result<JsonValue, GeocodingError> {
        let url = self.url(PLACE_DETAILS_PATH, &[("place_id", place_id)])?;
        let response: DetailsResponse = self.get(url).await?;
        response.into_result()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn parse<T: DeserializeOwned>(value: JsonValue) -> T {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_geocode_response_mapping() {
        let response: GeocodeResponse = parse(json!({
            "status": "OK",
            "results": [{
                "geometry": {
                    "location": {"lat": 48.2082, "lng": 16.3738},
                    "location_type": "APPROXIMATE"
                }
            }]
        }));
        let geocode = response.into_geocode().unwrap();
        assert_eq!(geocode.accuracy, Accuracy::Approximate);
        assert!((geocode.point.unwrap().lat() - 48.2082).abs() < 1e-9);
    }

    #[test]
    fn test_zero_results_is_not_found() {
        let response: GeocodeResponse = parse(json!({"status": "ZERO_RESULTS", "results": []}));
        assert_eq!(response.into_geocode().unwrap(), Geocode::not_found());

        let response: FindPlaceResponse = parse(json!({"status": "ZERO_RESULTS", "candidates": []}));
        assert_eq!(response.into_place_id().unwrap(), None);
    }

    #[test]
    fn test_error_status_is_an_error() {
        let response: GeocodeResponse = parse(json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        }));
        let err = response.into_geocode().unwrap_err();
        assert!(matches!(err, GeocodingError::Api { ref status, .. } if status == "REQUEST_DENIED"));
    }

    #[test]
    fn test_first_candidate_wins() {
        let response: FindPlaceResponse = parse(json!({
            "status": "OK",
            "candidates": [{"place_id": "first"}, {"place_id": "second"}]
        }));
        assert_eq!(response.into_place_id().unwrap().as_deref(), Some("first"));
    }

    #[test]
    fn test_request_url_carries_key_and_params() {
        let client = GoogleMapsClient::new(&GeocodingConfig {
            api_key: SecretString::from("k3y"),
            timeout: Duration::from_secs(1),
            base_url: "http://localhost:9999".to_string(),
        })
        .unwrap();

        let url = client
            .url(FIND_PLACE_PATH, &[("input", "Café Central Wien")])
            .unwrap();
        assert_eq!(url.path(), FIND_PLACE_PATH);
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("input".to_string(), "Café Central Wien".to_string())));
        assert!(pairs.contains(&("key".to_string(), "k3y".to_string())));
    }
}
