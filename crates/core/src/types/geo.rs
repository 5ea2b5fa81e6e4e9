//! Geospatial primitives: WGS84 points, bounding boxes and search radii.
//!
//! Distances are great-circle distances on a sphere with the WGS84 mean
//! radius. This is the same sphere `PostGIS` uses for
//! `ST_DWithin(geography, geography, meters, false)`, so the SQL store and the
//! in-memory store agree on which points lie inside a radius.

use core::fmt;

use serde::{Deserialize, Serialize};

/// WGS84 mean earth radius in kilometres (`(2a + b) / 3`).
pub const EARTH_RADIUS_KM: f64 = 6_371.008_771_4;

/// Errors produced when parsing or constructing geo values.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    /// A coordinate component was not a number.
    #[error("'{0}' is not a number")]
    NotANumber(String),
    /// Latitude outside [-90, 90] or not finite.
    #[error("latitude {0} is out of range [-90, 90]")]
    LatitudeOutOfRange(f64),
    /// Longitude outside [-180, 180] or not finite.
    #[error("longitude {0} is out of range [-180, 180]")]
    LongitudeOutOfRange(f64),
    /// Wrong number of comma-separated components.
    #[error("expected {expected} comma-separated coordinates, got {got}")]
    Arity {
        /// Components the format requires.
        expected: usize,
        /// Components actually supplied.
        got: usize,
    },
    /// South-west corner is not south-west of the north-east corner.
    #[error("bounding box corners are inverted (south-west must not exceed north-east)")]
    InvertedBox,
    /// Radius is zero, negative or not finite.
    #[error("radius must be a positive finite number, got {0}")]
    InvalidRadius(f64),
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    lat: f64,
    lng: f64,
}

impl GeoPoint {
    /// Create a point, rejecting out-of-range or non-finite values.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::LatitudeOutOfRange`] or
    /// [`GeoError::LongitudeOutOfRange`].
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::LatitudeOutOfRange(lat));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(GeoError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    /// Parse `"lat,lng"`.
    ///
    /// # Errors
    ///
    /// Returns a [`GeoError`] for wrong arity, non-numeric or out-of-range values.
    pub fn parse(s: &str) -> Result<Self, GeoError> {
        let [lat, lng] = parse_components::<2>(s)?;
        Self::new(lat, lng)
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn lng(&self) -> f64 {
        self.lng
    }

    /// Haversine great-circle distance in kilometres.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.lng - self.lng).to_radians();

        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// An axis-aligned box given by its south-west and north-east corners.
///
/// Boxes crossing the antimeridian are not representable; such input is
/// rejected as inverted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBoundingBox")]
pub struct BoundingBox {
    south_west: GeoPoint,
    north_east: GeoPoint,
}

impl BoundingBox {
    /// Create a box from its corners.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvertedBox`] when min exceeds max on either axis.
    pub fn new(south_west: GeoPoint, north_east: GeoPoint) -> Result<Self, GeoError> {
        if south_west.lat > north_east.lat || south_west.lng > north_east.lng {
            return Err(GeoError::InvertedBox);
        }
        Ok(Self {
            south_west,
            north_east,
        })
    }

    /// Parse `"swLat,swLng,neLat,neLng"`.
    ///
    /// # Errors
    ///
    /// Returns a [`GeoError`] for malformed or inverted input.
    pub fn parse(s: &str) -> Result<Self, GeoError> {
        let [sw_lat, sw_lng, ne_lat, ne_lng] = parse_components::<4>(s)?;
        Self::new(GeoPoint::new(sw_lat, sw_lng)?, GeoPoint::new(ne_lat, ne_lng)?)
    }

    /// South-west corner.
    #[must_use]
    pub const fn south_west(&self) -> GeoPoint {
        self.south_west
    }

    /// North-east corner.
    #[must_use]
    pub const fn north_east(&self) -> GeoPoint {
        self.north_east
    }

    /// Whether `point` lies inside the box, edges included.
    #[must_use]
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.south_west.lat..=self.north_east.lat).contains(&point.lat)
            && (self.south_west.lng..=self.north_east.lng).contains(&point.lng)
    }
}

/// A positive search radius in kilometres.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct Radius(f64);

impl Radius {
    /// Create a radius.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::InvalidRadius`] for zero, negative or non-finite values.
    pub fn from_km(km: f64) -> Result<Self, GeoError> {
        if !km.is_finite() || km <= 0.0 {
            return Err(GeoError::InvalidRadius(km));
        }
        Ok(Self(km))
    }

    /// Radius in kilometres.
    #[must_use]
    pub const fn km(&self) -> f64 {
        self.0
    }

    /// Radius in metres, as `PostGIS` geography functions expect.
    #[must_use]
    pub fn meters(&self) -> f64 {
        self.0 * 1_000.0
    }

    /// Whether `point` is within this radius of `center` (boundary included).
    #[must_use]
    pub fn covers(&self, center: &GeoPoint, point: &GeoPoint) -> bool {
        center.distance_km(point) <= self.0
    }
}

#[derive(Deserialize)]
struct RawGeoPoint {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = GeoError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lng)
    }
}

#[derive(Deserialize)]
struct RawBoundingBox {
    south_west: GeoPoint,
    north_east: GeoPoint,
}

impl TryFrom<RawBoundingBox> for BoundingBox {
    type Error = GeoError;

    fn try_from(raw: RawBoundingBox) -> Result<Self, Self::Error> {
        Self::new(raw.south_west, raw.north_east)
    }
}

impl TryFrom<f64> for Radius {
    type Error = GeoError;

    fn try_from(km: f64) -> Result<Self, Self::Error> {
        Self::from_km(km)
    }
}

impl From<Radius> for f64 {
    fn from(radius: Radius) -> Self {
        radius.0
    }
}

fn parse_components<const N: usize>(s: &str) -> Result<[f64; N], GeoError> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(GeoError::Arity {
            expected: N,
            got: parts.len(),
        });
    }

    let mut out = [0.0; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse::<f64>()
            .map_err(|_| GeoError::NotANumber(part.to_owned()))?;
    }
    Ok(out)
}
