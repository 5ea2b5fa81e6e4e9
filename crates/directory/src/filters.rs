//! Filter registry and search parameter validation.
//!
//! Search requests carry their filters as `filter[<name>]=<value>` query
//! pairs. Every name is looked up in [`FILTER_REGISTRY`]; anything not listed
//! there is rejected before a query is built. Each accepted filter is
//! compiled into a store [`Predicate`], except the "void" filters (`limit`
//! and `radius`) which only configure other filters.

use std::num::IntErrorKind;

use thiserror::Error;
use url::form_urlencoded;

use shopmap_core::{BoundingBox, GeoPoint, Radius};

use crate::db::{FlagField, Predicate, ShopQuery, TextField};

/// Page size when `filter[limit]` is absent.
pub const DEFAULT_LIMIT: u32 = 20;

/// Larger limits are clamped to this value.
pub const MAX_LIMIT: u32 = 200;

/// Radius in kilometres when `filter[location]` is given without `filter[radius]`.
pub const DEFAULT_RADIUS_KM: f64 = 50.0;

/// How a registered filter is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Case-insensitive substring match; commas separate alternatives.
    Partial(TextField),
    /// Exact boolean match.
    Exact(FlagField),
    /// `swLat,swLng,neLat,neLng`.
    BoundingBox,
    /// `lat,lng` center of a radius search.
    Location,
    /// Allowed, but never a predicate of its own.
    Void,
}

/// Every filter a search request may use.
pub const FILTER_REGISTRY: &[(&str, FilterKind)] = &[
    ("label", FilterKind::Partial(TextField::Label)),
    ("email", FilterKind::Partial(TextField::Email)),
    ("city", FilterKind::Partial(TextField::City)),
    ("country", FilterKind::Partial(TextField::Country)),
    ("description", FilterKind::Partial(TextField::Description)),
    ("address_line_1", FilterKind::Partial(TextField::AddressLine1)),
    ("address_line_2", FilterKind::Partial(TextField::AddressLine2)),
    ("address_line_3", FilterKind::Partial(TextField::AddressLine3)),
    ("website", FilterKind::Partial(TextField::Website)),
    ("zip", FilterKind::Partial(TextField::Zip)),
    ("digital_goods", FilterKind::Exact(FlagField::DigitalGoods)),
    ("bounding_box", FilterKind::BoundingBox),
    ("location", FilterKind::Location),
    ("limit", FilterKind::Void),
    ("radius", FilterKind::Void),
];

/// Look up a filter by name.
#[must_use]
pub fn lookup(name: &str) -> Option<FilterKind> {
    FILTER_REGISTRY
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, kind)| *kind)
}

/// One or more problems with a search request, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .0.join("; "))]
pub struct ValidationError(pub Vec<String>);

/// A validated search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub predicates: Vec<Predicate>,
    pub limit: u32,
    pub page: u64,
    /// The caller's query pairs minus `page`, kept for pagination links.
    pub query_pairs: Vec<(String, String)>,
}

impl SearchParams {
    /// Parse and validate a raw query string.
    ///
    /// # Errors
    ///
    /// Returns every problem found: unknown filter names, malformed limit,
    /// radius, page, coordinates or booleans.
    pub fn from_query(raw: Option<&str>) -> Result<Self, ValidationError> {
        let mut filters: Vec<(String, String)> = Vec::new();
        let mut page_value: Option<String> = None;
        let mut query_pairs = Vec::new();

        for (key, value) in form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            if key == "page" {
                page_value = Some(value.into_owned());
                continue;
            }
            if let Some(name) = filter_name(&key) {
                // Repeated keys: the last one wins.
                filters.retain(|(existing, _)| existing != name);
                filters.push((name.to_string(), value.to_string()));
            }
            query_pairs.push((key.into_owned(), value.into_owned()));
        }

        let mut errors = Vec::new();

        let unknown: Vec<&str> = filters
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| lookup(name).is_none())
            .collect();
        if !unknown.is_empty() {
            let allowed: Vec<&str> = FILTER_REGISTRY.iter().map(|(name, _)| *name).collect();
            errors.push(format!(
                "Requested filter(s) `{}` are not allowed. Allowed filter(s) are `{}`.",
                unknown.join(", "),
                allowed.join(", ")
            ));
        }

        let value_of = |name: &str| {
            filters
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.trim())
                .filter(|v| !v.is_empty())
        };

        let limit = parse_limit(value_of("limit")).unwrap_or_else(|e| {
            errors.push(e);
            DEFAULT_LIMIT
        });
        let radius = parse_radius(value_of("radius"));
        let page = parse_page(page_value.as_deref().map(str::trim).filter(|v| !v.is_empty()))
            .unwrap_or_else(|e| {
                errors.push(e);
                1
            });

        let mut predicates = Vec::new();
        for &(name, kind) in FILTER_REGISTRY {
            let Some(value) = value_of(name) else {
                continue;
            };
            match kind {
                FilterKind::Partial(field) => {
                    let any_of: Vec<String> = value
                        .split(',')
                        .map(str::trim)
                        .filter(|part| !part.is_empty())
                        .map(ToString::to_string)
                        .collect();
                    if !any_of.is_empty() {
                        predicates.push(Predicate::Contains { field, any_of });
                    }
                }
                FilterKind::Exact(field) => match parse_bool(value) {
                    Some(value) => predicates.push(Predicate::Equals { field, value }),
                    None => errors.push(format!("Filter `{name}` must be a boolean.")),
                },
                FilterKind::BoundingBox => match BoundingBox::parse(value) {
                    Ok(bbox) => predicates.push(Predicate::WithinBox(bbox)),
                    Err(e) => errors.push(format!("Invalid bounding box: {e}.")),
                },
                FilterKind::Location => match (GeoPoint::parse(value), &radius) {
                    (Ok(center), Ok(radius)) => predicates.push(Predicate::WithinRadius {
                        center,
                        radius: *radius,
                    }),
                    (Err(e), _) => errors.push(format!("Invalid location: {e}.")),
                    // reported below
                    (Ok(_), Err(_)) => {}
                },
                FilterKind::Void => {}
            }
        }

        if let Err(e) = radius {
            errors.push(e);
        }

        if !errors.is_empty() {
            return Err(ValidationError(errors));
        }

        Ok(Self {
            predicates,
            limit,
            page,
            query_pairs,
        })
    }

    /// Number of matches skipped before the current page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(u64::from(self.limit))
    }

    /// Compile into a store query.
    #[must_use]
    pub fn to_query(&self) -> ShopQuery {
        ShopQuery {
            predicates: self.predicates.clone(),
            limit: self.limit,
            offset: self.offset(),
        }
    }
}

fn filter_name(key: &str) -> Option<&str> {
    key.strip_prefix("filter[")?.strip_suffix(']')
}

fn parse_limit(value: Option<&str>) -> Result<u32, String> {
    let Some(value) = value else {
        return Ok(DEFAULT_LIMIT);
    };
    let limit: i64 = match value.parse() {
        Ok(limit) => limit,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => return Ok(MAX_LIMIT),
            IntErrorKind::NegOverflow => {
                return Err("The limit must be greater than zero.".to_string());
            }
            _ => return Err("Unable to parse limit into int.".to_string()),
        },
    };
    if limit <= 0 {
        return Err("The limit must be greater than zero.".to_string());
    }
    Ok(u32::try_from(limit).map_or(MAX_LIMIT, |l| l.min(MAX_LIMIT)))
}

fn parse_radius(value: Option<&str>) -> Result<Radius, String> {
    let Some(value) = value else {
        return Radius::from_km(DEFAULT_RADIUS_KM).map_err(|e| e.to_string());
    };
    let km: f64 = value
        .parse()
        .map_err(|_| "Unable to parse radius into float.".to_string())?;
    Radius::from_km(km).map_err(|_| "The radius must be a positive number.".to_string())
}

fn parse_page(value: Option<&str>) -> Result<u64, String> {
    let Some(value) = value else {
        return Ok(1);
    };
    match value.parse::<u64>() {
        Ok(page) if page > 0 => Ok(page),
        _ => Err("The page must be a positive integer.".to_string()),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
