//! Store-level query language for shop searches.
//!
//! The filter registry compiles untrusted query parameters into these
//! predicates; each store then evaluates them, either as SQL or in memory.
//! Column names only ever come from the closed [`TextField`] and
//! [`FlagField`] enums, never from request input.

use shopmap_core::{BoundingBox, GeoPoint, Radius};

use crate::models::{Pickup, ShopFields};

/// Free-text shop columns eligible for substring matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Label,
    Email,
    Description,
    AddressLine1,
    AddressLine2,
    AddressLine3,
    City,
    Country,
    Zip,
    Website,
}

impl TextField {
    /// SQL column name.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Email => "email",
            Self::Description => "description",
            Self::AddressLine1 => "address_line_1",
            Self::AddressLine2 => "address_line_2",
            Self::AddressLine3 => "address_line_3",
            Self::City => "city",
            Self::Country => "country",
            Self::Zip => "zip",
            Self::Website => "website",
        }
    }

    /// The field's value on an in-memory shop.
    #[must_use]
    pub fn value(self, fields: &ShopFields) -> Option<&str> {
        match self {
            Self::Label => Some(fields.label.as_str()),
            Self::Email => fields.email.as_ref().map(shopmap_core::Email::as_str),
            Self::Description => fields.description.as_deref(),
            Self::AddressLine1 => fields.address_line_1.as_deref(),
            Self::AddressLine2 => fields.address_line_2.as_deref(),
            Self::AddressLine3 => fields.address_line_3.as_deref(),
            Self::City => fields.city.as_deref(),
            Self::Country => fields.country.as_deref(),
            Self::Zip => fields.zip.as_deref(),
            Self::Website => fields.website.as_deref(),
        }
    }
}

/// Boolean shop columns eligible for exact matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagField {
    DigitalGoods,
}

impl FlagField {
    /// SQL column name.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::DigitalGoods => "digital_goods",
        }
    }

    /// The field's value on an in-memory shop.
    #[must_use]
    pub const fn value(self, fields: &ShopFields) -> bool {
        match self {
            Self::DigitalGoods => fields.digital_goods,
        }
    }
}

/// One condition a shop must satisfy. A query is the conjunction of its predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Case-insensitive substring match against any of the needles.
    Contains {
        field: TextField,
        any_of: Vec<String>,
    },
    /// Exact boolean match.
    Equals { field: FlagField, value: bool },
    /// Some pickup of the shop lies inside the box (edges included).
    WithinBox(BoundingBox),
    /// Some pickup of the shop lies within `radius` great-circle distance of `center`.
    WithinRadius { center: GeoPoint, radius: Radius },
}

impl Predicate {
    /// Evaluate against a shop and its pickups.
    #[must_use]
    pub fn matches(&self, fields: &ShopFields, pickups: &[&Pickup]) -> bool {
        match self {
            Self::Contains { field, any_of } => field.value(fields).is_some_and(|value| {
                let haystack = value.to_lowercase();
                any_of
                    .iter()
                    .any(|needle| haystack.contains(&needle.to_lowercase()))
            }),
            Self::Equals { field, value } => field.value(fields) == *value,
            Self::WithinBox(bbox) => pickups.iter().any(|p| bbox.contains(&p.geo_location)),
            Self::WithinRadius { center, radius } => pickups
                .iter()
                .any(|p| radius.covers(center, &p.geo_location)),
        }
    }

    /// Whether evaluating this predicate needs the shop's pickups.
    #[must_use]
    pub const fn is_spatial(&self) -> bool {
        matches!(self, Self::WithinBox(_) | Self::WithinRadius { .. })
    }
}

/// A compiled, paginated shop query.
#[derive(Debug, Clone, PartialEq)]
pub struct ShopQuery {
    pub predicates: Vec<Predicate>,
    pub limit: u32,
    pub offset: u64,
}

/// Build a `LIKE` pattern matching `needle` anywhere, with wildcards escaped.
#[must_use]
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
