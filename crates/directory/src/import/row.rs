//! Header-keyed spreadsheet rows.

use std::collections::HashMap;

use shopmap_core::Email;

use crate::geocoding::AddressQuery;
use crate::models::ShopFields;

/// Normalized header keys the importer reads.
pub mod columns {
    pub const COMPANY_NAME: &str = "column1companyname";
    pub const PARTNER_NUMBER: &str = "column1partnernumber";
    pub const COMPANY_MAIL: &str = "column1companymail";
    pub const ADDRESS_LINES: &str = "column1addressinfoaddresslines";
    pub const ZIP_CODE: &str = "column1addressinfozipcode";
    pub const CITY: &str = "column1addressinfocity";
    pub const COUNTRY: &str = "column1addressinfocountry";
}

/// Normalize a header cell into a record key.
///
/// Letters are lowercased, digits kept, whitespace runs become a single `_`
/// and everything else is dropped: `Column1.CompanyName` becomes
/// `column1companyname`.
#[must_use]
pub fn heading_key(header: &str) -> String {
    let mut key = String::with_capacity(header.len());
    let mut pending_separator = false;

    for c in header.trim().chars() {
        if c.is_alphanumeric() {
            if pending_separator && !key.is_empty() {
                key.push('_');
            }
            pending_separator = false;
            key.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '_' || c == '-' {
            pending_separator = true;
        }
    }

    key
}

/// One spreadsheet row, reduced to the columns the importer understands.
///
/// Blank cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRow {
    pub company_name: Option<String>,
    pub partner_number: Option<String>,
    pub company_mail: Option<String>,
    pub address_lines: Option<String>,
    pub zip_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl ImportRow {
    /// Build a row from a record keyed by normalized headers.
    #[must_use]
    pub fn from_record(record: &HashMap<String, String>) -> Self {
        let cell = |key: &str| {
            record
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(ToString::to_string)
        };

        Self {
            company_name: cell(columns::COMPANY_NAME),
            partner_number: cell(columns::PARTNER_NUMBER),
            company_mail: cell(columns::COMPANY_MAIL),
            address_lines: cell(columns::ADDRESS_LINES),
            zip_code: cell(columns::ZIP_CODE),
            city: cell(columns::CITY),
            country: cell(columns::COUNTRY),
        }
    }

    /// Build a row from raw header cells and the matching value cells.
    ///
    /// Headers are normalized with [`heading_key`]; surplus cells are ignored.
    #[must_use]
    pub fn from_cells(headers: &[String], cells: &[String]) -> Self {
        let record: HashMap<String, String> = headers
            .iter()
            .map(|h| heading_key(h))
            .zip(cells.iter().cloned())
            .collect();
        Self::from_record(&record)
    }

    /// Overwrite the imported columns of `fields`; everything else is kept.
    pub(crate) fn apply_to(&self, mut fields: ShopFields, email: Option<Email>) -> ShopFields {
        fields.label = self.company_name.clone().unwrap_or_default();
        fields.email = email;
        fields.description = None;
        fields.address_line_1.clone_from(&self.address_lines);
        fields.zip.clone_from(&self.zip_code);
        fields.city.clone_from(&self.city);
        fields.country.clone_from(&self.country);
        fields
    }

    /// The address the resolver looks up for this row.
    #[must_use]
    pub fn address_query(&self) -> AddressQuery {
        AddressQuery::new(
            self.company_name.as_deref().unwrap_or_default(),
            self.address_lines.as_deref().unwrap_or_default(),
            self.city.as_deref().unwrap_or_default(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_key() {
        assert_eq!(heading_key("Column1.CompanyName"), "column1companyname");
        assert_eq!(
            heading_key("Column1.AddressInfo.ZipCode"),
            "column1addressinfozipcode"
        );
        assert_eq!(heading_key("  Partner Number "), "partner_number");
        assert_eq!(heading_key("Stra\u{df}e  /  Nr."), "stra\u{df}e_nr");
        assert_eq!(heading_key("???"), "");
    }

    #[test]
    fn test_from_cells_normalizes_headers_and_blanks() {
        let headers = vec![
            "Column1.CompanyName".to_string(),
            "Column1.PartnerNumber".to_string(),
            "Column1.CompanyMail".to_string(),
            "Column1.AddressInfo.City".to_string(),
        ];
        let cells = vec![
            " Kaffeehaus ".to_string(),
            "10042".to_string(),
            "   ".to_string(),
            "Wien".to_string(),
        ];

        let row = ImportRow::from_cells(&headers, &cells);
        assert_eq!(row.company_name.as_deref(), Some("Kaffeehaus"));
        assert_eq!(row.partner_number.as_deref(), Some("10042"));
        assert_eq!(row.company_mail, None);
        assert_eq!(row.city.as_deref(), Some("Wien"));
        assert_eq!(row.country, None);
        assert_eq!(ImportRow::from_cells(&headers, &[]), ImportRow::default());
    }

    #[test]
    fn test_apply_keeps_unimported_fields() {
        let current = ShopFields {
            label: "Old".to_string(),
            description: Some("hand written".to_string()),
            address_line_2: Some("2. Stock".to_string()),
            website: Some("https://example.at".to_string()),
            digital_goods: true,
            ..ShopFields::default()
        };
        let row = ImportRow {
            company_name: Some("New".to_string()),
            zip_code: Some("1010".to_string()),
            ..ImportRow::default()
        };

        let fields = row.apply_to(current, None);
        assert_eq!(fields.label, "New");
        assert_eq!(fields.zip.as_deref(), Some("1010"));
        assert_eq!(fields.description, None);
        assert_eq!(fields.address_line_2.as_deref(), Some("2. Stock"));
        assert_eq!(fields.website.as_deref(), Some("https://example.at"));
        assert!(fields.digital_goods);
    }

    #[test]
    fn test_address_query() {
        let row = ImportRow {
            company_name: Some("Kaffeehaus".to_string()),
            address_lines: Some("Graben 1".to_string()),
            city: Some("Wien".to_string()),
            ..ImportRow::default()
        };
        let query = row.address_query();
        assert_eq!(query.primary_geocode_input(), "Kaffeehaus Wien");
        assert_eq!(query.fallback_geocode_input(), "Graben 1 Wien");
        assert_eq!(query.place_input(), "Kaffeehaus Graben 1");
    }
}
