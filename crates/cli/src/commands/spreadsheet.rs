//! Spreadsheet reading for imports.
//!
//! The first row of the sheet is the header row. Header cells are normalized
//! by the directory's import module, so `Column1.CompanyName` and
//! `column1companyname` address the same column.

use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};
use thiserror::Error;

use shopmap_directory::import::ImportRow;

/// Errors that can occur while reading a spreadsheet.
#[derive(Debug, Error)]
pub enum SpreadsheetError {
    #[error("Failed to open workbook: {0}")]
    Open(String),

    #[error("Workbook has no worksheets")]
    NoWorksheet,

    #[error("Worksheet `{requested}` not found (available: {})", available.join(", "))]
    MissingSheet {
        requested: String,
        available: Vec<String>,
    },

    #[error("Worksheet has no header row")]
    NoHeaderRow,
}

/// Read every data row of `sheet` (or the first sheet) into import rows.
///
/// # Errors
///
/// Returns `SpreadsheetError` if the file cannot be opened, the sheet is
/// missing or the sheet is empty.
pub fn read_rows(path: &Path, sheet: Option<&str>) -> Result<Vec<ImportRow>, SpreadsheetError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| SpreadsheetError::Open(e.to_string()))?;

    let available = workbook.sheet_names();
    let used_sheet = match sheet {
        Some(requested) if available.iter().any(|s| s == requested) => requested.to_string(),
        Some(requested) => {
            return Err(SpreadsheetError::MissingSheet {
                requested: requested.to_string(),
                available,
            });
        }
        None => available.first().cloned().ok_or(SpreadsheetError::NoWorksheet)?,
    };

    tracing::debug!(sheet = %used_sheet, "Reading worksheet");
    let range = workbook
        .worksheet_range(&used_sheet)
        .map_err(|e| SpreadsheetError::Open(e.to_string()))?;

    rows_from_range(&range)
}

fn rows_from_range(range: &Range<Data>) -> Result<Vec<ImportRow>, SpreadsheetError> {
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or(SpreadsheetError::NoHeaderRow)?
        .iter()
        .map(cell_string)
        .collect();

    Ok(rows
        .map(|cells| {
            let cells: Vec<String> = cells.iter().map(cell_string).collect();
            ImportRow::from_cells(&headers, &cells)
        })
        .collect())
}

/// Render a cell as text. Whole numbers lose their decimal part, since
/// partner numbers and zip codes arrive as floats.
fn cell_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{v:.0}"),
        Data::Float(v) => v.to_string(),
        Data::Int(v) => v.to_string(),
        Data::Bool(v) => v.to_string(),
        Data::DateTime(v) => v.as_f64().to_string(),
    }
}
