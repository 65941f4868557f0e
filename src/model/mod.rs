use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::schema::ResolutionMap;

/// A single untyped spreadsheet cell as read from a source sheet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    /// Blank cell.
    #[default]
    Empty,
    /// Text cell.
    Text(String),
    /// Numeric cell. Integers read from the workbook are widened to `f64`.
    Number(f64),
    /// Boolean cell.
    Boolean(bool),
    /// Date/time cell kept as its Excel serial so it can be written back
    /// unchanged.
    DateTime(f64),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(value) => f.write_str(value),
            CellValue::Number(value) => write!(f, "{value}"),
            CellValue::Boolean(value) => write!(f, "{value}"),
            CellValue::DateTime(serial) => match excel_serial_to_datetime(*serial) {
                Some(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
                None => write!(f, "{serial}"),
            },
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

/// Last serial Excel can display (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_466.0;

// 1900 date system; serials before 61 are not corrected for Excel's phantom
// 1900-02-29.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !(0.0..MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

/// A source sheet exactly as it was read: the first row becomes the headers,
/// every following row is kept positionally. Header cells keep their type so
/// numeric or date headers are written back unchanged; they need not be
/// unique.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<CellValue>,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    pub fn new(headers: Vec<CellValue>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    /// Header labels as text.
    pub fn header_labels(&self) -> Vec<String> {
        self.headers.iter().map(ToString::to_string).collect()
    }

    /// Returns the cell at `row`/`column`, treating ragged rows as blank.
    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&EMPTY)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// The subtotal rows of one source projected to the fixed display order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubtotalTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SubtotalTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Iterates over the values of `field`, or nothing when the field is not
    /// part of the table.
    pub fn column<'a>(&'a self, field: &str) -> impl Iterator<Item = &'a CellValue> + 'a {
        let index = self.headers.iter().position(|header| header == field);
        self.rows
            .iter()
            .filter_map(move |row| index.and_then(|index| row.get(index)))
    }
}

/// Row count and per-field sums of one subtotal table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregate {
    pub row_count: usize,
    pub sums: IndexMap<String, f64>,
}

impl Aggregate {
    /// Sum recorded for `field`, 0 when the field was never aggregated.
    pub fn sum(&self, field: &str) -> f64 {
        self.sums.get(field).copied().unwrap_or(0.0)
    }
}

/// One input file as supplied by the caller.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Display label: the file name without its spreadsheet extension.
    pub fn label(&self) -> String {
        file_label(&self.name)
    }
}

/// Strips a trailing `.xlsx`/`.xlsm` (any case) and surrounding whitespace.
/// Falls back to the untouched name when nothing would remain.
pub fn file_label(name: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, extension))
            if extension.eq_ignore_ascii_case("xlsx") || extension.eq_ignore_ascii_case("xlsm") =>
        {
            stem
        }
        _ => name,
    };
    let label = stem.trim();
    if label.is_empty() {
        name.to_string()
    } else {
        label.to_string()
    }
}

/// Everything produced for one input file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileResult {
    pub label: String,
    pub source_sheet: String,
    pub raw: RawTable,
    pub resolution: ResolutionMap,
    pub subtotal: SubtotalTable,
    pub aggregate: Aggregate,
    /// Non-blank numeric cells that could not be parsed and became 0.
    pub coercion_losses: usize,
}

/// One line of the cross-source summary sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub label: String,
    pub source_sheet: String,
    pub row_count: usize,
    pub sums: IndexMap<String, f64>,
}

/// Summary rows ordered by the primary sum field, descending.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryTable {
    pub primary_field: String,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// Builds the summary in processing order and sorts it by
    /// `primary_field` descending. The sort is stable so ties keep the order
    /// in which files were supplied.
    pub fn from_results(results: &[FileResult], primary_field: &str) -> Self {
        let mut rows: Vec<SummaryRow> = results
            .iter()
            .map(|result| SummaryRow {
                label: result.label.clone(),
                source_sheet: result.source_sheet.clone(),
                row_count: result.aggregate.row_count,
                sums: result.aggregate.sums.clone(),
            })
            .collect();

        rows.sort_by(|lhs, rhs| {
            let lhs = lhs.sums.get(primary_field).copied().unwrap_or(0.0);
            let rhs = rhs.sums.get(primary_field).copied().unwrap_or(0.0);
            rhs.total_cmp(&lhs)
        });

        Self {
            primary_field: primary_field.to_string(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_strips_spreadsheet_extension_only() {
        assert_eq!(file_label("1월 청구.xlsx"), "1월 청구");
        assert_eq!(file_label("report.XLSX"), "report");
        assert_eq!(file_label("notes.txt"), "notes.txt");
        assert_eq!(file_label(" .xlsx"), " .xlsx");
    }

    #[test]
    fn datetime_serial_renders_as_date() {
        let cell = CellValue::DateTime(45292.5);
        assert_eq!(cell.to_string(), "2024-01-01 12:00:00");
    }

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(CellValue::Number(1000.0).to_string(), "1000");
        assert_eq!(CellValue::Number(12.5).to_string(), "12.5");
    }
}
