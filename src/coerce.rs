//! Lenient numeric coercion for billing amounts.
//!
//! Cells are stringified, thousands separators and any character other than
//! digits, `.` and `-` are dropped, and the remainder is parsed. Anything that
//! still does not parse becomes `0`. The loss is reported through
//! [`Coerced::lossy`] rather than as an error.

use crate::model::CellValue;

/// Result of coercing one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coerced {
    pub value: f64,
    /// Set when a non-blank cell could not be parsed and was defaulted to 0.
    pub lossy: bool,
}

/// Converts a cell to a number, defaulting to 0.
pub fn to_number(cell: &CellValue) -> f64 {
    coerce(cell).value
}

/// Converts a cell to a number and records whether the value was lost.
pub fn coerce(cell: &CellValue) -> Coerced {
    match cell {
        CellValue::Number(value) => Coerced {
            value: *value,
            lossy: false,
        },
        CellValue::Empty => Coerced {
            value: 0.0,
            lossy: false,
        },
        other => coerce_text(&other.to_string()),
    }
}

/// Text form of [`coerce`].
pub fn coerce_text(text: &str) -> Coerced {
    let trimmed = text.trim();
    let cleaned: String = trimmed
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == '-')
        .collect();

    match cleaned.parse::<f64>() {
        Ok(value) => Coerced {
            value,
            lossy: false,
        },
        Err(_) => Coerced {
            value: 0.0,
            lossy: !trimmed.is_empty(),
        },
    }
}
