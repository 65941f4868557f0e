//! Subtotal extraction and per-file aggregation.

use indexmap::IndexMap;
use tracing::{debug, instrument, warn};

use crate::coerce::{coerce, to_number};
use crate::config::PipelineConfig;
use crate::error::{Result, ToolError};
use crate::model::{Aggregate, CellValue, RawTable, SubtotalTable};
use crate::schema::{ResolutionMap, resolve};

/// Number of raw headers quoted in a missing-column error.
const HEADER_SAMPLE_LEN: usize = 12;

/// Output of [`extract`].
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub table: SubtotalTable,
    pub resolution: ResolutionMap,
    /// Non-blank numeric cells that were defaulted to 0.
    pub coercion_losses: usize,
}

/// Extracts the subtotal rows of `raw`, projected to the display order with
/// the numeric display fields coerced.
#[instrument(level = "debug", skip_all, fields(rows = raw.rows.len()))]
pub fn extract(raw: &RawTable, config: &PipelineConfig) -> Result<Extraction> {
    let mut canonical = resolve(raw, &config.aliases);

    let missing = canonical
        .resolution()
        .missing(config.effective_required_fields());
    if !missing.is_empty() {
        return Err(ToolError::MissingRequiredFields {
            missing,
            headers: raw
                .headers
                .iter()
                .take(HEADER_SAMPLE_LEN)
                .map(ToString::to_string)
                .collect(),
        });
    }

    if !canonical.resolution().is_resolved(&config.optional_field) {
        debug!(field = %config.optional_field, "optional field absent, synthesising blank column");
        canonical.resolution_mut().synthesize(&config.optional_field);
    }

    let marker = marker_key(&config.subtotal_marker, config.collapse_marker_whitespace);
    let numeric_fields = config.numeric_display_fields();
    let mut coercion_losses = 0;
    let mut rows = Vec::new();

    for row in 0..canonical.row_count() {
        let group = canonical.value(row, &config.grouping_field);
        if marker_key(group, config.collapse_marker_whitespace) != marker {
            continue;
        }

        let cells = config
            .display_fields
            .iter()
            .map(|field| {
                let cell = canonical.value(row, field);
                if numeric_fields.contains(&field.as_str()) {
                    let coerced = coerce(cell);
                    if coerced.lossy {
                        coercion_losses += 1;
                        warn!(row, field = %field, value = %cell, "non-numeric value counted as 0");
                    }
                    CellValue::Number(coerced.value)
                } else {
                    cell.clone()
                }
            })
            .collect();
        rows.push(cells);
    }

    debug!(subtotal_rows = rows.len(), "extracted subtotal rows");

    Ok(Extraction {
        table: SubtotalTable {
            headers: config.display_fields.clone(),
            rows,
        },
        resolution: canonical.into_resolution(),
        coercion_losses,
    })
}

/// Counts the rows of `table` and sums every field in `fields`. A field that
/// is not part of the table sums to 0.
pub fn aggregate<'a>(
    table: &SubtotalTable,
    fields: impl IntoIterator<Item = &'a str>,
) -> Aggregate {
    let sums: IndexMap<String, f64> = fields
        .into_iter()
        .map(|field| {
            let sum = table.column(field).map(to_number).sum();
            (field.to_string(), sum)
        })
        .collect();

    Aggregate {
        row_count: table.row_count(),
        sums,
    }
}

fn marker_key(value: impl std::fmt::Display, collapse_whitespace: bool) -> String {
    let text = value.to_string();
    if collapse_whitespace {
        text.chars().filter(|ch| !ch.is_whitespace()).collect()
    } else {
        text.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_comparison_follows_whitespace_policy() {
        assert_eq!(marker_key(" 소 계 ", true), "소계");
        assert_eq!(marker_key(" 소 계 ", false), "소 계");
        assert_eq!(marker_key(&CellValue::Empty, true), "");
    }
}
