//! In-memory layout of the output workbook.
//!
//! The summary sheet comes first, followed by one sheet per input file in the
//! order the files were supplied. A file sheet stacks two blocks: the subtotal
//! table at A1 and, after a fixed number of blank rows, the complete source
//! table exactly as it was read.

pub mod sheet_names;

use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{Result, ToolError};
use crate::model::{CellValue, FileResult, SummaryTable};

pub use sheet_names::{SheetNameRegistry, SheetNameRules, sanitize_sheet_name};

/// A header row plus data rows written contiguously from `start_row`.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub start_row: u32,
    pub headers: Vec<CellValue>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Block {
    /// Row index just past the last data row.
    pub fn end_row(&self) -> u32 {
        self.start_row + 1 + self.rows.len() as u32
    }
}

/// One worksheet and the blocks placed on it.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    pub name: String,
    pub blocks: Vec<Block>,
}

/// All sheets of the output workbook, in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookLayout {
    pub sheets: Vec<SheetLayout>,
}

impl WorkbookLayout {
    pub fn sheet(&self, name: &str) -> Option<&SheetLayout> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }
}

/// Lays out the summary sheet and one stacked sheet per result. Sheet names
/// are drawn from a registry scoped to this call.
pub fn build_layout(
    results: &[FileResult],
    summary: &SummaryTable,
    config: &PipelineConfig,
) -> Result<WorkbookLayout> {
    let mut sheet_names = SheetNameRegistry::new(SheetNameRules::from_config(config));
    let mut sheets = Vec::with_capacity(results.len() + 1);

    let summary_name = sheet_names.assign(&config.summary_sheet_name)?;
    sheets.push(SheetLayout {
        name: summary_name,
        blocks: vec![summary_block(summary, config)],
    });

    for result in results {
        let name = sheet_names.assign(&result.label)?;
        debug!(label = %result.label, sheet = %name, "assigned output sheet");
        sheets.push(file_sheet(name, result, config)?);
    }

    Ok(WorkbookLayout { sheets })
}

fn summary_block(summary: &SummaryTable, config: &PipelineConfig) -> Block {
    let sum_fields = config.numeric_display_fields();
    let headers = &config.summary_headers;

    let mut columns = vec![
        headers.label.clone(),
        headers.source_sheet.clone(),
        headers.row_count.clone(),
    ];
    columns.extend(sum_fields.iter().map(|field| headers.sum_header(field)));

    let rows = summary
        .rows
        .iter()
        .map(|row| {
            let mut cells = vec![
                CellValue::Text(row.label.clone()),
                CellValue::Text(row.source_sheet.clone()),
                CellValue::Number(row.row_count as f64),
            ];
            cells.extend(
                sum_fields
                    .iter()
                    .map(|field| CellValue::Number(row.sums.get(*field).copied().unwrap_or(0.0))),
            );
            cells
        })
        .collect();

    Block {
        start_row: 0,
        headers: columns.into_iter().map(CellValue::Text).collect(),
        rows,
    }
}

fn file_sheet(name: String, result: &FileResult, config: &PipelineConfig) -> Result<SheetLayout> {
    let subtotal = Block {
        start_row: 0,
        headers: result
            .subtotal
            .headers
            .iter()
            .cloned()
            .map(CellValue::Text)
            .collect(),
        rows: result.subtotal.rows.clone(),
    };

    let original_start = subtotal
        .end_row()
        .checked_add(config.blank_rows_between_blocks)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("sheet '{name}' is too tall")))?;
    let original = Block {
        start_row: original_start,
        headers: result.raw.headers.clone(),
        rows: result.raw.rows.clone(),
    };

    Ok(SheetLayout {
        name,
        blocks: vec![subtotal, original],
    })
}
