use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tracing::{debug, instrument};

use crate::error::{Result, ToolError};
use crate::layout::{Block, WorkbookLayout};
use crate::model::CellValue;

const DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Serialises the layout into xlsx bytes.
#[instrument(level = "debug", skip_all, fields(sheets = layout.sheets.len()))]
pub fn write_workbook_bytes(layout: &WorkbookLayout) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(layout)?;
    Ok(workbook.save_to_buffer()?)
}

fn build_workbook(layout: &WorkbookLayout) -> Result<Workbook> {
    let mut workbook = Workbook::new();
    let datetime_format = Format::new().set_num_format(DATETIME_FORMAT);

    for sheet in &layout.sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for block in &sheet.blocks {
            write_block(worksheet, block, &datetime_format)?;
        }
        debug!(sheet = %sheet.name, blocks = sheet.blocks.len(), "worksheet written");
    }

    Ok(workbook)
}

fn write_block(worksheet: &mut Worksheet, block: &Block, datetime_format: &Format) -> Result<()> {
    for (col_idx, header) in block.headers.iter().enumerate() {
        write_cell(worksheet, block.start_row, column(col_idx)?, header, datetime_format)?;
    }

    for (row_idx, row) in block.rows.iter().enumerate() {
        let row_num = block
            .start_row
            .checked_add(1)
            .and_then(|start| u32::try_from(row_idx).ok()?.checked_add(start))
            .ok_or_else(|| ToolError::InvalidWorkbook(format!("row {row_idx} out of range")))?;

        for (col_idx, cell) in row.iter().enumerate() {
            write_cell(worksheet, row_num, column(col_idx)?, cell, datetime_format)?;
        }
    }

    Ok(())
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &CellValue,
    datetime_format: &Format,
) -> Result<()> {
    match cell {
        CellValue::Empty => {}
        CellValue::Text(value) => {
            worksheet.write_string(row, col, value)?;
        }
        CellValue::Number(value) => {
            worksheet.write_number(row, col, *value)?;
        }
        CellValue::Boolean(value) => {
            worksheet.write_boolean(row, col, *value)?;
        }
        CellValue::DateTime(serial) => {
            worksheet.write_number_with_format(row, col, *serial, datetime_format)?;
        }
    }
    Ok(())
}

fn column(index: usize) -> Result<u16> {
    u16::try_from(index)
        .map_err(|_| ToolError::InvalidWorkbook(format!("column {index} out of range")))
}
