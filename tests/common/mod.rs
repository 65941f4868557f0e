#![allow(dead_code)]

use std::io::Cursor;

use calamine::{DataType, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use subtotal_tools::model::{CellValue, RawTable, SourceFile};

/// Headers of a typical extract; the optional `계산` column is absent.
pub const HEADERS: [&str; 8] = [
    "차트번호", "오더코드", "청구코드", "오더명칭", "오더금액", "단가", "일수", "비고",
];

pub fn text(value: &str) -> CellValue {
    CellValue::Text(value.to_string())
}

pub fn number(value: f64) -> CellValue {
    CellValue::Number(value)
}

/// A billing row in [`HEADERS`] order.
pub fn billing_row(chart: &str, code: &str, amount: CellValue, price: CellValue) -> Vec<CellValue> {
    vec![
        text(chart),
        text(code),
        text(&format!("EDI-{code}")),
        text(&format!("오더 {code}")),
        amount,
        price,
        number(1.0),
        CellValue::Empty,
    ]
}

pub fn raw_table(headers: &[&str], rows: Vec<Vec<CellValue>>) -> RawTable {
    RawTable::new(headers.iter().map(|header| text(header)).collect(), rows)
}

/// Builds an xlsx file in memory, one entry per sheet.
pub fn workbook_bytes(sheets: &[(&str, &RawTable)]) -> Vec<u8> {
    workbook_bytes_at(sheets, 0)
}

/// Like [`workbook_bytes`], but every table starts in column `first_col`.
pub fn workbook_bytes_at(sheets: &[(&str, &RawTable)], first_col: u16) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).expect("sheet name accepted");
        for (col, header) in table.headers.iter().enumerate() {
            write_cell(worksheet, 0, first_col + col as u16, header, &date_format);
        }
        for (row_idx, row) in table.rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                write_cell(worksheet, row_idx as u32 + 1, first_col + col as u16, cell, &date_format);
            }
        }
    }

    workbook.save_to_buffer().expect("workbook serialised")
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &CellValue, date_format: &Format) {
    match cell {
        CellValue::Empty => {}
        CellValue::Text(value) => {
            worksheet.write_string(row, col, value).expect("cell written");
        }
        CellValue::Number(value) => {
            worksheet.write_number(row, col, *value).expect("cell written");
        }
        CellValue::Boolean(value) => {
            worksheet.write_boolean(row, col, *value).expect("cell written");
        }
        CellValue::DateTime(serial) => {
            worksheet
                .write_number_with_format(row, col, *serial, date_format)
                .expect("cell written");
        }
    }
}

pub fn source(name: &str, table: &RawTable) -> SourceFile {
    SourceFile::new(name, workbook_bytes(&[("Sheet1", table)]))
}

pub fn sheet_names(bytes: &[u8]) -> Vec<String> {
    let workbook = Xlsx::new(Cursor::new(bytes)).expect("output workbook opened");
    workbook.sheet_names().to_vec()
}

/// Reads a sheet of an output workbook as rows of cells.
pub fn read_sheet(bytes: &[u8], name: &str) -> Vec<Vec<DataType>> {
    let mut workbook = Xlsx::new(Cursor::new(bytes)).expect("output workbook opened");
    let range = workbook
        .worksheet_range(name)
        .expect("sheet present")
        .expect("sheet readable");
    range.rows().map(|row| row.to_vec()).collect()
}

pub fn string(value: &str) -> DataType {
    DataType::String(value.to_string())
}
