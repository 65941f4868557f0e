use std::io::{Cursor, Read, Seek};

use calamine::{DataType, Range, Reader, Xlsx};
use tracing::{debug, instrument};

use crate::error::{Result, ToolError};
use crate::model::{CellValue, RawTable};
use crate::schema::normalize_label;

/// A source table together with the sheet it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSheet {
    pub sheet_name: String,
    pub table: RawTable,
}

/// Picks the data sheet of a workbook.
///
/// Sheets are visited in declared order and `peek_headers` is asked for each
/// sheet's header row. The first sheet whose normalised headers contain one
/// of `grouping_keys` (already normalised) wins. Sheets that cannot be peeked
/// are skipped. Without a match the first sheet is returned.
pub fn select_sheet<F>(
    sheet_names: &[String],
    grouping_keys: &[String],
    mut peek_headers: F,
) -> Option<String>
where
    F: FnMut(&str) -> Result<Vec<String>>,
{
    for name in sheet_names {
        match peek_headers(name) {
            Ok(headers) => {
                if headers
                    .iter()
                    .any(|header| grouping_keys.contains(&normalize_label(header)))
                {
                    debug!(sheet = %name, "sheet carries the grouping column");
                    return Some(name.clone());
                }
            }
            Err(error) => {
                debug!(sheet = %name, %error, "skipping unreadable sheet");
            }
        }
    }
    sheet_names.first().cloned()
}

/// Reads the data sheet of an xlsx workbook held in memory.
#[instrument(level = "debug", skip_all, fields(bytes = bytes.len()))]
pub fn load_source(bytes: &[u8], grouping_keys: &[String]) -> Result<LoadedSheet> {
    let mut workbook = Xlsx::new(Cursor::new(bytes)).map_err(unreadable)?;
    let sheet_names = workbook.sheet_names().to_vec();

    let sheet_name = select_sheet(&sheet_names, grouping_keys, |name| {
        let range = read_sheet(&mut workbook, name)?;
        Ok(header_row(&range))
    })
    .ok_or_else(|| ToolError::SourceUnreadable {
        reason: "workbook contains no sheets".to_string(),
    })?;

    let range = read_sheet(&mut workbook, &sheet_name).map_err(|error| match error {
        ToolError::ExcelRead(error) => unreadable(error),
        other => other,
    })?;
    let table = range_to_table(&range);
    debug!(
        sheet = %sheet_name,
        columns = table.headers.len(),
        rows = table.rows.len(),
        "loaded source sheet"
    );

    Ok(LoadedSheet { sheet_name, table })
}

fn read_sheet<R: Read + Seek>(workbook: &mut Xlsx<R>, name: &str) -> Result<Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::SourceUnreadable {
            reason: format!("missing sheet '{name}'"),
        })?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

fn header_row(range: &Range<DataType>) -> Vec<String> {
    header_cells(range).iter().map(ToString::to_string).collect()
}

fn header_cells(range: &Range<DataType>) -> Vec<CellValue> {
    let offset = start_column(range);
    match range.rows().next() {
        Some(first_row) => padded_row(first_row, offset),
        None => Vec::new(),
    }
}

/// First row becomes the headers; every other row is kept as read. Columns
/// left of the first used column are kept as blanks so every cell stays in
/// its source column.
pub fn range_to_table(range: &Range<DataType>) -> RawTable {
    let offset = start_column(range);
    let headers = header_cells(range);
    let rows = range
        .rows()
        .skip(1)
        .map(|row| padded_row(row, offset))
        .collect();
    RawTable::new(headers, rows)
}

// calamine ranges begin at the first non-empty cell, not at column A.
fn start_column(range: &Range<DataType>) -> usize {
    range.start().map_or(0, |(_, column)| column as usize)
}

fn padded_row(row: &[DataType], offset: usize) -> Vec<CellValue> {
    std::iter::repeat_n(CellValue::Empty, offset)
        .chain(row.iter().map(cell_to_value))
        .collect()
}

fn cell_to_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Boolean(*value),
        DataType::DateTime(serial) => CellValue::DateTime(*serial),
        DataType::Empty => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}

fn unreadable(error: calamine::XlsxError) -> ToolError {
    ToolError::SourceUnreadable {
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn first_sheet_with_grouping_header_wins() {
        let sheets = names(&["표지", "데이터", "메모"]);
        let keys = vec![normalize_label("차트번호")];
        let selected = select_sheet(&sheets, &keys, |name| {
            Ok(match name {
                "데이터" | "메모" => names(&["차트 번호", "오더코드"]),
                _ => names(&["제목"]),
            })
        });
        assert_eq!(selected.as_deref(), Some("데이터"));
    }

    #[test]
    fn unreadable_sheets_are_skipped() {
        let sheets = names(&["broken", "data"]);
        let keys = vec![normalize_label("차트번호")];
        let selected = select_sheet(&sheets, &keys, |name| match name {
            "broken" => Err(ToolError::SourceUnreadable {
                reason: "corrupt".into(),
            }),
            _ => Ok(names(&["차트번호"])),
        });
        assert_eq!(selected.as_deref(), Some("data"));
    }

    #[test]
    fn leading_blank_columns_are_kept() {
        let mut range = Range::new((0, 2), (1, 3));
        range.set_value((0, 2), DataType::Float(2024.0));
        range.set_value((0, 3), DataType::String("차트번호".into()));
        range.set_value((1, 3), DataType::String("소계".into()));

        let table = range_to_table(&range);
        assert_eq!(
            table.headers,
            vec![
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Number(2024.0),
                CellValue::from("차트번호"),
            ]
        );
        assert_eq!(table.rows[0].len(), 4);
        assert_eq!(table.cell(0, 3), &CellValue::from("소계"));
        assert_eq!(header_row(&range)[3], "차트번호");
    }

    #[test]
    fn falls_back_to_first_sheet() {
        let sheets = names(&["a", "b"]);
        let selected = select_sheet(&sheets, &[normalize_label("차트번호")], |_| Ok(Vec::new()));
        assert_eq!(selected.as_deref(), Some("a"));
        assert_eq!(select_sheet(&[], &[], |_| Ok(Vec::new())), None);
    }
}
