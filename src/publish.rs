//! Whole-range update payload for pushing a generated model to a hosted
//! spreadsheet. The payload follows the Sheets `values:batchUpdate` request
//! body; sending it is left to whichever client holds the credentials.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::formula::{CellValue, SheetTable, WorkbookData, sheet_prefix};

/// Formulas must be parsed by the receiving spreadsheet, not stored as text.
pub const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

/// Leading marker that makes `USER_ENTERED` keep a value as literal text.
pub const TEXT_MARKER: char = '\'';

/// Request body for `spreadsheets.values.batchUpdate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,
    pub value_input_option: String,
    pub data: Vec<ValueRange>,
}

/// Cell values for one A1 range, row by row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    pub range: String,
    pub major_dimension: String,
    pub values: Vec<Vec<Value>>,
}

/// One whole-range entry per sheet, rows padded to the sheet's width so the
/// range is rectangular.
pub fn build_batch_update(
    workbook: &WorkbookData,
    spreadsheet_id: Option<String>,
) -> BatchUpdateRequest {
    BatchUpdateRequest {
        spreadsheet_id,
        value_input_option: VALUE_INPUT_OPTION.to_string(),
        data: workbook.sheets.iter().map(sheet_range).collect(),
    }
}

fn sheet_range(table: &SheetTable) -> ValueRange {
    let width = table.width();
    let values = table
        .rows
        .iter()
        .map(|row| {
            let mut cells: Vec<Value> = row.iter().map(cell_json).collect();
            cells.resize(width, Value::String(String::new()));
            cells
        })
        .collect();

    ValueRange {
        range: format!("{}{}", sheet_prefix(&table.sheet_name), table.extent()),
        major_dimension: "ROWS".to_string(),
        values,
    }
}

fn cell_json(cell: &CellValue) -> Value {
    match cell {
        CellValue::Empty => Value::String(String::new()),
        CellValue::Text(text) if text.is_empty() => Value::String(String::new()),
        // Labels like `=1/0`, `2025` or `10%` would otherwise be parsed.
        CellValue::Text(text) => Value::String(format!("{TEXT_MARKER}{text}")),
        CellValue::Formula(formula) => Value::String(formula.clone()),
        CellValue::Number(number) => serde_json::Number::from_f64(*number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}
