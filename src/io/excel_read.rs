use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};

use crate::error::{Result, ToolError};

/// Cached value of a cell as stored in the workbook.
#[derive(Debug, Clone, PartialEq)]
pub enum CellReading {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Error value such as `#DIV/0!`.
    Error(String),
    Other(String),
}

/// A non-empty cached value at a zero-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRecord {
    pub row: u32,
    pub col: u32,
    pub value: CellReading,
}

/// Formula source at a zero-based position, without the leading `=`.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaRecord {
    pub row: u32,
    pub col: u32,
    pub formula: String,
}

/// Everything the audit needs from a single worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetContents {
    pub name: String,
    pub values: Vec<CellRecord>,
    pub formulas: Vec<FormulaRecord>,
}

/// Reads cached values and formula text from every worksheet, in workbook
/// order.
pub fn read_sheets(path: &Path) -> Result<Vec<SheetContents>> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        let values = read_required_sheet(&mut workbook, &name)?;
        let formulas = workbook
            .worksheet_formula(&name)
            .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))?
            .map_err(ToolError::from)?;

        sheets.push(SheetContents {
            values: collect_values(&values),
            formulas: collect_formulas(&formulas),
            name,
        });
    }
    Ok(sheets)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

fn collect_values(range: &Range<DataType>) -> Vec<CellRecord> {
    let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
    range
        .cells()
        .filter_map(|(row, col, cell)| {
            let value = match cell {
                DataType::Empty => return None,
                DataType::String(value) => CellReading::Text(value.clone()),
                DataType::Float(value) => CellReading::Number(*value),
                DataType::Int(value) => CellReading::Number(*value as f64),
                DataType::Bool(value) => CellReading::Bool(*value),
                DataType::Error(error) => CellReading::Error(error.to_string()),
                other => CellReading::Other(other.to_string()),
            };
            Some(CellRecord {
                row: row_offset + row as u32,
                col: col_offset + col as u32,
                value,
            })
        })
        .collect()
}

fn collect_formulas(range: &Range<String>) -> Vec<FormulaRecord> {
    let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
    range
        .cells()
        .filter(|(_, _, formula)| !formula.trim().is_empty())
        .map(|(row, col, formula)| FormulaRecord {
            row: row_offset + row as u32,
            col: col_offset + col as u32,
            formula: formula.trim_start_matches('=').to_string(),
        })
        .collect()
}
