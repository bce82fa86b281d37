use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};

use crate::error::Result;
use crate::formula::{CellValue, WorkbookData};

const LABEL_COLUMN_WIDTH: f64 = 28.0;
const VALUE_COLUMN_WIDTH: f64 = 14.0;

/// Writes the provided workbook data to the given path. Formulas are stored
/// as text for the spreadsheet engine to evaluate on open.
pub fn write_workbook(path: &Path, workbook: &WorkbookData) -> Result<()> {
    let mut workbook_writer = Workbook::new();
    let header = Format::new().set_bold();

    for table in &workbook.sheets {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&table.sheet_name)?;
        worksheet.set_column_width(0, LABEL_COLUMN_WIDTH)?;
        for col_idx in 1..table.width() {
            worksheet.set_column_width(col_idx as u16, VALUE_COLUMN_WIDTH)?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                let (row_num, col_num) = (row_idx as u32, col_idx as u16);
                match cell {
                    CellValue::Empty => {}
                    CellValue::Text(text) if row_idx == 0 => {
                        worksheet.write_string_with_format(row_num, col_num, text, &header)?;
                    }
                    CellValue::Text(text) => {
                        worksheet.write_string(row_num, col_num, text)?;
                    }
                    CellValue::Number(value) => {
                        worksheet.write_number(row_num, col_num, *value)?;
                    }
                    CellValue::Formula(formula) => {
                        worksheet.write_formula(row_num, col_num, formula.as_str())?;
                    }
                }
            }
        }
    }

    workbook_writer.save(path)?;
    Ok(())
}
