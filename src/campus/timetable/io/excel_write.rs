use std::path::Path;

use rust_xlsxwriter::{Table, Workbook};

use crate::campus::timetable::error::Result;
use crate::campus::timetable::tabulate::{CellValue, WorkbookData};

/// Writes the provided workbook data to the given path, one autofiltered
/// table per sheet.
pub fn write_workbook(path: &Path, workbook: &WorkbookData) -> Result<()> {
    let mut workbook_writer = Workbook::new();

    for table in &workbook.tables {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&table.sheet_name)?;

        for (col_idx, header) in table.columns.iter().enumerate() {
            worksheet.write_string(0, col_idx as u16, header)?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            let row_num = (row_idx + 1) as u32;
            for (col_idx, cell) in row.iter().enumerate() {
                let col_num = col_idx as u16;
                match cell {
                    CellValue::Text(value) => worksheet.write_string(row_num, col_num, value)?,
                    CellValue::Number(value) => worksheet.write_number(row_num, col_num, *value)?,
                    CellValue::Bool(value) => worksheet.write_boolean(row_num, col_num, *value)?,
                };
            }
        }

        let col_end = (table.columns.len() as u16).saturating_sub(1);
        let row_end = table.rows.len() as u32;
        worksheet.add_table(0, 0, row_end, col_end, &Table::new().set_autofilter(true))?;
    }

    workbook_writer.save(path)?;
    Ok(())
}
