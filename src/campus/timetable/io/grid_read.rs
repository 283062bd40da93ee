use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use tracing::debug;

use crate::campus::timetable::error::{Result, TimetableError};
use crate::campus::timetable::model::{Grid, RawCell};

/// Reads a timetable workbook into a grid of raw cells.
///
/// With a sheet name only that worksheet is read; otherwise every worksheet is
/// read and stacked in workbook order.
pub fn read_grid(path: &Path, sheet: Option<&str>) -> Result<Grid> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let sheet_names: Vec<String> = match sheet {
        Some(name) => vec![name.to_string()],
        None => workbook.sheet_names().to_vec(),
    };

    let mut grid = Grid::default();
    for name in &sheet_names {
        let range = read_required_sheet(&mut workbook, name)?;
        let sheet_grid = range_to_grid(&range);
        debug!(sheet = %name, rows = sheet_grid.rows.len(), "worksheet read");
        grid.extend(sheet_grid);
    }
    Ok(grid)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| TimetableError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(TimetableError::from)?;
    Ok(range)
}

// Ranges start at their first used cell; leading columns are padded back so
// that column positions match the sheet.
fn range_to_grid(range: &calamine::Range<DataType>) -> Grid {
    let leading_columns = range
        .start()
        .map(|(_, column)| column as usize)
        .unwrap_or(0);

    let rows = range
        .rows()
        .map(|row| {
            std::iter::repeat_n(RawCell::Empty, leading_columns)
                .chain(row.iter().map(to_raw_cell))
                .collect()
        })
        .collect();
    Grid::new(rows)
}

fn to_raw_cell(cell: &DataType) -> RawCell {
    match cell {
        DataType::String(value) => RawCell::Text(value.clone()),
        DataType::Float(value) | DataType::DateTime(value) => RawCell::Number(*value),
        DataType::Int(value) => RawCell::Number(*value as f64),
        DataType::Empty => RawCell::Empty,
        other => RawCell::Text(other.to_string()),
    }
}
