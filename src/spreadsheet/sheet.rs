use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::MAX_COLUMNS;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::SpreadsheetError;

/// A named, dense grid of typed cells. No row is treated as a header.
///
/// The grid spans row 0 to the last row holding a value and column 0 to the last
/// column holding a value; every row has the same width.
#[derive(Clone, Debug, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Builds a sheet from rows of possibly different lengths.
    /// Short rows are padded with blanks; trailing blank rows and columns are trimmed.
    pub fn new(name: &str, mut rows: Vec<Vec<CellValue>>) -> Self {
        while rows.last().map(|row| row.iter().all(CellValue::is_empty)).unwrap_or(false) {
            rows.pop();
        }
        let width = rows
            .iter()
            .filter_map(|row| row.iter().rposition(|value| !value.is_empty()))
            .max()
            .map(|col| col + 1)
            .unwrap_or(0);
        for row in &mut rows {
            row.resize(width, CellValue::Empty);
        }
        Self {
            name: name.to_owned(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[CellValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }
}

/// Collects raw cells of one sheet part while it is parsed, tracking the occupied area.
pub(crate) struct SheetBuilder {
    name: String,
    cells: Vec<Cell>,
    row_upper_bound: Option<usize>,
    col_upper_bound: Option<usize>,
}

impl SheetBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            cells: Vec::new(),
            row_upper_bound: None,
            col_upper_bound: None,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Adds a cell; blank raw values do not extend the occupied area.
    /// A valued cell past the worksheet limits is rejected.
    pub(crate) fn push(&mut self, cell: Cell) -> Result<(), SpreadsheetError> {
        if cell.value.is_empty() {
            return Ok(());
        }
        if cell.row >= MAX_ROWS || cell.col >= MAX_COLUMNS {
            return Err(SpreadsheetError::CellOutOfRange {
                sheet: self.name.to_owned(),
                reference: format!("R{}C{}", cell.row.saturating_add(1), cell.col.saturating_add(1)),
            });
        }
        if self.row_upper_bound.map(|row| row < cell.row).unwrap_or(true) {
            self.row_upper_bound = Some(cell.row);
        }
        if self.col_upper_bound.map(|col| col < cell.col).unwrap_or(true) {
            self.col_upper_bound = Some(cell.col);
        }
        self.cells.push(cell);
        Ok(())
    }

    /// Types every collected cell and lays them out as a dense grid.
    /// A later cell at the same position replaces an earlier one.
    pub(crate) fn finish(self) -> Result<Sheet, SpreadsheetError> {
        let (rows, cols) = match self.row_upper_bound.zip(self.col_upper_bound) {
            Some((row, col)) => (row + 1, col + 1),
            None => (0, 0),
        };
        let mut grid = vec![vec![CellValue::Empty; cols]; rows];
        for cell in &self.cells {
            let value = cell.to_value().map_err(|message| SpreadsheetError::InvalidCellValue {
                sheet: self.name.to_owned(),
                reference: cell.reference(),
                message,
            })?;
            grid[cell.row][cell.col] = value;
        }
        Ok(Sheet::new(&self.name, grid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::cell::CellType;

    fn push(builder: &mut SheetBuilder, row: usize, col: usize, kind: CellType, value: &str) {
        builder.push(Cell {
            row,
            col,
            kind,
            value: value.to_owned(),
        })
        .unwrap();
    }

    #[test]
    fn sheet_initial() {
        let sheet = SheetBuilder::new("Empty").finish().unwrap();
        assert_eq!(sheet.name(), "Empty");
        assert_eq!(sheet.row_count(), 0);
        assert_eq!(sheet.column_count(), 0);
    }

    #[test]
    fn builder_lays_out_dense_grid_from_origin() {
        let mut builder = SheetBuilder::new("Stock");
        push(&mut builder, 1, 1, CellType::Text, "Name");
        push(&mut builder, 1, 3, CellType::Number, "7");
        push(&mut builder, 3, 2, CellType::Boolean, "0");
        let sheet = builder.finish().unwrap();

        assert_eq!(sheet.row_count(), 4);
        assert_eq!(sheet.column_count(), 4);
        assert_eq!(sheet.row(0), Some(&[CellValue::Empty, CellValue::Empty, CellValue::Empty, CellValue::Empty][..]));
        assert_eq!(sheet.rows()[1][1], CellValue::Text("Name".to_owned()));
        assert_eq!(sheet.rows()[1][3], CellValue::Number(7.0));
        assert_eq!(sheet.rows()[3][2], CellValue::Boolean(false));
        assert_eq!(sheet.row(4), None);
    }

    #[test]
    fn blank_raw_values_do_not_extend_grid() {
        let mut builder = SheetBuilder::new("Stock");
        push(&mut builder, 0, 0, CellType::Text, "a");
        push(&mut builder, 5, 5, CellType::Text, "");
        let sheet = builder.finish().unwrap();
        assert_eq!(sheet.row_count(), 1);
        assert_eq!(sheet.column_count(), 1);
    }

    #[test]
    fn error_cells_trim_like_blanks() {
        let mut builder = SheetBuilder::new("Stock");
        push(&mut builder, 0, 0, CellType::Text, "a");
        push(&mut builder, 2, 0, CellType::Error, "#N/A");
        let sheet = builder.finish().unwrap();
        assert_eq!(sheet.row_count(), 1);
    }

    #[test]
    fn invalid_value_reports_reference() {
        let mut builder = SheetBuilder::new("Stock");
        push(&mut builder, 1, 2, CellType::Number, "abc");
        let error = builder.finish().unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid cell value at 'Stock'!C2: parse 'abc' to number failed"
        );
    }

    #[test]
    fn valued_cell_past_sheet_limits_is_rejected() {
        let mut builder = SheetBuilder::new("Stock");
        let cell = |row, col| Cell {
            row,
            col,
            kind: CellType::Number,
            value: "1".to_owned(),
        };
        let error = builder.push(cell(0, MAX_COLUMNS)).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Cell position R1C16385 in 'Stock' is outside the sheet limits"
        );
        assert!(builder.push(cell(MAX_ROWS, 0)).is_err());
        builder
            .push(Cell {
                row: usize::MAX,
                col: 0,
                kind: CellType::Text,
                value: String::new(),
            })
            .unwrap();
        builder.push(cell(MAX_ROWS - 1, MAX_COLUMNS - 1)).unwrap();
        assert_eq!(builder.row_upper_bound, Some(MAX_ROWS - 1));
        assert_eq!(builder.col_upper_bound, Some(MAX_COLUMNS - 1));
    }

    #[test]
    fn new_pads_and_trims() {
        let sheet = Sheet::new(
            "Manual",
            vec![
                vec![CellValue::Number(1.0)],
                vec![CellValue::Empty, CellValue::Text("b".to_owned()), CellValue::Empty],
                vec![CellValue::Empty],
            ],
        );
        assert_eq!(sheet.row_count(), 2);
        assert_eq!(sheet.column_count(), 2);
        assert_eq!(sheet.rows()[0], vec![CellValue::Number(1.0), CellValue::Empty]);
    }
}
