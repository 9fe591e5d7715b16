//! # Header Resolver
//!
//! Shows the first sheet of a workbook so a caller can choose the header row and the columns
//! to consolidate. Nothing here validates or filters; the consolidator never depends on it.
use crate::spreadsheet::CellValue;
use crate::spreadsheet::Sheet;
use crate::spreadsheet::Workbook;

/// Number of leading rows included in a preview.
pub const PREVIEW_ROWS: usize = 10;

/// Positional view of the leading rows of a sheet, without labels.
#[derive(Clone, Debug, PartialEq)]
pub struct Preview {
    pub sheet_name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl Preview {
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

pub struct HeaderResolver<'a> {
    workbook: &'a Workbook,
}

impl<'a> HeaderResolver<'a> {
    pub fn new(workbook: &'a Workbook) -> Self {
        Self { workbook }
    }

    fn sheet(&self) -> Option<&'a Sheet> {
        self.workbook.first_sheet()
    }

    /// Up to [`PREVIEW_ROWS`] rows of the first sheet, all columns. `None` for a workbook with no sheet.
    pub fn preview(&self) -> Option<Preview> {
        let sheet = self.sheet()?;
        Some(Preview {
            sheet_name: sheet.name().to_owned(),
            rows: sheet.rows().iter().take(PREVIEW_ROWS).cloned().collect(),
        })
    }

    /// Literal values of the first sheet's row at `header_row`, duplicates and blanks included.
    ///
    /// Empty when the row does not exist.
    pub fn header_labels(&self, header_row: usize) -> Vec<CellValue> {
        self.sheet()
            .and_then(|sheet| sheet.row(header_row))
            .map(<[CellValue]>::to_vec)
            .unwrap_or_default()
    }

    /// Non-blank labels of the header row as text, in column order. Offered as selectable columns.
    pub fn candidate_columns(&self, header_row: usize) -> Vec<String> {
        self.header_labels(header_row).iter().filter_map(CellValue::label).collect()
    }

    /// Largest header row index that leaves the first sheet a header row.
    pub fn max_header_row(&self) -> Option<usize> {
        self.sheet().and_then(|sheet| sheet.row_count().checked_sub(1))
    }
}
