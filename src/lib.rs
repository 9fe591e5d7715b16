//! # Sheet Integrator
//!
//! Consolidates a multi-sheet workbook whose sheets share a loosely consistent schema into a
//! single table, then writes that table back out as a one-sheet workbook.
//!
//! ## Pipeline
//!
//! - **Reading**: `.xlsx`/`.xlsm` and `.ods` packages are parsed into a [`Workbook`] of typed cells
//! - **Header resolution**: [`HeaderResolver`] previews the first sheet so a header row and
//!   columns can be chosen
//! - **Consolidation**: every sheet is matched against the chosen labels, filtered on the
//!   `Sr. No.` sequence column when selected, and projected in selection order
//! - **Aggregation**: sheet results are concatenated in workbook order
//! - **Writing**: the table is serialized to a single sheet named `Excel_Integrator_Output`
//!
//! Sheets that are too short or lack a selected label are skipped, never errors; the
//! [`ConsolidationReport`] says what happened to each. Only unreadable input aborts a run.
//!
//! ```no_run
//! let input = std::fs::read("stock.xlsx")?;
//! let output = sheet_integrator::consolidate(&input, 0, ["Sr. No.", "Name"])?;
//! std::fs::write("processed_stock.xlsx", output)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod consolidate;
pub mod error;
pub(crate) mod helpers;
pub mod job;
pub mod preview;
pub mod spreadsheet;
pub mod storage;
pub mod writer;

pub use consolidate::ColumnSelection;
pub use consolidate::ConsolidatedTable;
pub use consolidate::ConsolidationCriteria;
pub use consolidate::ConsolidationReport;
pub use error::IntegratorError;
pub use preview::HeaderResolver;
pub use preview::Preview;
pub use spreadsheet::CellValue;
pub use spreadsheet::Workbook;

/// Consolidates the selected columns of every qualifying sheet and returns the output workbook bytes.
///
/// # Errors
///
/// An empty or duplicated column selection is rejected before the input is read. Input that is
/// not a readable workbook fails with [`IntegratorError::WorkbookParseError`].
pub fn consolidate<I, S>(workbook_bytes: &[u8], header_row: usize, columns: I) -> Result<Vec<u8>, IntegratorError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    consolidate_with_report(workbook_bytes, header_row, columns).map(|(bytes, _)| bytes)
}

/// Same as [`consolidate`], also reporting what happened to each sheet.
pub fn consolidate_with_report<I, S>(workbook_bytes: &[u8], header_row: usize, columns: I) -> Result<(Vec<u8>, ConsolidationReport), IntegratorError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let criteria = ConsolidationCriteria::new(header_row, ColumnSelection::new(columns)?);
    let workbook = Workbook::from_bytes(workbook_bytes)?;
    let (table, report) = consolidate::consolidate_workbook(&workbook, &criteria);
    Ok((writer::write(&table)?, report))
}
