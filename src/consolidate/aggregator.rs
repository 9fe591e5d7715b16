//! Concatenation of per-sheet results into the output table and run report.
use crate::consolidate::Column;
use crate::consolidate::ColumnSelection;
use crate::consolidate::PartialTable;
use crate::consolidate::SheetOutcome;
use crate::spreadsheet::CellValue;
use log::info;

/// The consolidated output: selected columns in selection order, rows in sheet order then row order.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsolidatedTable {
    columns: Vec<Column>,
    rows: Vec<Vec<CellValue>>,
}

impl ConsolidatedTable {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column labels, written as the first output row.
    pub fn header(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetReport {
    pub sheet: String,
    pub outcome: SheetOutcome,
}

/// Per-sheet outcomes of one run, in workbook order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    sheets: Vec<SheetReport>,
}

impl ConsolidationReport {
    pub fn sheets(&self) -> &[SheetReport] {
        &self.sheets
    }

    pub fn sheets_included(&self) -> usize {
        self.sheets.iter().filter(|report| report.outcome.is_included()).count()
    }

    pub fn sheets_skipped(&self) -> usize {
        self.sheets.len() - self.sheets_included()
    }

    pub fn rows_included(&self) -> usize {
        self.sheets
            .iter()
            .map(|report| match report.outcome {
                SheetOutcome::Included { rows, .. } => rows,
                _ => 0,
            })
            .sum()
    }

    pub fn rows_dropped(&self) -> usize {
        self.sheets
            .iter()
            .map(|report| match report.outcome {
                SheetOutcome::Included { dropped, .. } => dropped,
                _ => 0,
            })
            .sum()
    }
}

pub struct TableAggregator;

impl TableAggregator {
    /// Concatenates partial tables in the given order. No deduplication, sorting or reindexing.
    pub fn aggregate(selection: &ColumnSelection, partials: Vec<PartialTable>) -> (ConsolidatedTable, ConsolidationReport) {
        let mut rows = Vec::new();
        let mut sheets = Vec::with_capacity(partials.len());
        for partial in partials {
            rows.extend(partial.rows);
            sheets.push(SheetReport {
                sheet: partial.sheet,
                outcome: partial.outcome,
            });
        }
        let table = ConsolidatedTable::new(selection.columns(), rows);
        let report = ConsolidationReport { sheets };
        info!(
            "Consolidated {} row(s) from {} of {} sheet(s), dropped {} row(s)",
            table.row_count(),
            report.sheets_included(),
            report.sheets.len(),
            report.rows_dropped()
        );
        (table, report)
    }
}
