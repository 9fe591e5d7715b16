//! # Consolidation
//!
//! Turns a [`Workbook`] into one table holding the selected columns of every qualifying sheet.
//!
//! A run is configured by [`ConsolidationCriteria`]: one header row index applied to every
//! sheet and an ordered [`ColumnSelection`]. Each sheet is matched, filtered and projected by
//! the [`SheetConsolidator`]; the [`TableAggregator`] concatenates the results in sheet order.
//!
//! Sheets and rows that do not qualify are never errors. They show up as outcomes in the
//! [`ConsolidationReport`].
use crate::spreadsheet::CellValue;
use crate::spreadsheet::Workbook;
use std::collections::HashSet;
use thiserror::Error;

pub mod aggregator;
pub mod consolidator;

pub use aggregator::ConsolidatedTable;
pub use aggregator::ConsolidationReport;
pub use aggregator::SheetReport;
pub use aggregator::TableAggregator;
pub use consolidator::PartialTable;
pub use consolidator::RowOutcome;
pub use consolidator::SheetConsolidator;
pub use consolidator::SheetOutcome;

/// Label of the sequence column. When selected, only rows whose value coerces to an integer survive.
pub const SEQUENCE_COLUMN: &str = "Sr. No.";

/// Value substituted for every blank data cell, whatever the column.
pub const MISSING_VALUE: CellValue = CellValue::Number(0.0);

/// Invalid run configuration, rejected before any sheet is read.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConsolidationError {
    #[error("At least one column must be selected")]
    EmptySelection,

    #[error("Column '{0}' is selected more than once")]
    DuplicateColumn(String),
}

/// Declared kind of an output column
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    /// Integer values only; the sequence column
    Integer,
    /// Any cell value
    Scalar,
}

/// Output column descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// Ordered, non-empty set of distinct column labels. Order decides output column order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSelection {
    labels: Vec<String>,
}

impl ColumnSelection {
    pub fn new<I, S>(labels: I) -> Result<Self, ConsolidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(ConsolidationError::EmptySelection);
        }
        let mut seen = HashSet::new();
        for label in &labels {
            if !seen.insert(label.as_str()) {
                return Err(ConsolidationError::DuplicateColumn(label.to_owned()));
            }
        }
        Ok(Self { labels })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Position of the sequence column within the selection, if selected.
    pub fn sequence_position(&self) -> Option<usize> {
        self.labels.iter().position(|label| label == SEQUENCE_COLUMN)
    }

    pub fn columns(&self) -> Vec<Column> {
        self.labels
            .iter()
            .map(|label| Column {
                name: label.to_owned(),
                kind: if label == SEQUENCE_COLUMN { ColumnKind::Integer } else { ColumnKind::Scalar },
            })
            .collect()
    }
}

/// Parameters of one consolidation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsolidationCriteria {
    /// Zero-based row that supplies the column labels of every sheet.
    pub header_row: usize,
    pub columns: ColumnSelection,
}

impl ConsolidationCriteria {
    pub fn new(header_row: usize, columns: ColumnSelection) -> Self {
        Self { header_row, columns }
    }
}

/// Runs the consolidator over every sheet and aggregates the results.
pub fn consolidate_workbook(workbook: &Workbook, criteria: &ConsolidationCriteria) -> (ConsolidatedTable, ConsolidationReport) {
    let partials = SheetConsolidator::new(criteria).consolidate(workbook);
    TableAggregator::aggregate(&criteria.columns, partials)
}
