//! Per-sheet schema matching, row filtering and column projection.
use crate::consolidate::ConsolidationCriteria;
use crate::consolidate::MISSING_VALUE;
use crate::spreadsheet::CellValue;
use crate::spreadsheet::Sheet;
use crate::spreadsheet::Workbook;
use log::debug;

/// What happened to one sheet during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SheetOutcome {
    /// The sheet contributed `rows` rows; `dropped` rows failed sequence coercion.
    Included { rows: usize, dropped: usize },
    /// The sheet has no row at the header row index.
    SkippedTooShort { row_count: usize },
    /// Selected labels absent from the sheet's header row.
    SkippedSchemaMismatch { missing: Vec<String> },
}

impl SheetOutcome {
    pub fn is_included(&self) -> bool {
        matches!(self, SheetOutcome::Included { .. })
    }
}

/// What happened to one data row of a matching sheet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RowOutcome {
    Included,
    /// The sequence column value is not integer-coercible.
    DroppedSequenceCoercion,
}

/// One sheet's contribution: projected rows in selection order, empty when the sheet was skipped.
#[derive(Clone, Debug, PartialEq)]
pub struct PartialTable {
    pub sheet: String,
    pub outcome: SheetOutcome,
    pub rows: Vec<Vec<CellValue>>,
}

impl PartialTable {
    fn skipped(sheet: &Sheet, outcome: SheetOutcome) -> Self {
        Self {
            sheet: sheet.name().to_owned(),
            outcome,
            rows: Vec::new(),
        }
    }
}

/// Applies one run's criteria to sheets.
pub struct SheetConsolidator<'a> {
    criteria: &'a ConsolidationCriteria,
}

impl<'a> SheetConsolidator<'a> {
    pub fn new(criteria: &'a ConsolidationCriteria) -> Self {
        Self { criteria }
    }

    /// Consolidates every sheet, in workbook order. One entry per sheet, skipped sheets included.
    pub fn consolidate(&self, workbook: &Workbook) -> Vec<PartialTable> {
        workbook
            .sheets()
            .iter()
            .map(|sheet| self.consolidate_sheet(sheet))
            .collect()
    }

    pub fn consolidate_sheet(&self, sheet: &Sheet) -> PartialTable {
        let header_row = self.criteria.header_row;
        let header = match sheet.row(header_row) {
            Some(header) => header,
            None => {
                debug!("Skip sheet '{}': {} row(s), header expected at row {}", sheet.name(), sheet.row_count(), header_row);
                return PartialTable::skipped(sheet, SheetOutcome::SkippedTooShort { row_count: sheet.row_count() });
            }
        };

        let labels: Vec<Option<String>> = header.iter().map(CellValue::label).collect();
        let mut positions = Vec::with_capacity(self.criteria.columns.len());
        let mut missing = Vec::new();
        for selected in self.criteria.columns.labels() {
            // duplicate labels resolve to the leftmost column
            match labels.iter().position(|label| label.as_deref() == Some(selected.as_str())) {
                Some(position) => positions.push(position),
                None => missing.push(selected.to_owned()),
            }
        }
        if !missing.is_empty() {
            debug!("Skip sheet '{}': missing column(s) {:?}", sheet.name(), missing);
            return PartialTable::skipped(sheet, SheetOutcome::SkippedSchemaMismatch { missing });
        }

        let sequence_position = self.criteria.columns.sequence_position();
        let mut rows = Vec::new();
        let mut dropped = 0usize;
        for row in &sheet.rows()[header_row + 1..] {
            let mut record: Vec<CellValue> = positions
                .iter()
                .map(|&position| match &row[position] {
                    CellValue::Empty => MISSING_VALUE,
                    value => value.clone(),
                })
                .collect();
            match Self::apply_sequence_filter(&mut record, sequence_position) {
                RowOutcome::Included => rows.push(record),
                RowOutcome::DroppedSequenceCoercion => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!("Sheet '{}': dropped {} row(s) without an integer '{}'", sheet.name(), dropped, crate::consolidate::SEQUENCE_COLUMN);
        }
        PartialTable {
            sheet: sheet.name().to_owned(),
            outcome: SheetOutcome::Included { rows: rows.len(), dropped },
            rows,
        }
    }

    /// Coerces the sequence column of a projected record in place, truncating toward zero.
    fn apply_sequence_filter(record: &mut [CellValue], sequence_position: Option<usize>) -> RowOutcome {
        let Some(position) = sequence_position else {
            return RowOutcome::Included;
        };
        match record[position].to_sequence_number() {
            Some(number) => {
                record[position] = CellValue::Number(number as f64);
                RowOutcome::Included
            }
            None => RowOutcome::DroppedSequenceCoercion,
        }
    }
}
