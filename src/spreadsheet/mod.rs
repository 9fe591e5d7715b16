//! # Workbook Reader
//!
//! Parses the raw bytes of a packed spreadsheet into an in-memory [`Workbook`]:
//! ordered sheets, each a dense grid of typed [`CellValue`]s with no header assumed.
//!
//! Office Open XML workbooks (`.xlsx`, `.xlsm`) and OpenDocument spreadsheets (`.ods`)
//! are supported. The format is detected from the package content, never from a file name.
use crate::error::IntegratorError;
use crate::helpers::zip::ZipHelper;
use log::debug;
use std::collections::HashSet;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use thiserror::Error;
use zip::ZipArchive;

pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod ods;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xlsx;

pub use cell::CellValue;
pub use sheet::Sheet;

/// Errors raised while reading a spreadsheet package.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// Content is an OLE compound file: a legacy `.xls` workbook or an encrypted package
    #[error("Compound file content is not supported, expected a zipped workbook")]
    CompoundFile,

    /// Zip archive that is neither an xlsx nor an ods package
    #[error("Cannot detect workbook format")]
    UnknownFormat,

    /// A part the format requires is absent
    #[error("Missing package part {0}")]
    MissingPart(String),

    #[error("Workbook is password protected")]
    PasswordProtected,

    #[error("Duplicate sheet name '{0}'")]
    DuplicateSheetName(String),

    /// Cell or row position past the last row or column a worksheet can hold
    #[error("Cell position {reference} in '{sheet}' is outside the sheet limits")]
    CellOutOfRange { sheet: String, reference: String },

    #[error("Invalid cell value at '{sheet}'!{reference}: {message}")]
    InvalidCellValue {
        sheet: String,
        reference: String,
        message: String,
    },
}

/// Container formats the reader understands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkbookFormat {
    Xlsx,
    Ods,
}

impl WorkbookFormat {
    /// Detects the format from the package: an OpenDocument `mimetype` entry or an `xl/workbook.xml` part.
    fn detect<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<Self, IntegratorError> {
        if let Some(mime) = zip.read_part("mimetype")? {
            if mime.starts_with(ods::MIME_TYPE.as_bytes()) {
                return Ok(WorkbookFormat::Ods);
            }
        }
        if zip.has_part("xl/workbook.xml")? {
            return Ok(WorkbookFormat::Xlsx);
        }
        Err(SpreadsheetError::UnknownFormat.into())
    }
}

/// A format-specific reader producing the sheets of one package in physical order.
pub(crate) trait SheetSource {
    fn format(&self) -> WorkbookFormat;

    fn read_sheets(&mut self) -> Result<Vec<Sheet>, IntegratorError>;
}

/// Ordered sheets of one workbook, each name unique.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Result<Self, SpreadsheetError> {
        let mut names = HashSet::new();
        for sheet in &sheets {
            if !names.insert(sheet.name()) {
                return Err(SpreadsheetError::DuplicateSheetName(sheet.name().to_owned()));
            }
        }
        Ok(Self { sheets })
    }

    /// Parses a packed workbook.
    ///
    /// # Errors
    ///
    /// Any failure is reported as [`IntegratorError::WorkbookParseError`]; no sheet is
    /// returned when any part of the package is unreadable.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IntegratorError> {
        Self::parse(bytes).map_err(|error| IntegratorError::WorkbookParseError(Box::new(error)))
    }

    fn parse(bytes: &[u8]) -> Result<Self, IntegratorError> {
        if excel::is_compound_file(bytes) {
            Err(SpreadsheetError::CompoundFile)?;
        }
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let format = WorkbookFormat::detect(&mut zip)?;
        let mut source: Box<dyn SheetSource + '_> = match format {
            WorkbookFormat::Xlsx => Box::new(xlsx::XlsxSpreadsheet::open(zip)?),
            WorkbookFormat::Ods => Box::new(ods::OdsSpreadsheet::open(zip)?),
        };
        let sheets = source.read_sheets()?;
        debug!("Read {} sheet(s) from {:?} workbook ({} bytes)", sheets.len(), source.format(), bytes.len());
        Ok(Self::new(sheets)?)
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }

    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets.first()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
