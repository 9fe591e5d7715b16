use thiserror::Error;

/// Main error type for the sheet integrator.
/// Aggregates errors from the standard library, third-party parsers and the crate's own modules.
#[derive(Error, Debug)]
pub enum IntegratorError {
    #[error("{0}")]
    WithContextError(String),

    /// Input bytes could not be turned into a workbook; the run aborts before any sheet is examined.
    #[error("Parse workbook failed: {0}")]
    WorkbookParseError(#[source] Box<IntegratorError>),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    OdsError(#[from] crate::spreadsheet::ods::OdsError),

    // Consolidation and collaborator errors
    #[error("{0}")]
    ConsolidationError(#[from] crate::consolidate::ConsolidationError),

    #[error("{0}")]
    StorageError(#[from] crate::storage::StorageError),
}

impl IntegratorError {
    /// Returns true when the error means the input bytes were not a readable workbook.
    pub fn is_workbook_parse_error(&self) -> bool {
        matches!(self, IntegratorError::WorkbookParseError(_))
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, IntegratorError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| IntegratorError::WithContextError(format!("{}: {}", message, e)))
    }
}
