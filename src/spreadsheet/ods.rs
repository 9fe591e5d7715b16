use crate::error::IntegratorError;
use crate::error::ResultMessage;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::reference::MAX_COLUMNS;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::sheet::SheetBuilder;
use crate::spreadsheet::SheetSource;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::WorkbookFormat;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Read;
use std::io::Seek;
use thiserror::Error;
use zip::ZipArchive;

/// MIME type stored in the `mimetype` entry of OpenDocument spreadsheets
pub(crate) const MIME_TYPE: &str = "application/vnd.oasis.opendocument.spreadsheet";

const CONTENT_PART: &str = "content.xml";

const TABLE: QName = QName(b"table:table");
const TABLE_ROW: QName = QName(b"table:table-row");
const TABLE_CELL: QName = QName(b"table:table-cell");
/// Cells hidden under a merged range
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
const ANNOTATION: QName = QName(b"office:annotation");
const PARAGRAPH: QName = QName(b"text:p");
/// Run of spaces, `text:c` long
const SPACE: QName = QName(b"text:s");
const TAB: QName = QName(b"text:tab");
const LINE_BREAK: QName = QName(b"text:line-break");
const FILE_ENTRY: QName = QName(b"manifest:file-entry");
const ENCRYPTION_DATA: QName = QName(b"manifest:encryption-data");

/// Error types specific to OpenDocument spreadsheets
#[derive(Error, Debug)]
pub enum OdsError {
    #[error("Invalid ODS MIME type '{0}'")]
    MimeTypeError(String),
}

/// An OpenDocument spreadsheet (.ods) opened from a zip package
pub(crate) struct OdsSpreadsheet<RS: Read + Seek> {
    zip: ZipArchive<RS>,
}

impl<RS: Read + Seek> OdsSpreadsheet<RS> {
    /// Validates the MIME type and rejects encrypted documents.
    pub(crate) fn open(mut zip: ZipArchive<RS>) -> Result<Self, IntegratorError> {
        check_mime(&mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::PasswordProtected)?;
        }
        Ok(OdsSpreadsheet { zip })
    }
}

impl<RS: Read + Seek> SheetSource for OdsSpreadsheet<RS> {
    fn format(&self) -> WorkbookFormat {
        WorkbookFormat::Ods
    }

    fn read_sheets(&mut self) -> Result<Vec<Sheet>, IntegratorError> {
        let mut reader = self
            .zip
            .xml_reader(CONTENT_PART)?
            .ok_or_else(|| SpreadsheetError::MissingPart(CONTENT_PART.to_owned()))?;

        let mut sheets = Vec::<Sheet>::new();
        let mut builder = None::<SheetBuilder>;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut rows_repeated = 1usize;
        let mut cols_repeated = 1usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut text_context = false; // collecting paragraph text of a string cell
        let mut annotation_context = false;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TABLE => {
                let name = event.attribute("table:name")?.unwrap_or_default();
                builder = Some(SheetBuilder::new(&name));
                row = 0;
            }
            Event::End(event) if event.name() == TABLE => {
                if let Some(finished) = builder.take() {
                    let name = finished.name().to_owned();
                    let sheet = finished.finish().map_err(IntegratorError::from).with_prefix(&format!("Read sheet '{}'", name))?;
                    sheets.push(sheet);
                }
            }
            Event::Start(event) if event.name() == TABLE_ROW => {
                rows_repeated = event.parse_attribute::<usize>("table:number-rows-repeated")?.unwrap_or(1).max(1);
                col = 0;
            }
            Event::End(event) if event.name() == TABLE_ROW => row = row.saturating_add(rows_repeated),
            Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                cols_repeated = event.parse_attribute::<usize>("table:number-columns-repeated")?.unwrap_or(1).max(1);
                value.clear();
                text_context = false;
                annotation_context = false;
                kind = match event.attribute("office:value-type")?.as_deref() {
                    Some("string") => {
                        if event.attribute("calcext:value-type")?.as_deref() == Some("error") {
                            CellType::Error
                        } else if let Some(string) = event.attribute("office:string-value")? {
                            value.push_str(&string);
                            CellType::Text
                        } else {
                            text_context = true;
                            CellType::Text
                        }
                    }
                    Some("boolean") => {
                        let flag = event.attribute("office:boolean-value")?;
                        value.push_str(if flag.map(|flag| flag != "false" && flag != "0").unwrap_or(false) { "1" } else { "0" });
                        CellType::Boolean
                    }
                    Some("date") => {
                        value.push_str(&event.attribute("office:date-value")?.unwrap_or_default());
                        CellType::IsoDateTime
                    }
                    Some("time") => {
                        value.push_str(&event.attribute("office:time-value")?.unwrap_or_default());
                        CellType::IsoDuration
                    }
                    // float, percentage, currency
                    Some(_) => {
                        value.push_str(&event.attribute("office:value")?.unwrap_or_default());
                        CellType::Number
                    }
                    None => CellType::Empty,
                };
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                if let Some(builder) = builder.as_mut() {
                    if kind != CellType::Empty && !value.is_empty() {
                        // repeats are clamped to the sheet limits
                        let rows = rows_repeated.min(MAX_ROWS.saturating_sub(row));
                        let cols = cols_repeated.min(MAX_COLUMNS.saturating_sub(col));
                        for row_offset in 0..rows {
                            for col_offset in 0..cols {
                                builder.push(Cell {
                                    row: row + row_offset,
                                    col: col + col_offset,
                                    kind,
                                    value: value.to_owned(),
                                })?;
                            }
                        }
                    }
                }
                col = col.saturating_add(cols_repeated);
                text_context = false;
            }
            Event::Start(event) if text_context && event.name() == ANNOTATION => annotation_context = true,
            Event::End(event) if text_context && event.name() == ANNOTATION => annotation_context = false,
            Event::Start(event) if text_context && !annotation_context && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if text_context && !annotation_context && event.name() == SPACE => {
                let count = event.parse_attribute::<usize>("text:c")?.unwrap_or(1);
                value.extend(std::iter::repeat(' ').take(count));
            }
            Event::Start(event) if text_context && !annotation_context && event.name() == TAB => value.push('\t'),
            Event::Start(event) if text_context && !annotation_context && event.name() == LINE_BREAK => value.push('\n'),
            Event::Text(event) if text_context && !annotation_context => value.push_xml_text(&event)?,
            Event::GeneralRef(event) if text_context && !annotation_context => value.push_xml_ref(&event)?,
        });
        Ok(sheets)
    }
}

/// Rejects packages whose `mimetype` entry names another document type.
fn check_mime<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<(), IntegratorError> {
    if let Some(content) = zip.read_part("mimetype")? {
        let mime = String::from_utf8_lossy(&content).trim().to_owned();
        if !mime.starts_with(MIME_TYPE) {
            Err(OdsError::MimeTypeError(mime))?;
        }
    }
    Ok(())
}

/// Returns true when the manifest declares encryption data for any entry.
fn is_password_protected<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<bool, IntegratorError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == FILE_ENTRY => in_file_entry = true,
        Event::End(event) if event.name() == FILE_ENTRY => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == ENCRYPTION_DATA => return Ok(true),
    });
    Ok(false)
}
