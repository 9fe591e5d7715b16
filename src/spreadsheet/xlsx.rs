use crate::error::IntegratorError;
use crate::error::ResultMessage;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::sheet::SheetBuilder;
use crate::spreadsheet::SheetSource;
use crate::spreadsheet::SpreadsheetError;
use crate::spreadsheet::WorkbookFormat;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::BufRead;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

// Local names of the SpreadsheetML elements the reader reacts to
const TAG_CUSTOM_FORMATS: &[u8] = b"numFmts";
const TAG_CUSTOM_FORMAT: &[u8] = b"numFmt";
const TAG_FORMAT_INDEXES: &[u8] = b"cellXfs";
const TAG_FORMAT_INDEX: &[u8] = b"xf";
const TAG_SHARED_STRING_ITEM: &[u8] = b"si";
const TAG_PHONETIC_TEXT: &[u8] = b"rPh";
const TAG_TEXT: &[u8] = b"t";
const TAG_WORKBOOK_PROPERTIES: &[u8] = b"workbookPr";
const TAG_SHEET: &[u8] = b"sheet";
const TAG_ROW: &[u8] = b"row";
const TAG_CELL: &[u8] = b"c";
const TAG_INLINE_STRING: &[u8] = b"is";
const TAG_VALUE: &[u8] = b"v";

const WORKBOOK_PART: &str = "xl/workbook.xml";

/// An Office Open XML workbook (.xlsx, .xlsm) opened from a zip package
pub(crate) struct XlsxSpreadsheet<RS: Read + Seek> {
    zip: ZipArchive<RS>,
    /// Cell type implied by each `cellXfs` style index
    number_formats: Vec<CellType>,
    /// Worksheets in workbook order as (name, package path) pairs
    sheets: Vec<(String, String)>,
}

impl<RS: Read + Seek> XlsxSpreadsheet<RS> {
    /// Reads the workbook structure and styles; sheet data is read later by `read_sheets`.
    pub(crate) fn open(mut zip: ZipArchive<RS>) -> Result<Self, IntegratorError> {
        let (sheets, is_1904) = load_workbook(&mut zip)?;
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        Ok(XlsxSpreadsheet {
            zip,
            number_formats,
            sheets,
        })
    }

    /// Loads the whole shared string table; a package without one has no shared strings.
    fn load_shared_strings(&mut self) -> Result<Vec<String>, IntegratorError> {
        let mut shared_strings = Vec::<String>::new();
        let mut reader = match self.zip.xml_reader("xl/sharedStrings.xml")? {
            Some(reader) => reader,
            None => return Ok(shared_strings),
        };
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == TAG_SHARED_STRING_ITEM => {
                shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
            }
        });
        Ok(shared_strings)
    }

    fn read_sheet(&mut self, name: &str, path: &str, shared_strings: &[String]) -> Result<Sheet, IntegratorError> {
        let mut builder = SheetBuilder::new(name);
        let mut reader = self
            .zip
            .xml_reader(path)?
            .ok_or_else(|| SpreadsheetError::MissingPart(path.to_owned()))?;

        let mut next_row = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == TAG_ROW => {
                row = match event.attribute("r")? {
                    Some(number) => match number.trim().parse::<usize>() {
                        Ok(number) if number > 0 && number <= MAX_ROWS => number - 1,
                        _ => return Err(out_of_range(name, &format!("row {}", number)).into()),
                    },
                    None => next_row,
                };
                next_row = row + 1;
                col = 0;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_CELL => {
                if let Some(reference) = event.attribute("r")? {
                    (row, col) = reference_to_index(&reference).ok_or_else(|| out_of_range(name, &reference))?;
                }
                kind = match event.attribute("t")?.as_deref() {
                    Some("s") => CellType::SharedString,
                    Some("inlineStr") | Some("str") => CellType::Text,
                    Some("b") => CellType::Boolean,
                    Some("e") => CellType::Error,
                    Some("d") => CellType::IsoDateTime,
                    _ => match event.parse_attribute::<usize>("s")? {
                        Some(style) => self.number_formats.get(style).copied().unwrap_or(CellType::Number),
                        None => CellType::Number,
                    },
                };
                value.clear();
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if event.local_name().as_ref() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.local_name().as_ref() == TAG_CELL => {
                if kind == CellType::SharedString && !value.is_empty() {
                    value = value
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|index| shared_strings.get(index))
                        .cloned()
                        .ok_or_else(|| SpreadsheetError::InvalidCellValue {
                            sheet: name.to_owned(),
                            reference: index_to_reference(row, col),
                            message: format!("shared string '{}' does not exist", value),
                        })?;
                    kind = CellType::Text;
                }
                builder.push(Cell {
                    row,
                    col,
                    kind,
                    value: std::mem::take(&mut value),
                })?;
                col += 1;
            }
        });
        Ok(builder.finish()?)
    }
}

impl<RS: Read + Seek> SheetSource for XlsxSpreadsheet<RS> {
    fn format(&self) -> WorkbookFormat {
        WorkbookFormat::Xlsx
    }

    fn read_sheets(&mut self) -> Result<Vec<Sheet>, IntegratorError> {
        let shared_strings = self.load_shared_strings().with_prefix("Read shared strings")?;
        let sheets = self.sheets.clone();
        let mut result = Vec::with_capacity(sheets.len());
        for (name, path) in &sheets {
            let sheet = self
                .read_sheet(name, path, &shared_strings)
                .with_prefix(&format!("Read sheet '{}'", name))?;
            result.push(sheet);
        }
        Ok(result)
    }
}

fn out_of_range(sheet: &str, reference: &str) -> SpreadsheetError {
    SpreadsheetError::CellOutOfRange {
        sheet: sheet.to_owned(),
        reference: reference.to_owned(),
    }
}

/// Reads sheet names, their package paths and the date system from `xl/workbook.xml`.
fn load_workbook<RS: Read + Seek>(zip: &mut ZipArchive<RS>) -> Result<(Vec<(String, String)>, bool), IntegratorError> {
    let relationships = excel::load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip
        .xml_reader(WORKBOOK_PART)?
        .ok_or_else(|| SpreadsheetError::MissingPart(WORKBOOK_PART.to_owned()))?;
    let mut sheets = Vec::<(String, String)>::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_SHEET => {
            let mut name = None::<String>;
            let mut id = None::<String>;
            for result in event.attributes() {
                let attribute = result?;
                match attribute.key.local_name().as_ref() {
                    b"name" => name = Some(attribute.unescape_value()?.into_owned()),
                    // `r:id`, whatever the relationship namespace prefix
                    b"id" if attribute.key.prefix().is_some() => id = Some(attribute.unescape_value()?.into_owned()),
                    _ => (),
                }
            }
            if let Some((name, id)) = name.zip(id) {
                let path = relationships
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| SpreadsheetError::MissingPart(format!("worksheet '{}' ({})", name, id)))?;
                sheets.push((name, path));
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event
                .attribute("date1904")?
                .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Reads `xl/styles.xml` and maps every cell style index to the cell type its number format implies.
fn load_number_formats<RS: Read + Seek>(zip: &mut ZipArchive<RS>, is_1904: bool) -> Result<Vec<CellType>, IntegratorError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut custom_formats_context = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_indexes_context = false;
    let mut format_indexes = Vec::<String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_CUSTOM_FORMATS => custom_formats_context = false,
        Event::Start(event) if custom_formats_context && event.local_name().as_ref() == TAG_CUSTOM_FORMAT => {
            if let Some((id, format)) = event.attribute("numFmtId")?.zip(event.attribute("formatCode")?) {
                custom_formats.insert(id, CellType::from_custom_number_format(&format, is_1904));
            }
        }
        Event::Start(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => format_indexes_context = true,
        Event::End(event) if event.local_name().as_ref() == TAG_FORMAT_INDEXES => format_indexes_context = false,
        Event::Start(event) if format_indexes_context && event.local_name().as_ref() == TAG_FORMAT_INDEX => {
            format_indexes.push(event.attribute("numFmtId")?.unwrap_or_else(|| "0".to_owned()));
        }
    });
    Ok(excel::resolve_number_formats(&format_indexes, &custom_formats, is_1904))
}

/// Collects the text of a string item up to `end_tag`.
/// Rich-text runs are concatenated and phonetic annotations skipped.
/// With `is_text_content` set the element's own text counts, as for `<v>`.
/// Character escapes are decoded.
fn read_string_value<R: BufRead>(reader: &mut XmlReader<R>, end_tag: &[u8], is_text_content: bool) -> Result<String, IntegratorError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end_tag => break,
        Event::Start(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.local_name().as_ref() == TAG_TEXT => is_text = true,
        Event::End(event) if event.local_name().as_ref() == TAG_TEXT => is_text = is_text_content,
        Event::Text(event) if is_text => text.push_xml_text(&event)?,
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_xml_ref(&event)?,
    });
    Ok(decode_escapes(&text))
}

/// Decodes `_xHHHH_` character escapes, e.g. `_x000D_` for a carriage return.
/// `_x005F_` stands for the underscore of an escape kept literally.
fn decode_escapes(text: &str) -> String {
    if !text.contains("_x") {
        return text.to_owned();
    }
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("_x") {
        decoded.push_str(&rest[..start]);
        rest = &rest[start..];
        let escaped = rest
            .get(2..6)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()) && rest.as_bytes().get(6) == Some(&b'_'))
            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            .and_then(char::from_u32);
        match escaped {
            Some(c) => {
                decoded.push(c);
                rest = &rest[7..];
            }
            None => {
                decoded.push_str("_x");
                rest = &rest[2..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::zip::PackageWriter;
    use crate::spreadsheet::cell::CellValue;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr/>
<sheets><sheet name="Inventory" sheetId="1" r:id="rId1"/><sheet name="Notes &amp; Misc" sheetId="2" r:id="rId2"/></sheets>
</workbook>"#;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1"><numFmt numFmtId="164" formatCode="dd/mm/yyyy"/></numFmts>
<cellStyleXfs count="1"><xf numFmtId="14"/></cellStyleXfs>
<cellXfs count="3"><xf numFmtId="0"/><xf numFmtId="164"/><xf numFmtId="46"/></cellXfs>
</styleSheet>"#;

    const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3">
<si><t>Sr. No.</t></si>
<si><r><t>Na</t></r><r><t>me</t></r><rPh><t>ナメ</t></rPh></si>
<si><t xml:space="preserve"> Widget </t></si>
</sst>"#;

    const SHEET1: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="inlineStr"><is><t>Received</t></is></c><c r="D1" t="str"><f>"Shift"</f><v>Shift</v></c></row>
<row r="2"><c r="A2"><v>1</v></c><c r="B2" t="s"><v>2</v></c><c r="C2" s="1"><v>45292</v></c><c r="D2" s="2"><v>0.5</v></c></row>
<row r="4"><c><v>2.5</v></c><c t="b"><v>1</v></c><c t="e"><v>#N/A</v></c></row>
</sheetData>
</worksheet>"#;

    const SHEET2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#;

    fn package(parts: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut package = PackageWriter::new();
        for (name, content) in parts {
            package.add_part(name, content.as_bytes()).unwrap();
        }
        ZipArchive::new(Cursor::new(package.finish().unwrap())).unwrap()
    }

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_owned())
    }

    #[test]
    fn reads_sheets_in_workbook_order() -> Result<(), IntegratorError> {
        let zip = package(&[
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/styles.xml", STYLES),
            ("xl/sharedStrings.xml", SHARED_STRINGS),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ]);
        let mut spreadsheet = XlsxSpreadsheet::open(zip)?;
        assert_eq!(spreadsheet.format(), WorkbookFormat::Xlsx);
        let sheets = spreadsheet.read_sheets()?;

        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name(), "Inventory");
        assert_eq!(sheets[1].name(), "Notes & Misc");
        assert_eq!(sheets[1].row_count(), 0);

        let rows = sheets[0].rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec![text("Sr. No."), text("Name"), text("Received"), text("Shift")]);
        assert_eq!(
            rows[1],
            vec![
                CellValue::Number(1.0),
                text(" Widget "),
                CellValue::DateTime(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()),
                CellValue::Duration(chrono::Duration::hours(12)),
            ]
        );
        assert_eq!(rows[2], vec![CellValue::Empty; 4]);
        assert_eq!(
            rows[3],
            vec![CellValue::Number(2.5), CellValue::Boolean(true), CellValue::Empty, CellValue::Empty]
        );
        Ok(())
    }

    #[test]
    fn missing_shared_string_is_an_error() {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>7</v></c></row></sheetData></worksheet>"#;
        let zip = package(&[
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/worksheets/sheet1.xml", sheet),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ]);
        let error = XlsxSpreadsheet::open(zip).unwrap().read_sheets().unwrap_err();
        assert!(error.to_string().contains("shared string '7' does not exist"), "{}", error);
    }

    #[test]
    fn missing_workbook_part_is_an_error() {
        let zip = package(&[("xl/worksheets/sheet1.xml", SHEET2)]);
        assert!(XlsxSpreadsheet::open(zip).is_err());
    }

    fn read_single_sheet(sheet: &str) -> Result<Vec<Sheet>, IntegratorError> {
        let zip = package(&[
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/styles.xml", STYLES),
            ("xl/sharedStrings.xml", SHARED_STRINGS),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", sheet),
        ]);
        XlsxSpreadsheet::open(zip)?.read_sheets()
    }

    #[test]
    fn cell_reference_past_sheet_limits_is_an_error() {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="ZZZZZZZ1"><v>1</v></c></row></sheetData></worksheet>"#;
        let error = read_single_sheet(sheet).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Read sheet 'Notes & Misc': Cell position ZZZZZZZ1 in 'Notes & Misc' is outside the sheet limits"
        );

        let sheet = r#"<worksheet><sheetData><row r="1"><c r="XFE1"><v>1</v></c></row></sheetData></worksheet>"#;
        assert!(read_single_sheet(sheet).is_err());
    }

    #[test]
    fn row_number_past_sheet_limits_is_an_error() {
        let sheet = r#"<worksheet><sheetData><row r="2000000"><c><v>1</v></c></row></sheetData></worksheet>"#;
        let error = read_single_sheet(sheet).unwrap_err();
        assert!(error.to_string().contains("row 2000000"), "{}", error);
    }

    #[test]
    fn cells_without_reference_stop_at_last_column() {
        let cells = "<c><v>1</v></c>".repeat(16_385);
        let sheet = format!("<worksheet><sheetData><row>{}</row></sheetData></worksheet>", cells);
        let error = read_single_sheet(&sheet).unwrap_err();
        assert!(error.to_string().contains("R1C16385"), "{}", error);
    }

    #[test]
    fn date_serial_outside_calendar_stays_a_number() -> Result<(), IntegratorError> {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" s="1"><v>1e12</v></c><c r="B1" s="1"><v>45292</v></c></row></sheetData></worksheet>"#;
        let sheets = read_single_sheet(sheet)?;
        assert_eq!(sheets[0].row_count(), 4);
        assert_eq!(
            sheets[1].rows()[0],
            vec![
                CellValue::Number(1e12),
                CellValue::DateTime(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()),
            ]
        );
        Ok(())
    }

    #[test]
    fn decodes_character_escapes_in_strings() -> Result<(), IntegratorError> {
        let shared_strings = r#"<sst><si><t>Qty_x000D_</t></si><si><r><t>Sr._x0020_</t></r><r><t>No.</t></r></si></sst>"#;
        let sheet = r#"<worksheet><sheetData><row r="1">
<c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c>
<c r="C1" t="inlineStr"><is><t>_x005F_x000D_ and _xZZ_ and _x00e9_</t></is></c>
</row></sheetData></worksheet>"#;
        let zip = package(&[
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/sharedStrings.xml", shared_strings),
            ("xl/worksheets/sheet1.xml", sheet),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ]);
        let sheets = XlsxSpreadsheet::open(zip)?.read_sheets()?;
        assert_eq!(
            sheets[0].rows()[0],
            vec![text("Qty\r"), text("Sr. No."), text("_x000D_ and _xZZ_ and é")]
        );
        Ok(())
    }

    #[test]
    fn escape_decoding_leaves_plain_text() {
        assert_eq!(decode_escapes("Name"), "Name");
        assert_eq!(decode_escapes("_x"), "_x");
        assert_eq!(decode_escapes("_x12"), "_x12");
        assert_eq!(decode_escapes("a_xD800_b"), "a_xD800_b");
        assert_eq!(decode_escapes("_x0041__x0042_"), "AB");
    }

    #[test]
    fn date1904_system_shifts_serials() -> Result<(), IntegratorError> {
        let workbook = WORKBOOK.replace("<workbookPr/>", r#"<workbookPr date1904="1"/>"#);
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="A1" s="1"><v>0</v></c></row></sheetData></worksheet>"#;
        let zip = package(&[
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/workbook.xml", &workbook),
            ("xl/styles.xml", STYLES),
            ("xl/worksheets/sheet1.xml", sheet),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ]);
        let sheets = XlsxSpreadsheet::open(zip)?.read_sheets()?;
        assert_eq!(
            sheets[0].rows()[0][0],
            CellValue::DateTime(NaiveDate::from_ymd_opt(1904, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap())
        );
        Ok(())
    }
}
