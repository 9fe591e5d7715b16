//! # Workbook Writer
//!
//! Serializes a [`ConsolidatedTable`] into a single-sheet `.xlsx` package.
//!
//! Cells keep their type: text becomes an inline string, numbers and booleans typed values,
//! date-times 1900-system serials styled as dates and durations day fractions styled as
//! elapsed time. Blank cells are not written.
use crate::consolidate::ConsolidatedTable;
use crate::error::IntegratorError;
use crate::error::ResultMessage;
use crate::helpers::xml::XmlPartWriter;
use crate::helpers::zip::PackageWriter;
use crate::spreadsheet::cell::datetime_to_serial;
use crate::spreadsheet::cell::duration_to_serial;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::CellValue;
use log::debug;

/// Name of the only sheet of a consolidated workbook.
pub const OUTPUT_SHEET_NAME: &str = "Excel_Integrator_Output";

const MAIN_NAMESPACE: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIPS_NAMESPACE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_RELATIONSHIPS_NAMESPACE: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const WORKSHEET_RELATIONSHIP: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const STYLES_RELATIONSHIP: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const WORKSHEET_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";

// `cellXfs` indexes declared in STYLES
const STYLE_DATETIME: &str = "1";
const STYLE_DURATION: &str = "2";

const ROOT_RELATIONSHIPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>
<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/><xf numFmtId="46" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs>
<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>"#;

/// Writes the consolidated table: the column labels on the first row, then every data row.
pub fn write(table: &ConsolidatedTable) -> Result<Vec<u8>, IntegratorError> {
    let header: Vec<CellValue> = table.header().into_iter().map(|label| CellValue::Text(label.to_owned())).collect();
    let rows = std::iter::once(header.as_slice()).chain(table.rows().iter().map(Vec::as_slice));
    let worksheet = write_worksheet(rows).with_prefix("Write worksheet")?;
    let bytes = write_package(&[(OUTPUT_SHEET_NAME, worksheet)])?;
    debug!("Wrote {} row(s) to '{}' ({} bytes)", table.row_count(), OUTPUT_SHEET_NAME, bytes.len());
    Ok(bytes)
}

/// Writes a workbook holding the given sheets in order, each row written as is.
/// Builds multi-sheet input workbooks for tests; not part of the output contract.
#[doc(hidden)]
pub fn write_sheets(sheets: &[(&str, &[Vec<CellValue>])]) -> Result<Vec<u8>, IntegratorError> {
    let mut worksheets = Vec::with_capacity(sheets.len());
    for (name, rows) in sheets {
        let worksheet = write_worksheet(rows.iter().map(Vec::as_slice)).with_prefix(&format!("Write sheet '{}'", name))?;
        worksheets.push((*name, worksheet));
    }
    write_package(&worksheets)
}

fn write_package(worksheets: &[(&str, Vec<u8>)]) -> Result<Vec<u8>, IntegratorError> {
    let mut package = PackageWriter::new();
    package.add_part("[Content_Types].xml", &write_content_types(worksheets.len())?)?;
    package.add_part("_rels/.rels", ROOT_RELATIONSHIPS.as_bytes())?;
    package.add_part("xl/workbook.xml", &write_workbook_part(worksheets)?)?;
    package.add_part("xl/_rels/workbook.xml.rels", &write_workbook_relationships(worksheets.len())?)?;
    package.add_part("xl/styles.xml", STYLES.as_bytes())?;
    for (index, (_, worksheet)) in worksheets.iter().enumerate() {
        package.add_part(&format!("xl/worksheets/sheet{}.xml", index + 1), worksheet)?;
    }
    package.finish()
}

fn write_content_types(sheet_count: usize) -> Result<Vec<u8>, IntegratorError> {
    let mut xml = XmlPartWriter::new()?;
    xml.open("Types", &[("xmlns", "http://schemas.openxmlformats.org/package/2006/content-types")])?;
    xml.empty("Default", &[("Extension", "rels"), ("ContentType", "application/vnd.openxmlformats-package.relationships+xml")])?;
    xml.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
    xml.empty(
        "Override",
        &[("PartName", "/xl/workbook.xml"), ("ContentType", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml")],
    )?;
    xml.empty(
        "Override",
        &[("PartName", "/xl/styles.xml"), ("ContentType", "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml")],
    )?;
    for index in 1..=sheet_count {
        let part_name = format!("/xl/worksheets/sheet{}.xml", index);
        xml.empty("Override", &[("PartName", part_name.as_str()), ("ContentType", WORKSHEET_CONTENT_TYPE)])?;
    }
    xml.close("Types")?;
    Ok(xml.into_bytes())
}

fn write_workbook_part(worksheets: &[(&str, Vec<u8>)]) -> Result<Vec<u8>, IntegratorError> {
    let mut xml = XmlPartWriter::new()?;
    xml.open("workbook", &[("xmlns", MAIN_NAMESPACE), ("xmlns:r", RELATIONSHIPS_NAMESPACE)])?;
    xml.open("sheets", &[])?;
    for (index, (name, _)) in worksheets.iter().enumerate() {
        let sheet_id = (index + 1).to_string();
        let relationship_id = format!("rId{}", index + 1);
        xml.empty("sheet", &[("name", *name), ("sheetId", sheet_id.as_str()), ("r:id", relationship_id.as_str())])?;
    }
    xml.close("sheets")?;
    xml.close("workbook")?;
    Ok(xml.into_bytes())
}

/// Worksheets take `rId1..rIdN`; styles follow.
fn write_workbook_relationships(sheet_count: usize) -> Result<Vec<u8>, IntegratorError> {
    let mut xml = XmlPartWriter::new()?;
    xml.open("Relationships", &[("xmlns", PACKAGE_RELATIONSHIPS_NAMESPACE)])?;
    for index in 1..=sheet_count {
        let id = format!("rId{}", index);
        let target = format!("worksheets/sheet{}.xml", index);
        xml.empty("Relationship", &[("Id", id.as_str()), ("Type", WORKSHEET_RELATIONSHIP), ("Target", target.as_str())])?;
    }
    let styles_id = format!("rId{}", sheet_count + 1);
    xml.empty("Relationship", &[("Id", styles_id.as_str()), ("Type", STYLES_RELATIONSHIP), ("Target", "styles.xml")])?;
    xml.close("Relationships")?;
    Ok(xml.into_bytes())
}

fn write_worksheet<'r>(rows: impl IntoIterator<Item = &'r [CellValue]>) -> Result<Vec<u8>, IntegratorError> {
    let mut xml = XmlPartWriter::new()?;
    xml.open("worksheet", &[("xmlns", MAIN_NAMESPACE)])?;
    xml.open("sheetData", &[])?;
    for (row, cells) in rows.into_iter().enumerate() {
        let row_number = (row + 1).to_string();
        xml.open("row", &[("r", row_number.as_str())])?;
        for (col, value) in cells.iter().enumerate() {
            write_cell(&mut xml, &index_to_reference(row, col), value)?;
        }
        xml.close("row")?;
    }
    xml.close("sheetData")?;
    xml.close("worksheet")?;
    Ok(xml.into_bytes())
}

fn write_cell(xml: &mut XmlPartWriter, reference: &str, value: &CellValue) -> Result<(), IntegratorError> {
    match value {
        CellValue::Empty => return Ok(()),
        CellValue::Boolean(flag) => {
            xml.open("c", &[("r", reference), ("t", "b")])?;
            xml.element("v", &[], if *flag { "1" } else { "0" })?;
        }
        CellValue::Number(number) if number.is_finite() => {
            xml.open("c", &[("r", reference)])?;
            xml.element("v", &[], &number.to_string())?;
        }
        CellValue::Number(_) => {
            xml.open("c", &[("r", reference), ("t", "e")])?;
            xml.element("v", &[], "#NUM!")?;
        }
        CellValue::Text(text) => {
            xml.open("c", &[("r", reference), ("t", "inlineStr")])?;
            xml.open("is", &[])?;
            xml.element("t", &[("xml:space", "preserve")], text)?;
            xml.close("is")?;
        }
        CellValue::DateTime(datetime) => {
            xml.open("c", &[("r", reference), ("s", STYLE_DATETIME)])?;
            xml.element("v", &[], &datetime_to_serial(datetime).to_string())?;
        }
        CellValue::Duration(duration) => {
            xml.open("c", &[("r", reference), ("s", STYLE_DURATION)])?;
            xml.element("v", &[], &duration_to_serial(duration).to_string())?;
        }
    }
    xml.close("c")
}
