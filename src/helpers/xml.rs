//! XML utilities for the zipped spreadsheet parts.
//! Reading wraps `quick_xml::Reader` with the configuration the sheet parsers expect;
//! writing wraps `quick_xml::Writer` for emitting the output workbook parts.

use crate::error::IntegratorError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesDecl;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use quick_xml::Writer;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while interpreting XML content
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Unknown XML entity '&{0};'")]
    UnknownEntity(String),

    #[error("Invalid character reference '&{0};'")]
    InvalidCharacterReference(String),

    #[error("Attribute '{name}' has invalid value '{value}'")]
    InvalidAttributeValue { name: String, value: String },
}

/// Event reader over one XML part of a spreadsheet package
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(source: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        // `<c/>` and `<c></c>` must look the same to the sheet parsers
        config.expand_empty_elements = true;
        config.trim_text(false);
        XmlReader {
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Returns the next event, or `None` once the document is exhausted.
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, IntegratorError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer)? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

/// Attribute lookups on start tags
pub(crate) trait XmlNodeHelper {
    /// Unescaped value of the attribute with the given qualified name.
    fn attribute(&self, name: &str) -> Result<Option<String>, IntegratorError>;

    /// Attribute value parsed into `T`; a present but unparsable value is an error.
    fn parse_attribute<T: FromStr>(&self, name: &str) -> Result<Option<T>, IntegratorError> {
        match self.attribute(name)? {
            Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
                XmlError::InvalidAttributeValue {
                    name: name.to_owned(),
                    value,
                }
                .into()
            }),
            None => Ok(None),
        }
    }
}

impl XmlNodeHelper for BytesStart<'_> {
    fn attribute(&self, name: &str) -> Result<Option<String>, IntegratorError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?.into_owned())),
            None => Ok(None),
        }
    }
}

/// Appends decoded XML character data to a string buffer
pub(crate) trait XmlTextHelper {
    fn push_xml_text(&mut self, text: &BytesText) -> Result<(), IntegratorError>;

    /// Resolves `&name;` and `&#NNN;` references.
    fn push_xml_ref(&mut self, reference: &BytesRef) -> Result<(), IntegratorError>;
}

impl XmlTextHelper for String {
    fn push_xml_text(&mut self, text: &BytesText) -> Result<(), IntegratorError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_xml_ref(&mut self, reference: &BytesRef) -> Result<(), IntegratorError> {
        let raw = reference.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = match number.strip_prefix('x').or_else(|| number.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16),
                None => number.parse::<u32>(),
            };
            let character = code
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| XmlError::InvalidCharacterReference(raw.to_string()))?;
            self.push(character);
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::UnknownEntity(raw.to_string()))?;
        }
        Ok(())
    }
}

/// Drains events from an `XmlReader`, dispatching them to the given match arms.
/// `Eof` ends the loop; unmatched events are ignored.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(event) = $reader.next()? {
            match event {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

/// Buffered writer for one XML part of the output package
pub(crate) struct XmlPartWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlPartWriter {
    /// Starts a standalone UTF-8 document.
    pub(crate) fn new() -> Result<Self, IntegratorError> {
        let mut writer = Writer::new(Vec::with_capacity(4096));
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(XmlPartWriter { writer })
    }

    pub(crate) fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), IntegratorError> {
        let tag = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Start(tag))?;
        Ok(())
    }

    pub(crate) fn close(&mut self, name: &str) -> Result<(), IntegratorError> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    pub(crate) fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), IntegratorError> {
        let tag = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Empty(tag))?;
        Ok(())
    }

    /// Writes escaped character data.
    pub(crate) fn text(&mut self, content: &str) -> Result<(), IntegratorError> {
        self.writer.write_event(Event::Text(BytesText::new(content)))?;
        Ok(())
    }

    /// Writes `<name attributes>content</name>`.
    pub(crate) fn element(&mut self, name: &str, attributes: &[(&str, &str)], content: &str) -> Result<(), IntegratorError> {
        self.open(name, attributes)?;
        self.text(content)?;
        self.close(name)
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}
