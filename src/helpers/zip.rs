//! ZIP package access for the Office Open XML and OpenDocument containers.
//! Reading locates parts case-insensitively; writing assembles a deflated package in memory.

use crate::error::IntegratorError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

/// Part lookups on an opened package
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Finds a part by name, ignoring ASCII case and treating `\` as `/`.
    fn part(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, IntegratorError>;

    /// Opens an XML event reader over a part.
    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, IntegratorError> {
        Ok(self.part(name)?.map(|file| XmlReader::new(BufReader::new(file))))
    }

    /// Reads a whole part into memory.
    fn read_part(&mut self, name: &str) -> Result<Option<Vec<u8>>, IntegratorError> {
        match self.part(name)? {
            Some(mut file) => {
                let mut content = Vec::new();
                file.read_to_end(&mut content)?;
                Ok(Some(content))
            }
            None => Ok(None),
        }
    }

    /// Returns true when the package contains the part.
    fn has_part(&mut self, name: &str) -> Result<bool, IntegratorError> {
        Ok(self.part(name)?.is_some())
    }
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn part(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, IntegratorError> {
        let pattern = name.replace('\\', "/");
        let path = self
            .file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(&file_name.replace('\\', "/")))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(file) => Ok(file),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }
}

/// In-memory package builder
pub(crate) struct PackageWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
}

impl PackageWriter {
    pub(crate) fn new() -> Self {
        PackageWriter {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    /// Adds a deflated part.
    pub(crate) fn add_part(&mut self, name: &str, content: &[u8]) -> Result<(), IntegratorError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip.start_file(name, options)?;
        self.zip.write_all(content)?;
        Ok(())
    }

    /// Adds an uncompressed part, as the OpenDocument `mimetype` entry requires.
    pub(crate) fn add_stored_part(&mut self, name: &str, content: &[u8]) -> Result<(), IntegratorError> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        self.zip.start_file(name, options)?;
        self.zip.write_all(content)?;
        Ok(())
    }

    /// Writes the central directory and returns the package bytes.
    pub(crate) fn finish(self) -> Result<Vec<u8>, IntegratorError> {
        Ok(self.zip.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_are_found_case_insensitively() -> Result<(), IntegratorError> {
        let mut package = PackageWriter::new();
        package.add_part("xl/workbook.xml", b"<workbook/>")?;
        package.add_stored_part("mimetype", b"text/plain")?;
        let bytes = package.finish()?;

        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        assert_eq!(zip.read_part("XL/Workbook.xml")?, Some(b"<workbook/>".to_vec()));
        assert_eq!(zip.read_part("xl\\workbook.xml")?, Some(b"<workbook/>".to_vec()));
        assert!(zip.has_part("mimetype")?);
        assert!(!zip.has_part("xl/styles.xml")?);
        Ok(())
    }
}
