//! Lookup of package parts inside zip containers (.xlsx and .ods).

use crate::error::SheetError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Finds a part by name, ignoring case and path separator style.
    fn part(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SheetError>;

    /// Opens a part as a streaming XML reader.
    fn xml_reader(&'_ mut self, name: &str) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, SheetError> {
        Ok(self.part(name)?.map(|file| XmlReader::new(BufReader::new(file))))
    }
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn part(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, SheetError> {
        let wanted = name.replace('\\', "/");
        let found = self
            .file_names()
            .find(|candidate| wanted.eq_ignore_ascii_case(&candidate.replace('\\', "/")))
            .map(str::to_owned);
        match found.map(|path| self.by_name(&path)).transpose() {
            Ok(file) => Ok(file),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    #[test]
    fn finds_parts_case_insensitively() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("xl/Workbook.xml", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"<workbook/>").unwrap();
        let cursor = writer.finish().unwrap();

        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        let mut content = String::new();
        archive
            .part("XL\\workbook.xml")
            .unwrap()
            .expect("part exists")
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "<workbook/>");
        assert!(archive.part("xl/missing.xml").unwrap().is_none());
    }
}
