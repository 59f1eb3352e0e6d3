use crate::error::SheetError;
use crate::helpers::xml::push_reference;
use crate::helpers::xml::StartTagExt;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel::PackageReader;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::fs::File;
use std::io::BufReader;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;

/// ODS file MIME type identifier
const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
const CONTENT: &str = "content.xml";
const TABLE: QName = QName(b"table:table");
const TABLE_ROW: QName = QName(b"table:table-row");
const TABLE_CELL: QName = QName(b"table:table-cell");
/// Cell hidden under a merged range
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// Comments attached to a cell
const ANNOTATION: QName = QName(b"office:annotation");
const PARAGRAPH: QName = QName(b"text:p");
/// Run of spaces
const SPACE: QName = QName(b"text:s");

#[derive(Error, Debug)]
pub(crate) enum OdsError {
    #[error("Invalid ODS MIME type")]
    MimeTypeError,
}

/// OpenDocument spreadsheet (.ods).
pub(crate) struct OdsSpreadsheet {
    name: String,
    zip: ZipArchive<PackageReader>,
}

impl OdsSpreadsheet {
    pub(crate) fn open(path: &Path) -> Result<Self, SheetError> {
        let file = File::open(path)?;
        let mut zip = ZipArchive::new(BufReader::new(file))?;
        check_mime(&mut zip)?;
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::PasswordProtected(path.display().to_string()))?;
        }
        Ok(OdsSpreadsheet {
            name: path.display().to_string(),
            zip,
        })
    }
}

impl Spreadsheet for OdsSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&mut self) -> Result<Vec<String>, SheetError> {
        let mut names = Vec::<String>::new();
        let mut reader = self
            .zip
            .xml_reader(CONTENT)?
            .ok_or_else(|| SpreadsheetError::MissingPart(CONTENT.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TABLE => {
                if let Some(name) = event.attr("table:name")? {
                    names.push(name.to_string());
                }
            }
        });
        if names.is_empty() {
            Err(SpreadsheetError::NoSheets(self.name.to_owned()))?
        }
        Ok(names)
    }

    fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, SheetError> {
        let mut reader = self
            .zip
            .xml_reader(CONTENT)?
            .ok_or_else(|| SpreadsheetError::MissingPart(CONTENT.to_owned()))?;

        let mut found = false;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TABLE => {
                if event.attr("table:name")?.map(|name| name == sheet_name).unwrap_or(false) {
                    found = true;
                    break;
                }
            }
        });
        if !found {
            Err(SpreadsheetError::SheetNotFound(sheet_name.to_owned()))?
        }

        let mut sheet = Sheet::new(&self.name, sheet_name);
        let mut row = 0usize;
        let mut col = 0usize;
        let mut row_count = 1usize;
        let mut col_count = 1usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        // whether the cell's paragraphs carry its value
        let mut text_context = false;
        let mut comment_context = false;
        match_xml_events!(reader => {
            Event::End(event) if event.name() == TABLE => break,
            Event::Start(event) if event.name() == TABLE_ROW => {
                row_count = event.parse_attr("table:number-rows-repeated")?.unwrap_or(1);
                col = 0;
            }
            Event::End(event) if event.name() == TABLE_ROW => {
                row = row.saturating_add(row_count);
            }
            Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                value.clear();
                col_count = event.parse_attr("table:number-columns-repeated")?.unwrap_or(1);
                let value_type = event.attr("office:value-type")?.map(|value_type| value_type.to_string());
                kind = match value_type.as_deref() {
                    Some("boolean") => CellType::Boolean,
                    Some("date") => CellType::IsoDateTime,
                    Some("time") => CellType::IsoDuration,
                    Some("string") => {
                        let is_error = event.attr("calcext:value-type")?.map(|cow| cow == "error").unwrap_or(false);
                        if is_error { CellType::Error } else { CellType::InlineString }
                    }
                    Some(_) => CellType::Number,
                    None => CellType::Empty,
                };
                match value_type.as_deref() {
                    None => (),
                    Some("string") => text_context = true,
                    Some("boolean") => {
                        let truthy = event.attr("office:boolean-value")?.map(|cow| cow != "false" && cow != "0").unwrap_or(false);
                        value.push_str(if truthy { "1" } else { "0" });
                    }
                    Some("date") => value.push_str(&event.attr("office:date-value")?.unwrap_or_default()),
                    Some("time") => value.push_str(&event.attr("office:time-value")?.unwrap_or_default()),
                    Some(_) => value.push_str(&event.attr("office:value")?.unwrap_or_default()),
                }
            }
            Event::End(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
                if kind != CellType::Empty && !value.is_empty() && row_count > 0 && col_count > 0 {
                    sheet.check_span(row.saturating_add(row_count - 1), col.saturating_add(col_count - 1))?;
                    for row_number in row..row.saturating_add(row_count) {
                        for col_number in col..col.saturating_add(col_count) {
                            sheet.push(Cell {
                                row: row_number,
                                col: col_number,
                                kind,
                                value: value.to_owned(),
                            })?;
                        }
                    }
                }
                col = col.saturating_add(col_count);
                text_context = false;
                comment_context = false;
            }
            Event::Start(event) if text_context && event.name() == ANNOTATION => comment_context = true,
            Event::End(event) if text_context && event.name() == ANNOTATION => comment_context = false,
            Event::Start(event) if text_context && !comment_context && event.name() == PARAGRAPH => {
                if !value.is_empty() {
                    value.push('\n');
                }
            }
            Event::Start(event) if text_context && !comment_context && event.name() == SPACE => {
                let count = event.parse_attr::<usize>("text:c")?.unwrap_or(1);
                value.extend(std::iter::repeat(' ').take(count));
            }
            Event::Text(event) if text_context && !comment_context => value.push_str(&event.xml_content()?),
            Event::GeneralRef(event) if text_context && !comment_context => push_reference(&mut value, &event)?,
        });
        Ok(sheet)
    }
}

/// Rejects archives whose `mimetype` part names another document type.
fn check_mime(zip: &mut ZipArchive<PackageReader>) -> Result<(), SheetError> {
    if let Some(mut file) = zip.part("mimetype")? {
        let mut buffer = Vec::with_capacity(MIME_TYPE.len());
        file.read_to_end(&mut buffer)?;
        if buffer.trim_ascii() != MIME_TYPE {
            Err(OdsError::MimeTypeError)?;
        }
    }
    Ok(())
}

/// An encrypted package lists `manifest:encryption-data` under a file entry.
fn is_password_protected(zip: &mut ZipArchive<PackageReader>) -> Result<bool, SheetError> {
    let mut reader = match zip.xml_reader("META-INF/manifest.xml")? {
        Some(reader) => reader,
        None => return Ok(false),
    };
    let mut in_file_entry = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = true,
        Event::End(event) if event.name() == QName(b"manifest:file-entry") => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == QName(b"manifest:encryption-data") => {
            return Ok(true);
        }
    });
    Ok(false)
}
