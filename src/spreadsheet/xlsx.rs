use crate::error::SheetError;
use crate::helpers::xml::push_reference;
use crate::helpers::xml::StartTagExt;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::PackageReader;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::row_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::HashSet;
use std::io::BufReader;
use std::path::Path;
use zip::read::ZipFile;
use zip::ZipArchive;

// XML tag names for parsing Excel XLSX format
const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts"); // Custom number formats container
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt"); // Individual custom number format
const TAG_FORMAT_INDEXES: QName = QName(b"cellXfs"); // Cell format indexes container
const TAG_FORMAT_INDEX: QName = QName(b"xf"); // Individual cell format index
const TAG_SHARED_STRING_ITEM: QName = QName(b"si"); // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh"); // Phonetic text for Asian languages
const TAG_TEXT: QName = QName(b"t"); // Text content within strings
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// Office Open XML workbook (.xlsx, .xlsm, .xlam).
pub(crate) struct XlsxSpreadsheet {
    name: String,
    zip: ZipArchive<PackageReader>,
    /// Cell type implied by each cell style index
    number_formats: Vec<CellType>,
    /// Worksheets as (name, zip_path) pairs in workbook order
    sheets: Vec<(String, String)>,
}

impl XlsxSpreadsheet {
    pub(crate) fn open(path: &Path) -> Result<XlsxSpreadsheet, SheetError> {
        let mut zip = excel::open_package(path)?;
        let (sheets, is_1904) = load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::NoSheets(path.display().to_string()))?
        }
        let number_formats = load_number_formats(&mut zip, is_1904)?;
        Ok(XlsxSpreadsheet {
            name: path.display().to_string(),
            zip,
            number_formats,
            sheets,
        })
    }

    /// Loads shared strings. With `indexes`, only those entries are kept and
    /// the returned map translates table index to position in the vector.
    fn load_shared_strings(
        &mut self,
        mut indexes: Option<HashSet<usize>>,
    ) -> Result<(Vec<String>, HashMap<usize, usize>), SheetError> {
        let mut shared_strings = Vec::<String>::new();
        let mut mappings = HashMap::<usize, usize>::new();
        let mut reader = match self.zip.xml_reader("xl/sharedStrings.xml")? {
            Some(reader) => reader,
            None => return Ok((shared_strings, mappings)),
        };

        let mut id = 0usize;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
                if let Some(keys) = &mut indexes {
                    if keys.remove(&id) {
                        let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
                        mappings.insert(id, shared_strings.len());
                        shared_strings.push(string);
                    }
                    if keys.is_empty() {
                        break;
                    }
                } else {
                    let string = read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?;
                    mappings.insert(id, shared_strings.len());
                    shared_strings.push(string);
                }
                id += 1;
            }
        });
        Ok((shared_strings, mappings))
    }

    /// Replaces shared string indexes in `sheet` with their text.
    fn resolve_shared_strings(&mut self, sheet: &mut Sheet) -> Result<(), SheetError> {
        let indexes = sheet
            .cells
            .iter()
            .filter(|cell| cell.kind == CellType::SharedString)
            .map(|cell| cell.value.parse::<usize>())
            .collect::<Result<HashSet<usize>, _>>()?;
        if indexes.is_empty() {
            return Ok(());
        }
        let (strings, mappings) = self.load_shared_strings(Some(indexes))?;
        for cell in sheet.cells.iter_mut().filter(|cell| cell.kind == CellType::SharedString) {
            let index = cell.value.parse::<usize>()?;
            let position = mappings
                .get(&index)
                .ok_or_else(|| SpreadsheetError::CellValue(cell.reference(), format!("shared string {index} missing")))?;
            cell.value = strings[*position].to_owned();
        }
        Ok(())
    }
}

impl Spreadsheet for XlsxSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&mut self) -> Result<Vec<String>, SheetError> {
        Ok(self.sheets.iter().map(|(name, _)| name.to_owned()).collect())
    }

    fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, SheetError> {
        let zip_path = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.to_owned())
            .ok_or_else(|| SpreadsheetError::SheetNotFound(sheet_name.to_owned()))?;

        let mut sheet = Sheet::new(&self.name, sheet_name);
        let mut next_row = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        {
            let mut reader = self
                .zip
                .xml_reader(&zip_path)?
                .ok_or_else(|| SpreadsheetError::MissingPart(zip_path.to_owned()))?;
            match_xml_events!(reader => {
                Event::Start(event) if event.name() == TAG_ROW => {
                    row = match event.attr("r")? {
                        Some(number) => row_to_index(&number)
                            .ok_or_else(|| SpreadsheetError::CellReference(number.to_string()))?,
                        None => next_row,
                    };
                    col = 0;
                }
                Event::End(event) if event.name() == TAG_ROW => {
                    next_row = row + 1;
                }
                Event::Start(event) if event.name() == TAG_CELL => {
                    if let Some(reference) = event.attr("r")? {
                        (row, col) = reference_to_index(&reference)
                            .ok_or_else(|| SpreadsheetError::CellReference(reference.to_string()))?;
                    }
                    value.clear();
                    kind = event.attr("t")?.map(|t| {
                        match t.as_ref() {
                            "inlineStr" | "str" => CellType::InlineString,
                            "s" => CellType::SharedString,
                            "d" => CellType::IsoDateTime,
                            "b" => CellType::Boolean,
                            "e" => CellType::Error,
                            _ => CellType::Number,
                        }
                    }).unwrap_or(CellType::Number);
                    if kind == CellType::Number {
                        if let Some(style) = event.parse_attr::<usize>("s")? {
                            kind = self.number_formats.get(style).copied().unwrap_or(CellType::Number);
                        }
                    }
                }
                Event::Start(event) if event.name() == TAG_INLINE_STRING => {
                    value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
                }
                Event::Start(event) if event.name() == TAG_VALUE => {
                    value = read_string_value(&mut reader, TAG_VALUE, true)?;
                }
                Event::End(event) if event.name() == TAG_CELL => {
                    sheet.push(Cell {
                        row,
                        col,
                        kind,
                        value: std::mem::take(&mut value),
                    })?;
                    col += 1;
                }
            });
        }
        self.resolve_shared_strings(&mut sheet)?;
        Ok(sheet)
    }
}

/// Reads sheet names and paths from the workbook part, plus the date system in use.
fn load_workbook(zip: &mut ZipArchive<PackageReader>) -> Result<(Vec<(String, String)>, bool), SheetError> {
    let relationships = excel::load_relationships(zip, "xl/_rels/workbook.xml.rels")?;
    let mut reader = zip
        .xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::MissingPart("xl/workbook.xml".to_owned()))?;
    let mut sheets = Vec::<(String, String)>::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None::<Cow<str>>;
            let mut id = None::<Cow<str>>;
            for result in event.attributes() {
                let attribute = result?;
                let key = attribute.key.local_name();
                if key.as_ref() == b"name" {
                    name = Some(attribute.unescape_value()?);
                } else if key.as_ref() == b"id" {
                    id = Some(attribute.unescape_value()?);
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(id.as_ref()) {
                    sheets.push((name.to_string(), path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event.attr("date1904")?
                .map(|value| value == "1" || value == "true")
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Maps each cell style index to the cell type its number format implies.
fn load_number_formats(zip: &mut ZipArchive<PackageReader>, is_1904: bool) -> Result<Vec<CellType>, SheetError> {
    let mut reader = match zip.xml_reader("xl/styles.xml")? {
        Some(reader) => reader,
        None => return Ok(Vec::new()),
    };

    let mut in_custom_formats = false;
    let mut in_format_indexes = false;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_ids = Vec::<String>::new();

    match_xml_events!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => in_custom_formats = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => in_custom_formats = false,
        Event::Start(event) if in_custom_formats && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.attr("numFmtId")?;
            let format = event.attr("formatCode")?;
            if let Some((id, format)) = id.zip(format) {
                custom_formats.insert(id.to_string(), CellType::parse_custom_number_format(&format, is_1904));
            }
        }
        Event::Start(event) if event.name() == TAG_FORMAT_INDEXES => in_format_indexes = true,
        Event::End(event) if event.name() == TAG_FORMAT_INDEXES => break,
        Event::Start(event) if in_format_indexes && event.name() == TAG_FORMAT_INDEX => {
            format_ids.push(event.attr("numFmtId")?.map(|id| id.to_string()).unwrap_or_default());
        }
    });

    Ok(excel::resolve_number_formats(format_ids, custom_formats, is_1904))
}

/// Reads the text of a string item or value element up to `end_tag`,
/// skipping phonetic runs.
fn read_string_value(
    reader: &mut XmlReader<BufReader<ZipFile<'_, PackageReader>>>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, SheetError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => push_reference(&mut text, &event)?,
    });
    Ok(text)
}
