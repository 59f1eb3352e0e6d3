//! Excel 97-2003 workbooks (.xls): BIFF8 records inside an OLE compound file.
use crate::error::SheetError;
use crate::helpers::biff8::RecordReader;
use crate::helpers::cfb::CompoundFile;
use crate::match_records;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use either::Either;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

const FORMULA: u16 = 0x0006;
const EOF: u16 = 0x000A;
const DATE1904: u16 = 0x0022;
const FILE_PASS: u16 = 0x002F;
const CODE_PAGE: u16 = 0x0042;
const BOUND_SHEET: u16 = 0x0085;
const MUL_RK: u16 = 0x00BD;
const XF: u16 = 0x00E0;
const SST: u16 = 0x00FC;
const LABEL_SST: u16 = 0x00FD;
const NUMBER: u16 = 0x0203;
const LABEL: u16 = 0x0204;
const BOOL_ERR: u16 = 0x0205;
const STRING: u16 = 0x0207;
const RK: u16 = 0x027E;
const FORMAT: u16 = 0x041E;
const BOF: u16 = 0x0809;

/// Sheet type of a worksheet in a BOUNDSHEET record; charts and macro sheets hold no cells.
const WORKSHEET: u8 = 0;

#[derive(Error, Debug)]
pub(crate) enum XlsError {
    #[error("Unknown code page {0}")]
    CodePage(u16),

    #[error("Expected a BOF record at offset {0}")]
    MissingBof(usize),

    #[error("Unexpected formula result 0x{0:016X}")]
    FormulaValue(u64),

    #[error("Shared string {0} missing")]
    SharedString(usize),
}

/// Cell type, or the style index that implies one, and the raw value.
type CellContent = (Either<CellType, usize>, String);

/// Legacy binary workbook (.xls).
pub(crate) struct XlsSpreadsheet {
    name: String,
    reader: RecordReader,
    shared_strings: Vec<String>,
    /// Cell type implied by each XF record
    number_formats: Vec<CellType>,
    /// Worksheets as (name, offset of their BOF record)
    sheets: Vec<(String, usize)>,
}

impl XlsSpreadsheet {
    pub(crate) fn open(path: &Path) -> Result<XlsSpreadsheet, SheetError> {
        let name = path.display().to_string();
        let file = CompoundFile::open(&mut BufReader::new(File::open(path)?))?;
        let stream = match file.stream("Workbook")? {
            Some(stream) => stream,
            None => file
                .stream("Book")?
                .ok_or_else(|| SpreadsheetError::MissingPart("Workbook".to_owned()))?,
        };
        let mut reader = RecordReader::new(stream);
        if reader.next()? != Some(BOF) {
            Err(XlsError::MissingBof(0))?
        }

        let mut is_1904 = false;
        let mut shared_strings = Vec::new();
        let mut custom_formats = HashMap::<String, String>::new();
        let mut format_ids = Vec::<String>::new();
        let mut sheets = Vec::<(String, usize)>::new();
        match_records!(reader => {
            EOF => break,
            FILE_PASS => Err(SpreadsheetError::PasswordProtected(name.to_owned()))?,
            DATE1904 => is_1904 = reader.read_u16()? == 1,
            CODE_PAGE => {
                let code_page = reader.read_u16()?;
                let encoding = codepage::to_encoding(code_page).ok_or(XlsError::CodePage(code_page))?;
                // 16-bit strings are UTF-16 regardless; the code page only governs 8-bit ones
                if encoding != UTF_16LE {
                    reader.encoding = encoding;
                }
            }
            FORMAT => {
                let id = reader.read_u16()?;
                custom_formats.insert(id.to_string(), reader.read_string()?);
            }
            XF => {
                reader.skip(2)?;
                format_ids.push(reader.read_u16()?.to_string());
            }
            SST => shared_strings = load_shared_strings(&mut reader)?,
            BOUND_SHEET => {
                let offset = reader.read_u32()? as usize;
                reader.skip(1)?;
                let sheet_type = reader.read_u8()?;
                let sheet_name = reader.read_short_string()?;
                if sheet_type == WORKSHEET {
                    sheets.push((sheet_name, offset));
                }
            }
        });
        if sheets.is_empty() {
            Err(SpreadsheetError::NoSheets(name.to_owned()))?
        }

        let custom_formats = custom_formats
            .into_iter()
            .map(|(id, format)| (id, CellType::parse_custom_number_format(&format, is_1904)))
            .collect();
        let number_formats = excel::resolve_number_formats(format_ids, custom_formats, is_1904);
        tracing::trace!(spreadsheet = %name, sheets = sheets.len(), shared_strings = shared_strings.len(), "xls workbook opened");

        Ok(XlsSpreadsheet {
            name,
            reader,
            shared_strings,
            number_formats,
            sheets,
        })
    }

    fn cell_type(&self, content: Either<CellType, usize>) -> CellType {
        match content {
            Either::Left(kind) => kind,
            Either::Right(style) => self.number_formats.get(style).copied().unwrap_or(CellType::Number),
        }
    }

    /// Several RK cells of one row; the record ends with the last column index.
    fn read_mul_rk(&mut self, sheet: &mut Sheet) -> Result<(), SheetError> {
        let cells = self.reader.record_size().saturating_sub(6) / 6;
        let row = self.reader.read_u16()? as usize;
        let first = self.reader.read_u16()? as usize;
        for col in first..first + cells {
            let style = self.reader.read_u16()? as usize;
            let value = self.reader.read_rk()?;
            let kind = self.cell_type(Either::Right(style));
            sheet.push(Cell {
                row,
                col,
                kind,
                value: value.to_string(),
            })?;
        }
        Ok(())
    }
}

impl Spreadsheet for XlsSpreadsheet {
    fn name(&self) -> String {
        self.name.to_owned()
    }

    fn sheet_names(&mut self) -> Result<Vec<String>, SheetError> {
        Ok(self.sheets.iter().map(|(name, _)| name.to_owned()).collect())
    }

    fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, SheetError> {
        let offset = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, offset)| *offset)
            .ok_or_else(|| SpreadsheetError::SheetNotFound(sheet_name.to_owned()))?;

        let mut sheet = Sheet::new(&self.name, sheet_name);
        self.reader.seek(offset);
        if self.reader.next()? != Some(BOF) {
            Err(XlsError::MissingBof(offset))?
        }
        // cell of the last formula whose string result follows in a STRING record
        let mut pending_string = None::<(usize, usize)>;
        while let Some(kind) = self.reader.next()? {
            let (row, col, (content, value)) = match kind {
                BOF | EOF => break,
                MUL_RK => {
                    self.read_mul_rk(&mut sheet)?;
                    continue;
                }
                STRING => match pending_string.take() {
                    Some((row, col)) => (row, col, (Either::Left(CellType::InlineString), self.reader.read_string()?)),
                    None => continue,
                },
                NUMBER | RK | LABEL_SST | LABEL | BOOL_ERR | FORMULA => {
                    let row = self.reader.read_u16()? as usize;
                    let col = self.reader.read_u16()? as usize;
                    let content = match kind {
                        NUMBER => read_number_cell(&mut self.reader)?,
                        RK => read_rk_cell(&mut self.reader)?,
                        LABEL_SST => read_label_sst_cell(&mut self.reader, &self.shared_strings)?,
                        LABEL => read_label_cell(&mut self.reader)?,
                        BOOL_ERR => read_bool_or_error_cell(&mut self.reader)?,
                        _ => match read_formula_cell(&mut self.reader)? {
                            Some(content) => content,
                            None => {
                                pending_string = Some((row, col));
                                continue;
                            }
                        },
                    };
                    (row, col, content)
                }
                _ => continue,
            };
            let kind = self.cell_type(content);
            sheet.push(Cell { row, col, kind, value })?;
        }
        Ok(sheet)
    }
}

fn load_shared_strings(reader: &mut RecordReader) -> Result<Vec<String>, SheetError> {
    reader.skip(4)?;
    let count = reader.read_u32()? as usize;
    let mut shared_strings = Vec::new();
    for _ in 0..count {
        shared_strings.push(reader.read_rich_string()?);
    }
    Ok(shared_strings)
}

fn read_number_cell(reader: &mut RecordReader) -> Result<CellContent, SheetError> {
    let style = reader.read_u16()? as usize;
    Ok((Either::Right(style), reader.read_f64()?.to_string()))
}

fn read_rk_cell(reader: &mut RecordReader) -> Result<CellContent, SheetError> {
    let style = reader.read_u16()? as usize;
    Ok((Either::Right(style), reader.read_rk()?.to_string()))
}

fn read_label_sst_cell(reader: &mut RecordReader, shared_strings: &[String]) -> Result<CellContent, SheetError> {
    reader.skip(2)?;
    let index = reader.read_u32()? as usize;
    let text = shared_strings.get(index).ok_or(XlsError::SharedString(index))?;
    Ok((Either::Left(CellType::SharedString), text.to_owned()))
}

fn read_label_cell(reader: &mut RecordReader) -> Result<CellContent, SheetError> {
    reader.skip(2)?;
    Ok((Either::Left(CellType::InlineString), reader.read_string()?))
}

fn read_bool_or_error_cell(reader: &mut RecordReader) -> Result<CellContent, SheetError> {
    reader.skip(2)?;
    let value = reader.read_u8()?;
    Ok(if reader.read_u8()? == 0 {
        (Either::Left(CellType::Boolean), value.to_string())
    } else {
        (Either::Left(CellType::Error), error_text(value).to_owned())
    })
}

/// Cached result of a formula. `None` means a string result, stored in the
/// STRING record that follows.
fn read_formula_cell(reader: &mut RecordReader) -> Result<Option<CellContent>, SheetError> {
    let style = reader.read_u16()? as usize;
    let result = reader.read_u64()?;
    if result >> 48 != 0xFFFF {
        return Ok(Some((Either::Right(style), f64::from_bits(result).to_string())));
    }
    let value = ((result >> 16) & 0xFF) as u8;
    match result & 0xFF {
        0 => Ok(None),
        1 => Ok(Some((Either::Left(CellType::Boolean), value.to_string()))),
        2 => Ok(Some((Either::Left(CellType::Error), error_text(value).to_owned()))),
        3 => Ok(Some((Either::Left(CellType::InlineString), String::new()))),
        _ => Err(XlsError::FormulaValue(result))?,
    }
}

fn error_text(code: u8) -> &'static str {
    match code {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::CellValue;
    use crate::helpers::biff8::tests::record;
    use crate::helpers::cfb::tests::compound_file;
    use std::io::Write;

    fn bof(sheet_type: u16) -> Vec<u8> {
        let mut body = 0x0600u16.to_le_bytes().to_vec();
        body.extend(sheet_type.to_le_bytes());
        body.extend([0u8; 12]);
        record(BOF, &body)
    }

    fn cell_header(row: u16, col: u16, style: u16) -> Vec<u8> {
        [row.to_le_bytes(), col.to_le_bytes(), style.to_le_bytes()].concat()
    }

    fn short_string(text: &str) -> Vec<u8> {
        let mut bytes = vec![text.len() as u8, 0];
        bytes.extend(text.bytes());
        bytes
    }

    /// Workbook stream with one worksheet whose records are `cells`, plus `globals` records.
    fn workbook(globals: &[Vec<u8>], cells: &[Vec<u8>]) -> Vec<u8> {
        let build = |offset: u32| {
            let mut stream = bof(0x0005);
            stream.extend(globals.concat());
            for xf in [0u16, 14] {
                let mut body = 0u16.to_le_bytes().to_vec();
                body.extend(xf.to_le_bytes());
                body.extend([0u8; 16]);
                stream.extend(record(XF, &body));
            }
            let mut bound = offset.to_le_bytes().to_vec();
            bound.extend([0, 0]);
            bound.extend(short_string("Data"));
            stream.extend(record(BOUND_SHEET, &bound));
            let mut chart = 0u32.to_le_bytes().to_vec();
            chart.extend([0, 2]);
            chart.extend(short_string("Chart1"));
            stream.extend(record(BOUND_SHEET, &chart));
            stream.extend(record(EOF, &[]));
            stream
        };
        let mut stream = build(build(0).len() as u32);
        stream.extend(bof(0x0010));
        stream.extend(cells.concat());
        stream.extend(record(EOF, &[]));
        stream
    }

    fn write_xls(stream: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".xls").tempfile().unwrap();
        file.write_all(&compound_file("Workbook", stream)).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_cells_and_formula_results() {
        let mut label = cell_header(0, 0, 0);
        label.extend(4u16.to_le_bytes());
        label.extend([0, b'N', b'a', b'm', b'e']);
        let mut number = cell_header(1, 0, 1);
        number.extend(45306f64.to_le_bytes());
        let mut formula = cell_header(1, 1, 0);
        formula.extend([0, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
        formula.extend([0u8; 8]);
        let mut string = 2u16.to_le_bytes().to_vec();
        string.extend([0, b'o', b'k']);
        let mut error = cell_header(2, 0, 0);
        error.extend([0x07, 1]);
        let mut boolean = cell_header(2, 1, 0);
        boolean.extend([1, 0]);
        let mut mul_rk = [2u16.to_le_bytes(), 2u16.to_le_bytes()].concat();
        for value in [5u32, 6] {
            mul_rk.extend(0u16.to_le_bytes());
            mul_rk.extend((value << 2 | 0x02).to_le_bytes());
        }
        mul_rk.extend(3u16.to_le_bytes());

        let file = write_xls(&workbook(
            &[],
            &[
                record(LABEL, &label),
                record(NUMBER, &number),
                record(FORMULA, &formula),
                record(0x04BC, &[0u8; 8]),
                record(STRING, &string),
                record(BOOL_ERR, &error),
                record(BOOL_ERR, &boolean),
                record(MUL_RK, &mul_rk),
            ],
        ));
        let mut spreadsheet = XlsSpreadsheet::open(file.path()).unwrap();
        assert_eq!(spreadsheet.sheet_names().unwrap(), vec!["Data"]);

        let grid = spreadsheet.read_sheet("Data").unwrap().into_grid().unwrap();
        assert_eq!(grid.cell(0, 0), &CellValue::Text("Name".to_owned()));
        assert_eq!(
            grid.cell(1, 0),
            &CellValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert_eq!(grid.cell(1, 1), &CellValue::Text("ok".to_owned()));
        assert_eq!(grid.cell(2, 0), &CellValue::Error("#DIV/0!".to_owned()));
        assert_eq!(grid.cell(2, 1), &CellValue::Bool(true));
        assert_eq!(grid.cell(2, 2), &CellValue::Number(5.0));
        assert_eq!(grid.cell(2, 3), &CellValue::Number(6.0));
        assert!(matches!(
            spreadsheet.read_sheet("Chart1"),
            Err(SheetError::SpreadsheetError(SpreadsheetError::SheetNotFound(_)))
        ));
    }

    #[test]
    fn encrypted_workbook_is_password_protected() {
        let file = write_xls(&workbook(&[record(FILE_PASS, &[0u8; 6])], &[]));
        assert!(matches!(
            XlsSpreadsheet::open(file.path()),
            Err(SheetError::SpreadsheetError(SpreadsheetError::PasswordProtected(_)))
        ));
    }

    #[test]
    fn shared_string_index_must_exist() {
        let mut sst = 1u32.to_le_bytes().to_vec();
        sst.extend(1u32.to_le_bytes());
        sst.extend(1u16.to_le_bytes());
        sst.extend([0, b'a']);
        let mut label = cell_header(0, 0, 0);
        label.extend(3u32.to_le_bytes());
        let file = write_xls(&workbook(&[record(SST, &sst)], &[record(LABEL_SST, &label)]));
        let mut spreadsheet = XlsSpreadsheet::open(file.path()).unwrap();
        assert!(matches!(
            spreadsheet.read_sheet("Data"),
            Err(SheetError::XlsError(XlsError::SharedString(3)))
        ));
    }
}
