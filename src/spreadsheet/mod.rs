//! Readers for the supported workbook formats and the [`SpreadsheetDecoder`]
//! that exposes them through [`TableDecoder`].
pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod ods;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod xls;
pub(crate) mod xlsx;

use crate::decoder::DecodeError;
use crate::decoder::TableDecoder;
use crate::error::ResultMessage;
use crate::error::SheetError;
use crate::grid::RawGrid;
use crate::spreadsheet::ods::OdsSpreadsheet;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xls::XlsSpreadsheet;
use crate::spreadsheet::xlsx::XlsxSpreadsheet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum SpreadsheetError {
    #[error("Unsupported file format '{0}'")]
    UnsupportedFormat(String),

    #[error("Spreadsheet '{0}' is password protected")]
    PasswordProtected(String),

    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    #[error("Missing package part '{0}'")]
    MissingPart(String),

    #[error("Spreadsheet '{0}' has no sheets")]
    NoSheets(String),

    #[error("Invalid cell value at '{0}': {1}")]
    CellValue(String, String),

    #[error("Invalid cell reference '{0}'")]
    CellReference(String),

    #[error("Cell at row {0}, column {1} is outside the worksheet")]
    CellOutOfRange(usize, usize),

    #[error("Sheet '{0}' spans {1} rows by {2} columns, too large to load")]
    SheetTooLarge(String, usize, usize),
}

/// A workbook opened for reading.
pub(crate) trait Spreadsheet {
    /// Name of the workbook file
    fn name(&self) -> String;

    /// Sheet names in workbook order.
    fn sheet_names(&mut self) -> Result<Vec<String>, SheetError>;

    /// Reads every non-empty cell of `sheet_name`.
    fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, SheetError>;
}

/// Lowercased extension of `path`, or an empty string.
pub(crate) fn format_of(path: &Path) -> String {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Opens a workbook, choosing the reader by file extension.
pub(crate) fn open_spreadsheet(path: &Path) -> Result<Box<dyn Spreadsheet>, SheetError> {
    let spreadsheet: Box<dyn Spreadsheet> = match format_of(path).as_str() {
        "xlsx" | "xlsm" | "xlam" => Box::new(XlsxSpreadsheet::open(path)?),
        "xls" => Box::new(XlsSpreadsheet::open(path)?),
        "ods" => Box::new(OdsSpreadsheet::open(path)?),
        "" => Err(SpreadsheetError::UnsupportedFormat(path.display().to_string()))?,
        extension => Err(SpreadsheetError::UnsupportedFormat(format!(".{extension}")))?,
    };
    Ok(spreadsheet)
}

/// [`TableDecoder`] for `.xlsx`, `.xlsm`, `.xlam`, `.xls` and `.ods` files.
///
/// Stateless: every call opens the file afresh, so one decoder can serve any
/// number of threads.
#[derive(Copy, Clone, Debug, Default)]
pub struct SpreadsheetDecoder;

impl SpreadsheetDecoder {
    pub fn new() -> Self {
        SpreadsheetDecoder
    }
}

impl TableDecoder for SpreadsheetDecoder {
    fn decode(&self, path: &Path, sheet_name: &str) -> Result<RawGrid, DecodeError> {
        let mut spreadsheet = open_spreadsheet(path)
            .map_err(|error| error.into_decode_error(path))
            .with_prefix("open")?;
        let sheet = spreadsheet
            .read_sheet(sheet_name)
            .map_err(|error| error.into_decode_error(path))
            .with_prefix(&format!("read sheet '{sheet_name}'"))?;
        tracing::trace!(spreadsheet = %spreadsheet.name(), sheet = sheet_name, cells = sheet.cells.len(), "sheet read");
        sheet
            .into_grid()
            .map_err(|error| error.into_decode_error(path))
            .with_prefix(&format!("read sheet '{sheet_name}'"))
    }

    fn list_sheets(&self, path: &Path) -> Result<Vec<String>, DecodeError> {
        open_spreadsheet(path)
            .and_then(|mut spreadsheet| spreadsheet.sheet_names())
            .map_err(|error| error.into_decode_error(path))
            .with_prefix("list sheets")
    }
}
