//! Raw, header-less cell grids as produced by a [`TableDecoder`](crate::TableDecoder).

use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use serde::Serialize;
use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;

static EMPTY: CellValue = CellValue::Empty;

/// A single typed cell value.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    /// Error result of a formula, e.g. `#DIV/0!`
    Error(String),
}

/// Coarse classification used by header scoring.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ValueClass {
    Empty,
    Text,
    Number,
    Bool,
    Temporal,
    Error,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, CellValue::Text(text) if !text.trim().is_empty())
    }

    /// Numbers, booleans and date/time values.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            CellValue::Number(_) | CellValue::Bool(_) | CellValue::Date(_) | CellValue::Time(_) | CellValue::DateTime(_)
        )
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn class(&self) -> ValueClass {
        match self {
            _ if self.is_empty() => ValueClass::Empty,
            CellValue::Text(_) => ValueClass::Text,
            CellValue::Number(_) => ValueClass::Number,
            CellValue::Bool(_) => ValueClass::Bool,
            CellValue::Date(_) | CellValue::Time(_) | CellValue::DateTime(_) => ValueClass::Temporal,
            CellValue::Error(_) => ValueClass::Error,
            CellValue::Empty => ValueClass::Empty,
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) => write!(f, "{text}"),
            CellValue::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                write!(f, "{}", *number as i64)
            }
            CellValue::Number(number) => write!(f, "{number}"),
            CellValue::Bool(value) => write!(f, "{value}"),
            CellValue::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            CellValue::Time(time) => write!(f, "{}", time.format("%H:%M:%S")),
            CellValue::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Error(error) => write!(f, "{error}"),
        }
    }
}

/// Unprocessed two-dimensional cell data of one sheet.
///
/// Rows may be ragged; cells past the end of a row read as [`CellValue::Empty`].
#[derive(Clone, Debug)]
pub struct RawGrid {
    source: PathBuf,
    sheet_name: String,
    rows: Vec<Vec<CellValue>>,
    column_count: usize,
}

impl RawGrid {
    pub fn new(source: impl Into<PathBuf>, sheet_name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let column_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        RawGrid {
            source: source.into(),
            sheet_name: sheet_name.into(),
            rows,
            column_count,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the row at `index`, or an empty slice when out of range.
    pub fn row(&self, index: usize) -> &[CellValue] {
        self.rows.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.row(row).get(col).unwrap_or(&EMPTY)
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[CellValue]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Takes the rows out of the grid.
    pub(crate) fn into_rows(self) -> Vec<Vec<CellValue>> {
        self.rows
    }

    /// Number of non-empty cells in a row.
    pub(crate) fn filled(&self, row: usize) -> usize {
        self.row(row).iter().filter(|cell| !cell.is_empty()).count()
    }
}
