use crate::grid::CellValue;
use serde::Serialize;

/// Inferred type of a column's values.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Boolean,
    /// Numbers without a fractional part
    Integer,
    Number,
    Date,
    Time,
    DateTime,
    Text,
    /// No value at all
    Empty,
}

impl ColumnKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Boolean => "boolean",
            ColumnKind::Integer => "integer",
            ColumnKind::Number => "number",
            ColumnKind::Date => "date",
            ColumnKind::Time => "time",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Text => "text",
            ColumnKind::Empty => "empty",
        }
    }

    /// Kind of a single value; empty cells and error results carry no type.
    fn of(value: &CellValue) -> Option<ColumnKind> {
        match value {
            _ if value.is_empty() => None,
            CellValue::Bool(_) => Some(ColumnKind::Boolean),
            CellValue::Number(number) if number.fract() == 0.0 => Some(ColumnKind::Integer),
            CellValue::Number(_) => Some(ColumnKind::Number),
            CellValue::Date(_) => Some(ColumnKind::Date),
            CellValue::Time(_) => Some(ColumnKind::Time),
            CellValue::DateTime(_) => Some(ColumnKind::DateTime),
            CellValue::Text(_) => Some(ColumnKind::Text),
            CellValue::Error(_) | CellValue::Empty => None,
        }
    }

    /// Most specific kind shared by every typed value, falling back to text
    /// when kinds are inconsistent.
    pub fn infer(values: &[CellValue]) -> ColumnKind {
        let kinds = values.iter().filter_map(ColumnKind::of).collect::<Vec<_>>();
        if kinds.is_empty() {
            ColumnKind::Empty
        } else if kinds.iter().all(|kind| *kind == ColumnKind::Boolean) {
            ColumnKind::Boolean
        } else if kinds.iter().all(|kind| *kind == ColumnKind::Integer) {
            ColumnKind::Integer
        } else if kinds.iter().all(ColumnKind::is_numeric) {
            ColumnKind::Number
        } else if kinds.iter().all(|kind| *kind == ColumnKind::Date) {
            ColumnKind::Date
        } else if kinds.iter().all(|kind| *kind == ColumnKind::Time) {
            ColumnKind::Time
        } else if kinds.iter().all(ColumnKind::is_temporal) {
            ColumnKind::DateTime
        } else {
            ColumnKind::Text
        }
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Number)
    }

    #[inline]
    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnKind::Date | ColumnKind::Time | ColumnKind::DateTime)
    }
}

/// A named column of a [`Table`](crate::Table), one value per data row.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    values: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        Column {
            name: name.into(),
            kind: ColumnKind::infer(&values),
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn get(&self, row: usize) -> Option<&CellValue> {
        self.values.get(row)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Numeric values, skipping everything else.
    pub fn numbers(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().filter_map(CellValue::as_number)
    }
}
