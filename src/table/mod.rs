//! Header-applied, column-oriented view of one sheet.
pub(crate) mod column;

use crate::cache::memory;
use crate::decoder::FileIdentity;
use crate::detector::HeaderDecision;
use crate::detector::HeaderShape;
use crate::grid::CellValue;
use crate::grid::RawGrid;
use crate::table::column::Column;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq)]
pub enum TableError {
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),
}

/// Where a table came from and how its header was chosen.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Provenance {
    pub path: PathBuf,
    pub identity: FileIdentity,
    pub sheet_name: String,
    pub header_row: usize,
    pub confidence: f64,
    pub shape: HeaderShape,
    pub decision: HeaderDecision,
}

/// Immutable table of named, typed columns.
///
/// Every column holds exactly [`row_count`](Table::row_count) values and
/// column names are unique. Tables are shared through `Arc` and never
/// mutated after construction.
#[derive(Debug)]
pub struct Table {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    row_count: usize,
    provenance: Provenance,
    estimated_bytes: usize,
}

impl Table {
    /// Applies `decision` to `grid`: rows after the header row become data,
    /// one column per name in the decision.
    pub fn from_grid(grid: RawGrid, identity: FileIdentity, decision: HeaderDecision) -> Table {
        let path = grid.source().to_path_buf();
        let sheet_name = grid.sheet_name().to_owned();
        let width = decision.column_names.len();
        let data_start = (decision.row_index + 1).min(grid.row_count());
        let row_count = grid.row_count() - data_start;

        let mut values = vec![Vec::<CellValue>::with_capacity(row_count); width];
        for row in grid.into_rows().into_iter().skip(data_start) {
            let mut cells = row.into_iter();
            for column in values.iter_mut() {
                column.push(cells.next().unwrap_or_default());
            }
        }

        let columns = decision
            .column_names
            .iter()
            .zip(values)
            .map(|(name, values)| Column::new(name.to_owned(), values))
            .collect::<Vec<_>>();
        let provenance = Provenance {
            path,
            identity,
            sheet_name,
            header_row: decision.row_index,
            confidence: decision.confidence,
            shape: decision.shape,
            decision,
        };
        Table::new(columns, row_count, provenance)
    }

    fn new(columns: Vec<Column>, row_count: usize, provenance: Provenance) -> Table {
        debug_assert!(columns.iter().all(|column| column.len() == row_count), "ragged table");
        let index = columns
            .iter()
            .enumerate()
            .map(|(position, column)| (column.name().to_owned(), position))
            .collect::<HashMap<_, _>>();
        debug_assert_eq!(index.len(), columns.len(), "duplicate column names");
        let estimated_bytes = memory::estimate_table_bytes(&columns);
        Table {
            columns,
            index,
            row_count,
            provenance,
            estimated_bytes,
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Looks a column up by its exact name.
    pub fn column(&self, name: &str) -> Result<&Column, TableError> {
        self.index
            .get(name)
            .map(|position| &self.columns[*position])
            .ok_or_else(|| TableError::ColumnNotFound(name.to_owned()))
    }

    pub fn column_at(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn source(&self) -> &Path {
        &self.provenance.path
    }

    /// Approximate heap footprint used for cache accounting.
    pub fn estimated_bytes(&self) -> usize {
        self.estimated_bytes
    }
}
