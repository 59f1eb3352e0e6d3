use crate::error::SheetError;
use crate::grid::CellValue;
use crate::grid::RawGrid;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::reference::MAX_COLUMNS;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::SpreadsheetError;
use std::path::Path;

/// Largest dense grid a sheet may be laid out into.
pub(crate) const MAX_GRID_CELLS: usize = 1 << 24;

/// Cells of one sheet in reading order, plus the occupied bounds.
pub(crate) struct Sheet {
    /// Source file name
    pub(crate) file_name: String,
    /// Sheet name
    pub(crate) name: String,
    /// Non-empty cells in the order they were read
    pub(crate) cells: Vec<Cell>,
    pub(crate) row_upper_bound: Option<usize>,
    pub(crate) col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            row_upper_bound: None,
            col_upper_bound: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell, widening the occupied bounds. Empty cells are dropped.
    pub(crate) fn push(&mut self, cell: Cell) -> Result<(), SheetError> {
        if cell.kind == CellType::Empty || cell.value.is_empty() {
            return Ok(());
        }
        self.check_span(cell.row, cell.col)?;
        self.row_upper_bound = Some(self.row_upper_bound.map_or(cell.row, |row| row.max(cell.row)));
        self.col_upper_bound = Some(self.col_upper_bound.map_or(cell.col, |col| col.max(cell.col)));
        self.cells.push(cell);
        Ok(())
    }

    /// Checks that a cell at (`row`, `col`) lies inside the worksheet and that
    /// the dense grid spanned with it stays within [`MAX_GRID_CELLS`].
    pub(crate) fn check_span(&self, row: usize, col: usize) -> Result<(), SheetError> {
        if row >= MAX_ROWS || col >= MAX_COLUMNS {
            Err(SpreadsheetError::CellOutOfRange(row, col))?
        }
        let rows = self.row_upper_bound.map_or(row, |upper| upper.max(row)) + 1;
        let cols = self.col_upper_bound.map_or(col, |upper| upper.max(col)) + 1;
        check_grid_size(&self.name, rows, cols)
    }

    /// Lays the cells out densely from A1 to the occupied bounds.
    ///
    /// Leading blank rows and columns are kept so row indexes match the
    /// row numbers a user sees in the spreadsheet application.
    pub(crate) fn into_grid(self) -> Result<RawGrid, SheetError> {
        let rows = self.row_upper_bound.map_or(0, |row| row + 1);
        let cols = self.col_upper_bound.map_or(0, |col| col + 1);
        check_grid_size(&self.name, rows, cols)?;
        let too_large = |_| SpreadsheetError::SheetTooLarge(self.name.to_owned(), rows, cols);
        let mut grid = Vec::<Vec<CellValue>>::new();
        grid.try_reserve_exact(rows).map_err(too_large)?;
        for _ in 0..rows {
            let mut row = Vec::new();
            row.try_reserve_exact(cols).map_err(too_large)?;
            row.resize(cols, CellValue::Empty);
            grid.push(row);
        }
        for cell in &self.cells {
            grid[cell.row][cell.col] = cell.to_value();
        }
        Ok(RawGrid::new(Path::new(&self.file_name), self.name, grid))
    }
}

fn check_grid_size(sheet_name: &str, rows: usize, cols: usize) -> Result<(), SheetError> {
    if rows.checked_mul(cols).map_or(true, |cells| cells > MAX_GRID_CELLS) {
        Err(SpreadsheetError::SheetTooLarge(sheet_name.to_owned(), rows, cols))?
    }
    Ok(())
}
