//! Per-row evidence that a row is the header.

use crate::detector::config::SignalWeights;
use crate::grid::CellValue;
use crate::grid::RawGrid;
use crate::grid::ValueClass;
use std::collections::HashMap;
use std::collections::HashSet;

/// Label that reads like an identifier or account number rather than a column title.
const MAX_NUMERIC_LABEL_LEN: usize = 4;

/// Facts about the scanned window shared by every candidate row.
pub(crate) struct ScanWindow {
    /// Candidate rows are `0..depth`
    pub(crate) depth: usize,
    /// Configured scan depth, the scale of the position prior
    pub(crate) scan_depth: usize,
    pub(crate) lookahead: usize,
    /// Most common number of filled cells per row
    pub(crate) modal_width: usize,
}

impl ScanWindow {
    pub(crate) fn new(grid: &RawGrid, scan_depth: usize, lookahead: usize) -> ScanWindow {
        let scan_depth = scan_depth.max(1);
        let depth = scan_depth.min(grid.row_count());
        let end = (depth + lookahead).min(grid.row_count());
        ScanWindow {
            depth,
            scan_depth,
            lookahead,
            modal_width: modal_width(grid, end),
        }
    }
}

/// Mode of the filled-cell counts of non-empty rows in `0..end`; ties go to
/// the wider count. Falls back to the grid width when every row is empty.
fn modal_width(grid: &RawGrid, end: usize) -> usize {
    let mut frequencies = HashMap::<usize, usize>::new();
    for row in 0..end {
        let filled = grid.filled(row);
        if filled > 0 {
            *frequencies.entry(filled).or_default() += 1;
        }
    }
    frequencies
        .into_iter()
        .max_by_key(|(width, count)| (*count, *width))
        .map(|(width, _)| width)
        .unwrap_or(grid.column_count())
}

/// Sub-scores of one candidate row, each in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Signals {
    pub(crate) type_contrast: f64,
    pub(crate) density: f64,
    pub(crate) uniqueness: f64,
    pub(crate) stability: f64,
    pub(crate) position: f64,
    /// Whether the row holds at least one text cell
    pub(crate) has_label: bool,
}

impl Signals {
    pub(crate) fn measure(grid: &RawGrid, row: usize, window: &ScanWindow) -> Signals {
        let cells = grid.row(row);
        let filled = grid.filled(row);
        Signals {
            type_contrast: type_contrast(grid, row, window.lookahead),
            density: if window.modal_width == 0 {
                0.0
            } else {
                (filled as f64 / window.modal_width as f64).min(1.0)
            },
            uniqueness: uniqueness(cells, filled),
            stability: stability(grid, row),
            position: 1.0 - row as f64 / window.scan_depth as f64,
            has_label: cells.iter().any(CellValue::is_text),
        }
    }

    pub(crate) fn confidence(&self, weights: &SignalWeights) -> f64 {
        let score = weights.type_contrast * self.type_contrast
            + weights.density * self.density
            + weights.uniqueness * self.uniqueness
            + weights.stability * self.stability
            + weights.position * self.position;
        let score = if self.has_label {
            score
        } else {
            score * weights.no_label_penalty
        };
        score.clamp(0.0, 1.0)
    }
}

/// Average over the row's filled cells of how label-like each cell is
/// relative to the values beneath it. Non-text cells score zero.
fn type_contrast(grid: &RawGrid, row: usize, lookahead: usize) -> f64 {
    let filled = grid.filled(row);
    if filled == 0 {
        return 0.0;
    }
    let below = (row + 1)..(row + 1 + lookahead).min(grid.row_count());
    let total: f64 = grid
        .row(row)
        .iter()
        .enumerate()
        .filter_map(|(col, cell)| cell.as_text().filter(|_| cell.is_text()).map(|text| (col, text.trim())))
        .map(|(col, label)| {
            if label.len() > MAX_NUMERIC_LABEL_LEN && label.chars().all(|c| c.is_ascii_digit()) {
                return 0.0;
            }
            let values = below
                .clone()
                .map(|r| grid.cell(r, col))
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>();
            if values.is_empty() {
                0.25
            } else {
                let data = values.iter().filter(|cell| !cell.is_text()).count();
                0.5 + 0.5 * data as f64 / values.len() as f64
            }
        })
        .sum();
    total / filled as f64
}

fn uniqueness(cells: &[CellValue], filled: usize) -> f64 {
    if filled == 0 {
        return 0.0;
    }
    let distinct = cells
        .iter()
        .filter(|cell| !cell.is_empty())
        .map(|cell| cell.to_string().trim().to_owned())
        .collect::<HashSet<_>>()
        .len();
    distinct as f64 / filled as f64
}

/// Share of columns where the two rows below hold the same class of value.
fn stability(grid: &RawGrid, row: usize) -> f64 {
    let (first, second) = (row + 1, row + 2);
    let width = grid.row(first).len().max(grid.row(second).len());
    let mut union = 0usize;
    let mut matching = 0usize;
    for col in 0..width {
        let (upper, lower) = (grid.cell(first, col).class(), grid.cell(second, col).class());
        if upper == ValueClass::Empty && lower == ValueClass::Empty {
            continue;
        }
        union += 1;
        if upper == lower {
            matching += 1;
        }
    }
    if union == 0 {
        0.0
    } else {
        matching as f64 / union as f64
    }
}
