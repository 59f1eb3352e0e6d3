//! Header shape classification and column-name synthesis.

use crate::detector::HeaderShape;
use crate::grid::RawGrid;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::collections::HashSet;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Layout of the header block ending at the header row.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct HeaderLayout {
    pub(crate) shape: HeaderShape,
    /// Label rows above the header row, top first
    pub(crate) levels: Vec<usize>,
}

/// Classifies the header block whose last row is `header_row`.
///
/// Rows directly above the header that hold only text, at least two labels,
/// and a blank over a non-empty header cell to the right of a label are
/// spanning labels of a multi-level header. Without such rows, a label
/// followed by blanks over data marks a merged header.
pub(crate) fn classify(grid: &RawGrid, header_row: usize, max_levels: usize, lookahead: usize) -> HeaderLayout {
    let mut levels = Vec::new();
    let mut row = header_row;
    while row > 0 && levels.len() < max_levels && is_spanning_row(grid, row - 1, header_row) {
        row -= 1;
        levels.push(row);
    }
    levels.reverse();

    let shape = if !levels.is_empty() {
        HeaderShape::MultiLevel
    } else if has_merged_span(grid, header_row, lookahead) {
        HeaderShape::Merged
    } else {
        HeaderShape::Single
    };
    HeaderLayout { shape, levels }
}

fn is_spanning_row(grid: &RawGrid, row: usize, header_row: usize) -> bool {
    let cells = grid.row(row);
    let labels = cells.iter().filter(|cell| cell.is_text()).count();
    if labels < 2 || cells.iter().any(|cell| !cell.is_empty() && !cell.is_text()) {
        return false;
    }
    let mut seen_label = false;
    (0..grid.column_count()).any(|col| {
        let cell = grid.cell(row, col);
        if cell.is_text() {
            seen_label = true;
            false
        } else {
            seen_label && !grid.cell(header_row, col).is_empty()
        }
    })
}

fn has_merged_span(grid: &RawGrid, header_row: usize, lookahead: usize) -> bool {
    let mut seen_label = false;
    (0..grid.column_count()).any(|col| {
        if !grid.cell(header_row, col).is_empty() {
            seen_label = true;
            false
        } else {
            seen_label && has_data_below(grid, header_row, col, lookahead)
        }
    })
}

fn has_data_below(grid: &RawGrid, row: usize, col: usize, lookahead: usize) -> bool {
    ((row + 1)..(row + 1 + lookahead.max(1)).min(grid.row_count())).any(|r| !grid.cell(r, col).is_empty())
}

/// Builds one name per grid column for the given layout.
pub(crate) fn column_names(grid: &RawGrid, header_row: usize, layout: &HeaderLayout, separator: &str, lookahead: usize) -> Vec<String> {
    let width = grid.column_count();
    let header = (0..width).map(|col| label(grid, header_row, col)).collect::<Vec<_>>();
    let spans = |col: usize| header[col].is_some() || has_data_below(grid, header_row, col, lookahead);

    let names = match layout.shape {
        HeaderShape::MultiLevel => {
            let mut resolved = Vec::<Vec<Option<String>>>::with_capacity(layout.levels.len());
            for (depth, &level) in layout.levels.iter().enumerate() {
                let upper_levels = &layout.levels[..depth];
                let mut carried = None::<String>;
                let row = (0..width)
                    .map(|col| {
                        if let Some(text) = label(grid, level, col) {
                            carried = Some(text);
                        } else if upper_levels.iter().any(|&upper| label(grid, upper, col).is_some()) {
                            carried = None;
                        }
                        carried.clone().filter(|_| spans(col))
                    })
                    .collect();
                resolved.push(row);
            }
            (0..width)
                .map(|col| {
                    let parts = resolved
                        .iter()
                        .filter_map(|level| level[col].clone())
                        .chain(header[col].clone())
                        .collect::<Vec<_>>();
                    (!parts.is_empty()).then(|| parts.join(separator))
                })
                .collect::<Vec<_>>()
        }
        HeaderShape::Merged => {
            let mut carried = None::<String>;
            (0..width)
                .map(|col| match &header[col] {
                    Some(text) => {
                        carried = Some(text.to_owned());
                        carried.clone()
                    }
                    None if spans(col) => carried.clone(),
                    None => {
                        carried = None;
                        None
                    }
                })
                .collect()
        }
        HeaderShape::Single | HeaderShape::Unknown => header.clone(),
    };

    deduplicate(
        names
            .into_iter()
            .enumerate()
            .map(|(index, name)| name.unwrap_or_else(|| format!("column{}", index + 1)))
            .collect(),
    )
}

fn label(grid: &RawGrid, row: usize, col: usize) -> Option<String> {
    let cell = grid.cell(row, col);
    (!cell.is_empty()).then(|| normalize(&cell.to_string()))
}

/// Trims and collapses internal whitespace.
pub(crate) fn normalize(label: &str) -> String {
    WHITESPACE.replace_all(label.trim(), " ").into_owned()
}

/// Suffixes repeated names with `_2`, `_3`, ... in order of appearance.
pub(crate) fn deduplicate(names: Vec<String>) -> Vec<String> {
    let mut taken = HashSet::<String>::with_capacity(names.len());
    // next suffix to try per repeated name; only ever moves forward
    let mut next_suffix = HashMap::<String, usize>::new();
    names
        .into_iter()
        .map(|name| {
            if taken.insert(name.clone()) {
                return name;
            }
            let suffix = next_suffix.entry(name.clone()).or_insert(2);
            loop {
                let candidate = format!("{name}_{suffix}");
                *suffix += 1;
                if taken.insert(candidate.clone()) {
                    return candidate;
                }
            }
        })
        .collect()
}
