//! Heuristic header-row detection for messy sheets.
//!
//! Each of the first `scan_depth` rows is scored on how much it looks like a
//! row of labels sitting over uniform data. The best-scoring row wins; ties go
//! to the upper row. Low confidence is reported, never raised as an error.
pub(crate) mod config;
pub(crate) mod names;
pub(crate) mod signals;

use crate::detector::config::DetectorConfig;
use crate::detector::names::HeaderLayout;
use crate::detector::signals::ScanWindow;
use crate::detector::signals::Signals;
use crate::grid::RawGrid;
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

/// Number of runner-up rows kept on a decision.
const MAX_CANDIDATES: usize = 3;

#[derive(Error, Clone, Debug, PartialEq)]
pub enum DetectError {
    #[error("Grid of sheet '{0}' has no rows")]
    EmptyGrid(String),

    #[error("Header row {row} is outside the {row_count} rows of the grid")]
    RowOutOfRange { row: usize, row_count: usize },
}

/// How the header block of a sheet is laid out.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeaderShape {
    /// One row of labels
    Single,
    /// Spanning label rows stacked above the header row
    MultiLevel,
    /// Labels spanning several columns of the header row
    Merged,
    /// No row scored above the confidence floor
    Unknown,
}

/// A scored header candidate.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Candidate {
    pub row_index: usize,
    pub confidence: f64,
}

/// Outcome of header detection for one grid.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HeaderDecision {
    /// 0-based header row; data starts on the next row
    pub row_index: usize,
    pub confidence: f64,
    pub shape: HeaderShape,
    /// Unique, non-empty names, one per grid column
    pub column_names: Vec<String>,
    /// Best scored rows, most confident first
    pub candidates: Vec<Candidate>,
}

impl HeaderDecision {
    /// Whether the decision can be applied without asking the user.
    pub fn is_confident(&self, threshold: f64) -> bool {
        self.shape != HeaderShape::Unknown && self.confidence >= threshold
    }
}

/// Scores candidate rows and names the columns of the chosen one.
#[derive(Clone, Debug, Default)]
pub struct HeaderDetector {
    config: DetectorConfig,
}

impl HeaderDetector {
    pub fn new(config: DetectorConfig) -> Self {
        HeaderDetector { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Picks the most likely header row of `grid`.
    ///
    /// # Errors
    ///
    /// Fails only with [`DetectError::EmptyGrid`]; ambiguous sheets yield a
    /// decision with [`HeaderShape::Unknown`] and its low confidence.
    pub fn detect(&self, grid: &RawGrid) -> Result<HeaderDecision, DetectError> {
        if grid.is_empty() {
            Err(DetectError::EmptyGrid(grid.sheet_name().to_owned()))?
        }
        let window = ScanWindow::new(grid, self.config.scan_depth, self.config.lookahead_rows);

        let mut scored = Vec::<Candidate>::with_capacity(window.depth);
        for row in 0..window.depth {
            let signals = Signals::measure(grid, row, &window);
            let confidence = signals.confidence(&self.config.weights);
            tracing::trace!(row, confidence, ?signals, "header candidate");
            scored.push(Candidate {
                row_index: row,
                confidence,
            });
        }

        // Strictly greater wins, so ties resolve to the smallest row index.
        let best = scored.iter().fold(None::<Candidate>, |best, candidate| match best {
            Some(best) if candidate.confidence <= best.confidence => Some(best),
            _ => Some(*candidate),
        });
        scored.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
                .then(a.row_index.cmp(&b.row_index))
        });
        scored.truncate(MAX_CANDIDATES);

        let decision = match best {
            Some(best) if best.confidence >= self.config.confidence_floor => {
                let layout = self.layout(grid, best.row_index);
                HeaderDecision {
                    row_index: best.row_index,
                    confidence: best.confidence,
                    column_names: self.names(grid, best.row_index, &layout),
                    shape: layout.shape,
                    candidates: scored,
                }
            }
            best => {
                let layout = HeaderLayout {
                    shape: HeaderShape::Unknown,
                    levels: Vec::new(),
                };
                HeaderDecision {
                    row_index: 0,
                    confidence: best.map(|best| best.confidence).unwrap_or(0.0),
                    column_names: self.names(grid, 0, &layout),
                    shape: HeaderShape::Unknown,
                    candidates: scored,
                }
            }
        };
        tracing::debug!(
            sheet = grid.sheet_name(),
            row = decision.row_index,
            confidence = decision.confidence,
            shape = ?decision.shape,
            "header detected"
        );
        Ok(decision)
    }

    /// Applies a caller-chosen header row. The caller vouches for the row, so
    /// confidence is `1.0` and no candidates are reported.
    pub fn decide_at(&self, grid: &RawGrid, row: usize) -> Result<HeaderDecision, DetectError> {
        if grid.is_empty() {
            Err(DetectError::EmptyGrid(grid.sheet_name().to_owned()))?
        }
        if row >= grid.row_count() {
            Err(DetectError::RowOutOfRange {
                row,
                row_count: grid.row_count(),
            })?
        }
        let layout = self.layout(grid, row);
        Ok(HeaderDecision {
            row_index: row,
            confidence: 1.0,
            column_names: self.names(grid, row, &layout),
            shape: layout.shape,
            candidates: Vec::new(),
        })
    }

    fn layout(&self, grid: &RawGrid, row: usize) -> HeaderLayout {
        names::classify(grid, row, self.config.max_header_levels, self.config.lookahead_rows)
    }

    fn names(&self, grid: &RawGrid, row: usize, layout: &HeaderLayout) -> Vec<String> {
        names::column_names(grid, row, layout, &self.config.level_separator, self.config.lookahead_rows)
    }
}
