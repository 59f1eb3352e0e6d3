use serde::Deserialize;
use serde::Serialize;

/// Weights of the header-row signals.
///
/// Every signal yields a sub-score in `[0, 1]`; the confidence of a row is the
/// weighted sum, so weights that add up to `1.0` keep confidence in range.
/// Type contrast and density dominate because a header is, above all, a fully
/// populated row of labels over data. Position only breaks near-ties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    /// Text cells over non-text data in the same column
    pub type_contrast: f64,
    /// Filled cells relative to the sheet's modal row width
    pub density: f64,
    /// Distinct values among the row's filled cells
    pub uniqueness: f64,
    /// Agreement of per-column value classes in the two rows below
    pub stability: f64,
    /// Preference for rows near the top
    pub position: f64,
    /// Multiplier applied to rows without a single text cell
    pub no_label_penalty: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        SignalWeights {
            type_contrast: 0.35,
            density: 0.30,
            uniqueness: 0.15,
            stability: 0.12,
            position: 0.08,
            no_label_penalty: 0.5,
        }
    }
}

/// Tuning of [`HeaderDetector`](crate::HeaderDetector).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Rows considered as header candidates
    pub scan_depth: usize,
    /// Below this confidence the decision is reported as unknown
    pub confidence_floor: f64,
    /// Rows below a candidate inspected for type contrast
    pub lookahead_rows: usize,
    /// Maximum number of label rows stacked above a multi-level header
    pub max_header_levels: usize,
    /// Joins the labels of a multi-level header into one column name
    pub level_separator: String,
    pub weights: SignalWeights,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            scan_depth: 20,
            confidence_floor: 0.35,
            lookahead_rows: 5,
            max_header_levels: 3,
            level_separator: " > ".to_owned(),
            weights: SignalWeights::default(),
        }
    }
}
