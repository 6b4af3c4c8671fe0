//! Filter specifications: what to compute at each output node.

use grid_common::Grid;
use serde::{Deserialize, Serialize};

/// The reduction applied to the samples inside each footprint.
///
/// Convolution filters (`Boxcar`, `Cosine`, `Gaussian`, `Custom`,
/// `Operator`) compute a weighted average; the remaining kinds return a
/// representative value chosen by sorting or comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Simple average of all points inside the footprint.
    Boxcar,
    /// Weighted average with cosine-arch weights.
    Cosine,
    /// Weighted average with Gaussian weights (full width = six sigma).
    Gaussian,
    /// Weights read verbatim from a user-supplied grid.
    Custom,
    /// Like `Custom` but the weights may sum to zero (e.g. a derivative
    /// operator), so the result is not normalized by the weight sum.
    Operator,
    /// The requested quantile (median by default) of all points.
    Median,
    /// Least-median-of-squares mode estimate of all points.
    Mode,
    /// Mode found by binning points into a fixed-width histogram.
    HistogramMode,
    /// Minimum of all points.
    Min,
    /// Minimum of all positive points.
    MinPos,
    /// Maximum of all points.
    Max,
    /// Maximum of all negative points.
    MaxNeg,
}

impl FilterKind {
    /// Convolution filters accumulate a running weighted sum; all other
    /// kinds collect samples for sorting or comparisons.
    pub fn is_convolution(&self) -> bool {
        matches!(
            self,
            FilterKind::Boxcar
                | FilterKind::Cosine
                | FilterKind::Gaussian
                | FilterKind::Custom
                | FilterKind::Operator
        )
    }

    /// Filters whose weights come from a user-supplied grid.
    pub fn is_custom(&self) -> bool {
        matches!(self, FilterKind::Custom | FilterKind::Operator)
    }
}

/// How NaN samples in the input are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NanPolicy {
    /// Skip NaN samples; the node still gets a value unless all samples are NaN.
    #[default]
    Ignore,
    /// Output NaN wherever the co-registered input node is NaN
    /// (requires input and output grids on the same lattice).
    Replace,
    /// Output NaN if any NaN is found anywhere inside the footprint.
    Preserve,
}

/// Which of several tied modes to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    /// Report the lowest tied mode.
    Lowest,
    /// Report the average of all tied modes.
    #[default]
    Average,
    /// Report the highest tied mode.
    Highest,
}

/// Full description of one filtering run, shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub kind: FilterKind,
    /// Filter width (full width, not radius) in distance units.
    pub width: f64,
    /// Optional second width for rectangular filtering (x uses `width`,
    /// y uses `width2`). Only valid with Cartesian distances.
    pub width2: Option<f64>,
    /// Quantile for `Median` filtering.
    pub quantile: f64,
    /// Subtract the lowpass result from the input to get a highpass result.
    pub highpass: bool,
    /// Tie-break policy for `Mode` and `HistogramMode`.
    pub tie_break: TieBreak,
    /// Bin width for `HistogramMode`.
    pub bin_width: Option<f64>,
    /// Align histogram bins on bin centers rather than bin edges.
    pub center_bins: bool,
    pub nan_policy: NanPolicy,
    /// Weight grid for `Custom`/`Operator` filtering; must be odd in both
    /// dimensions.
    pub weights: Option<Grid>,
    /// Per-output-node filter widths; must be co-registered with the
    /// output grid. Forces per-node weight recomputation.
    pub variable_width: Option<Grid>,
}

impl FilterSpec {
    /// A spec with the given kind and width and default settings for
    /// everything else.
    pub fn new(kind: FilterKind, width: f64) -> Self {
        Self {
            kind,
            width,
            width2: None,
            quantile: 0.5,
            highpass: false,
            tie_break: TieBreak::default(),
            bin_width: None,
            center_bins: true,
            nan_policy: NanPolicy::default(),
            weights: None,
            variable_width: None,
        }
    }

    /// Whether this run filters with a rectangular (two-width) footprint.
    pub fn is_rectangular(&self) -> bool {
        self.width2.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(FilterKind::Boxcar.is_convolution());
        assert!(FilterKind::Operator.is_convolution());
        assert!(!FilterKind::Median.is_convolution());
        assert!(FilterKind::Custom.is_custom());
        assert!(!FilterKind::Gaussian.is_custom());
    }

    #[test]
    fn test_spec_defaults() {
        let spec = FilterSpec::new(FilterKind::Median, 100.0);
        assert_eq!(spec.quantile, 0.5);
        assert_eq!(spec.nan_policy, NanPolicy::Ignore);
        assert!(!spec.highpass);
        assert!(!spec.is_rectangular());
    }

    #[test]
    fn test_enum_serde_roundtrip() {
        let json = serde_json::to_string(&FilterKind::HistogramMode).unwrap();
        let back: FilterKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FilterKind::HistogramMode);

        let json = serde_json::to_string(&NanPolicy::Preserve).unwrap();
        assert_eq!(json, "\"preserve\"");
    }
}
