//! Error types for the filtering engine.

use grid_common::GridError;
use thiserror::Error;

/// Errors detected while validating a filter configuration.
///
/// All of these are raised at setup time, before any filtering work
/// begins; the aggregation loop itself never fails (under-determined
/// nodes become NaN and are counted instead).
#[derive(Error, Debug)]
pub enum FilterError {
    /// Filter width must be a positive distance.
    #[error("filter width must be positive, got {0}")]
    InvalidWidth(f64),

    /// Quantile outside the closed unit interval.
    #[error("quantile must be in the 0-1 range, got {0}")]
    InvalidQuantile(f64),

    /// Rectangular (two-width) filtering only makes sense for Cartesian distances.
    #[error("rectangular filtering requires pixel or Cartesian distances")]
    RectangularRequiresCartesian,

    /// Custom and operator weight grids only make sense for Cartesian distances.
    #[error("custom and operator filter weights require pixel or Cartesian distances")]
    CustomRequiresCartesian,

    /// A custom weight grid must have a well-defined center node.
    #[error("custom weight grid must have odd dimensions, got {n_columns} x {n_rows}")]
    CustomWeightsNotOdd { n_columns: usize, n_rows: usize },

    /// Custom weights are applied node-for-node and need matching lattices.
    #[error("custom and operator filters require output spacing to be a multiple of input spacing")]
    CustomRequiresMatchedSpacing,

    /// Pixel-distance widths count nodes and must be odd so the footprint is centered.
    #[error("pixel-distance filter width must be an odd number of nodes, got {0}")]
    PixelWidthNotOdd(f64),

    /// The requested output region sticks out of the input grid.
    #[error("output {axis} range [{requested_min}, {requested_max}] exceeds input range [{available_min}, {available_max}]")]
    DomainExceeded {
        axis: &'static str,
        requested_min: f64,
        requested_max: f64,
        available_min: f64,
        available_max: f64,
    },

    /// The variable-width grid must be co-registered with the output grid.
    #[error("variable-width grid does not match the output grid lattice")]
    VariableWidthGridMismatch,

    /// Variable widths cannot be combined with custom weights or rectangular footprints.
    #[error("variable-width filtering cannot be combined with custom weights or rectangular footprints")]
    VariableWidthConflict,

    /// Custom and operator filters are meaningless without a weight grid.
    #[error("custom and operator filters require a weight grid")]
    MissingWeightGrid,

    /// Histogram-mode filtering needs a positive bin width.
    #[error("histogram mode requires a positive bin width, got {0}")]
    InvalidBinWidth(f64),

    /// Histogram-mode filtering without a configured bin width.
    #[error("histogram mode requires a bin width")]
    MissingBinWidth,

    /// Invalid grid geometry.
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Result type for engine operations.
pub type FilterResult<T> = std::result::Result<T, FilterError>;
