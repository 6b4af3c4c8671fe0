//! Error types for grid geometry.

use thiserror::Error;

/// Errors that can occur when constructing or validating grid geometry.
#[derive(Error, Debug)]
pub enum GridError {
    /// The region span is not a whole number of increments.
    #[error("region span {span} along {axis} is not a multiple of increment {inc}")]
    InconsistentDimensions {
        axis: &'static str,
        span: f64,
        inc: f64,
    },

    /// A grid increment was zero or negative.
    #[error("grid increment must be positive, got ({x_inc}, {y_inc})")]
    InvalidIncrement { x_inc: f64, y_inc: f64 },

    /// The region bounds are inverted or empty.
    #[error("invalid region: west {west} >= east {east} or south {south} >= north {north}")]
    InvalidRegion {
        west: f64,
        east: f64,
        south: f64,
        north: f64,
    },

    /// Data length does not match the header dimensions.
    #[error("data length {len} does not match {n_columns} x {n_rows} nodes")]
    DataLengthMismatch {
        len: usize,
        n_columns: usize,
        n_rows: usize,
    },
}

/// Result type for grid geometry operations.
pub type GridResult<T> = std::result::Result<T, GridError>;
