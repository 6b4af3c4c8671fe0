//! Grid headers and the in-memory grid container.

use crate::error::{GridError, GridResult};
use crate::region::{Region, INC_SLOP};
use serde::{Deserialize, Serialize};

/// Node registration convention for a grid.
///
/// Gridline registration places nodes on the cell boundaries so the first
/// and last nodes sit exactly on the region edges. Pixel registration
/// places nodes at cell centers, half a cell inside the region edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Registration {
    /// Node sits on the cell boundary; edge nodes lie on the region limits.
    #[default]
    Gridline,
    /// Node sits at the cell center, half a cell inside the region limits.
    Pixel,
}

impl Registration {
    /// Half-cell offset of the first node from the region edge, in cells.
    pub fn offset(&self) -> f64 {
        match self {
            Registration::Gridline => 0.0,
            Registration::Pixel => 0.5,
        }
    }

    /// The opposite registration.
    pub fn toggled(&self) -> Self {
        match self {
            Registration::Gridline => Registration::Pixel,
            Registration::Pixel => Registration::Gridline,
        }
    }
}

/// Geometry of a regular grid: region, increments and registration.
///
/// Row 0 is the northernmost row; rows increase southward and columns
/// increase eastward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridHeader {
    pub region: Region,
    /// Cell increments (x, y) in region units.
    pub inc: (f64, f64),
    pub registration: Registration,
    /// Number of columns, derived from region, inc and registration.
    pub n_columns: usize,
    /// Number of rows, derived from region, inc and registration.
    pub n_rows: usize,
}

impl GridHeader {
    /// Build a header, validating that the region span is a whole number of
    /// increments for the chosen registration.
    pub fn new(region: Region, inc: (f64, f64), registration: Registration) -> GridResult<Self> {
        if inc.0 <= 0.0 || inc.1 <= 0.0 {
            return Err(GridError::InvalidIncrement {
                x_inc: inc.0,
                y_inc: inc.1,
            });
        }
        if region.west >= region.east || region.south >= region.north {
            return Err(GridError::InvalidRegion {
                west: region.west,
                east: region.east,
                south: region.south,
                north: region.north,
            });
        }

        let n_x = span_cells(region.width(), inc.0, "x")?;
        let n_y = span_cells(region.height(), inc.1, "y")?;

        // Gridline registration has one more node than cells per axis.
        let extra = match registration {
            Registration::Gridline => 1,
            Registration::Pixel => 0,
        };

        Ok(Self {
            region,
            inc,
            registration,
            n_columns: n_x + extra,
            n_rows: n_y + extra,
        })
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.n_columns * self.n_rows
    }

    /// X coordinate of a column (may be fractional or out of range).
    pub fn col_to_x(&self, col: isize) -> f64 {
        self.region.west + (col as f64 + self.registration.offset()) * self.inc.0
    }

    /// Y coordinate of a row; row 0 is the north edge.
    pub fn row_to_y(&self, row: isize) -> f64 {
        self.region.north - (row as f64 + self.registration.offset()) * self.inc.1
    }

    /// Nearest column for an x coordinate (may be out of range).
    pub fn x_to_col(&self, x: f64) -> isize {
        ((x - self.region.west) / self.inc.0 - self.registration.offset()).round() as isize
    }

    /// Nearest row for a y coordinate (may be out of range).
    pub fn y_to_row(&self, y: f64) -> isize {
        ((self.region.north - y) / self.inc.1 - self.registration.offset()).round() as isize
    }

    /// Flat row-major index of a node.
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.n_columns + col
    }

    /// Check that another header describes the identical lattice.
    pub fn same_lattice(&self, other: &GridHeader) -> bool {
        self.region == other.region
            && (self.inc.0 - other.inc.0).abs() < INC_SLOP * self.inc.0
            && (self.inc.1 - other.inc.1).abs() < INC_SLOP * self.inc.1
            && self.registration == other.registration
    }
}

/// Number of whole cells spanned, or an error if the span is not a
/// multiple of the increment to within [`INC_SLOP`].
fn span_cells(span: f64, inc: f64, axis: &'static str) -> GridResult<usize> {
    let cells = span / inc;
    if (cells - cells.round()).abs() > INC_SLOP {
        return Err(GridError::InconsistentDimensions { axis, span, inc });
    }
    Ok(cells.round() as usize)
}

/// A regular grid of f32 samples with its geometry header.
///
/// Data is stored row-major with row 0 at the north edge and no padding.
/// NaN marks missing samples.
#[derive(Debug, Clone)]
pub struct Grid {
    header: GridHeader,
    data: Vec<f32>,
}

impl Grid {
    /// Allocate a grid of the given geometry, filled with NaN.
    pub fn create(header: GridHeader) -> Self {
        let n = header.node_count();
        Self {
            header,
            data: vec![f32::NAN; n],
        }
    }

    /// Wrap existing data in a grid, checking the length against the header.
    pub fn from_data(header: GridHeader, data: Vec<f32>) -> GridResult<Self> {
        if data.len() != header.node_count() {
            return Err(GridError::DataLengthMismatch {
                len: data.len(),
                n_columns: header.n_columns,
                n_rows: header.n_rows,
            });
        }
        Ok(Self { header, data })
    }

    pub fn header(&self) -> &GridHeader {
        &self.header
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consume the grid, returning header and data.
    pub fn into_parts(self) -> (GridHeader, Vec<f32>) {
        (self.header, self.data)
    }

    /// Value at a node (bounds-checked).
    pub fn value(&self, row: usize, col: usize) -> f32 {
        assert!(row < self.header.n_rows && col < self.header.n_columns);
        self.data[self.header.index(row, col)]
    }

    /// Set a node value (bounds-checked).
    pub fn set(&mut self, row: usize, col: usize, v: f32) {
        assert!(row < self.header.n_rows && col < self.header.n_columns);
        let ij = self.header.index(row, col);
        self.data[ij] = v;
    }

    /// Minimum and maximum of the non-NaN samples, or None if all are NaN.
    pub fn z_min_max(&self) -> Option<(f64, f64)> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut seen = false;
        for &v in &self.data {
            if v.is_nan() {
                continue;
            }
            let v = v as f64;
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
            seen = true;
        }
        seen.then_some((min, max))
    }
}
