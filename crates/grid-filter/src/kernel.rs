//! Weight kernels and the footprint-sizing algorithm.
//!
//! A footprint is the window of input nodes considered for one output
//! node. Its half-widths follow from the physical filter width and the
//! distance model's per-axis scales; the weight matrix stores one weight
//! per footprint offset, with a negative sentinel marking offsets inside
//! the bounding rectangle but outside the circular footprint.

use crate::distance::{img_to_lat, DistanceMode, DistanceModel};

/// Sentinel stored in the weight matrix for offsets outside the circular
/// footprint.
pub const OUTSIDE: f64 = -1.0;

/// Scales only become degenerate through rounding, so anything this small
/// counts as zero.
const SCALE_EPS: f64 = 1e-8;

/// Scalar parameters consulted when computing weights and footprint sizes.
///
/// `x_scale` is updated per output row for the flat-Earth per-row mode;
/// everything else is fixed for the run.
#[derive(Debug, Clone)]
pub struct KernelParams {
    /// Full filter width in distance units.
    pub width: f64,
    /// Half the filter width; the exclusion radius for circular footprints.
    pub half_width: f64,
    /// Per-axis distance scales (grid units to width units).
    pub x_scale: f64,
    pub y_scale: f64,
}

impl KernelParams {
    pub fn new(width: f64, x_scale: f64, y_scale: f64) -> Self {
        Self {
            width,
            half_width: 0.5 * width,
            x_scale,
            y_scale,
        }
    }
}

/// The weight assigned to a sample at a given radius from the output node.
#[derive(Debug, Clone, Copy)]
pub enum WeightFn {
    /// Unit weight for every radius inside the footprint (boxcar, and all
    /// non-convolution filters).
    Unit,
    /// Cosine arch: `1 + cos(pi * r * inv_scale)`.
    CosineBell { inv_scale: f64 },
    /// Gaussian: `exp(r^2 * scale)` with a negative scale.
    Gaussian { scale: f64 },
}

impl WeightFn {
    /// Kernel for a convolution filter width; `rect` selects the
    /// normalized-offset calibration used by separable rectangular filters.
    pub fn cosine(width: f64, rect: bool) -> Self {
        WeightFn::CosineBell {
            inv_scale: if rect { 1.0 } else { 2.0 / width },
        }
    }

    /// Gaussian kernel calibrated so the nominal full width spans six sigma.
    pub fn gaussian(width: f64, rect: bool) -> Self {
        WeightFn::Gaussian {
            scale: if rect { -4.5 } else { -18.0 / (width * width) },
        }
    }

    pub fn eval(&self, r: f64) -> f64 {
        match self {
            WeightFn::Unit => 1.0,
            WeightFn::CosineBell { inv_scale } => {
                1.0 + (std::f64::consts::PI * r * inv_scale).cos()
            }
            WeightFn::Gaussian { scale } => (r * r * scale).exp(),
        }
    }
}

/// Footprint geometry plus the machinery to fill a weight matrix.
///
/// `x_half_width` may shrink per output row for the latitude-dependent
/// distance modes; `n_columns`/`n_rows` stay at their maximum so the
/// weight matrix stride never changes.
#[derive(Debug, Clone)]
pub struct Footprint {
    pub x_half_width: isize,
    pub y_half_width: isize,
    /// Maximum footprint dimensions; `n_columns` is the matrix stride.
    pub n_columns: usize,
    pub n_rows: usize,
    /// Input grid spacing in grid units.
    pub dx: f64,
    pub dy: f64,
    /// Input grid y-range, for skipping footprint rows that fall outside it.
    pub y_min: f64,
    pub y_max: f64,
    /// Rectangular (separable) filtering instead of a circular footprint.
    pub rect: bool,
    pub mode: DistanceMode,
    pub model: DistanceModel,
    /// Distances from the center node along each axis, indexed by |offset|.
    x_dist: Vec<f64>,
    y_dist: Vec<f64>,
}

impl Footprint {
    /// Size a footprint from the filter widths and per-axis scales.
    ///
    /// Half-widths are `ceil(width / (inc * scale) / 2)`, clamped so the
    /// footprint never exceeds the input grid; a degenerate scale falls
    /// back to covering the whole grid along that axis.
    #[allow(clippy::too_many_arguments)]
    pub fn sized(
        x_width: f64,
        y_width: f64,
        dx: f64,
        dy: f64,
        x_scale: f64,
        y_scale: f64,
        input_columns: usize,
        input_rows: usize,
        rect: bool,
        mode: DistanceMode,
        model: DistanceModel,
        y_min: f64,
        y_max: f64,
    ) -> Self {
        let (x_half_width, n_columns) =
            half_width_for_axis(x_width, dx, x_scale, input_columns, true);
        let (y_half_width, n_rows) = half_width_for_axis(y_width, dy, y_scale, input_rows, false);

        let mut fp = Self {
            x_half_width,
            y_half_width,
            n_columns,
            n_rows,
            dx,
            dy,
            y_min,
            y_max,
            rect,
            mode,
            model,
            x_dist: Vec::new(),
            y_dist: Vec::new(),
        };
        fp.fill_axis_distances();
        fp
    }

    /// A footprint whose dimensions are dictated by a custom weight grid.
    #[allow(clippy::too_many_arguments)]
    pub fn from_custom_dims(
        n_columns: usize,
        n_rows: usize,
        dx: f64,
        dy: f64,
        mode: DistanceMode,
        model: DistanceModel,
        y_min: f64,
        y_max: f64,
    ) -> Self {
        let mut fp = Self {
            x_half_width: ((n_columns - 1) / 2) as isize,
            y_half_width: ((n_rows - 1) / 2) as isize,
            n_columns,
            n_rows,
            dx,
            dy,
            y_min,
            y_max,
            rect: false,
            mode,
            model,
            x_dist: Vec::new(),
            y_dist: Vec::new(),
        };
        fp.fill_axis_distances();
        fp
    }

    fn fill_axis_distances(&mut self) {
        let max_x = (self.n_columns - 1) / 2;
        let max_y = (self.n_rows - 1) / 2;
        self.x_dist = (0..=max_x).map(|i| i as f64 * self.dx).collect();
        self.y_dist = (0..=max_y).map(|j| j as f64 * self.dy).collect();
    }

    /// Re-derive half-widths for a new width (variable-width filtering).
    /// The matrix stride is fixed by the maximum width, so the new
    /// half-widths are clamped to the existing dimensions.
    pub fn resize_for_width(&mut self, x_width: f64, y_width: f64, par: &KernelParams) {
        let max_x = ((self.n_columns - 1) / 2) as isize;
        let max_y = ((self.n_rows - 1) / 2) as isize;
        let x = (x_width / (self.dx * par.x_scale) / 2.0).ceil() as isize;
        let y = (y_width / (self.dy * par.y_scale) / 2.0).ceil() as isize;
        self.x_half_width = x.clamp(0, max_x);
        self.y_half_width = y.clamp(0, max_y);
    }

    /// Number of weight-matrix entries.
    pub fn weight_len(&self) -> usize {
        self.n_columns * self.n_rows
    }

    /// Flat index of footprint offset (j, i) into the weight matrix.
    pub fn weight_index(&self, j: isize, i: isize) -> usize {
        ((j + self.y_half_width) * self.n_columns as isize + i + self.x_half_width) as usize
    }

    /// Fill the weight matrix for an output node at latitude `output_y`.
    ///
    /// `x_off`/`y_off` remove the fixed fractional offset between the
    /// output node and the nearest input node when the two lattices do not
    /// coincide. Footprint rows outside the input y-range are filled with
    /// the exclusion sentinel without evaluating any distances.
    pub fn build_weights(
        &self,
        weight: &mut [f64],
        output_y: f64,
        par: &KernelParams,
        weight_fn: &WeightFn,
        x_off: f64,
        y_off: f64,
    ) {
        let y0 = output_y - y_off;
        let mut yc = y0;
        if self.mode == DistanceMode::Mercator {
            yc = img_to_lat(yc);
        }
        let (inv_x_half, inv_y_half) = if self.rect {
            (
                1.0 / self.x_half_width as f64,
                1.0 / self.y_half_width as f64,
            )
        } else {
            (0.0, 0.0)
        };

        for j in -self.y_half_width..=self.y_half_width {
            let mut y = y0
                + if j < 0 {
                    self.y_dist[(-j) as usize]
                } else {
                    -self.y_dist[j as usize]
                };
            if self.mode.scale_varies_with_row() && (y < self.y_min || y > self.y_max) {
                // Row is entirely outside the input grid.
                for i in -self.x_half_width..=self.x_half_width {
                    weight[self.weight_index(j, i)] = OUTSIDE;
                }
                continue;
            }
            if self.mode == DistanceMode::Mercator {
                y = img_to_lat(y);
            }
            let ry = if self.rect {
                inv_y_half * j as f64
            } else {
                0.0
            };
            for i in -self.x_half_width..=self.x_half_width {
                let x = if i < 0 {
                    -self.x_dist[(-i) as usize]
                } else {
                    self.x_dist[i as usize]
                };
                let ij = self.weight_index(j, i);
                if self.rect {
                    weight[ij] = weight_fn.eval(inv_x_half * i as f64) * weight_fn.eval(ry);
                } else {
                    let r = self
                        .model
                        .radius(x_off, yc, x, y, par.x_scale, par.y_scale);
                    weight[ij] = if r > par.half_width {
                        OUTSIDE
                    } else {
                        weight_fn.eval(r)
                    };
                }
            }
        }
    }
}

/// Half-width and node count for one axis, with the degenerate-scale and
/// grid-extent clamps. `extend_even` applies the extra +1 used on the x
/// axis when an even input width leaves the footprint one node short.
fn half_width_for_axis(
    width: f64,
    inc: f64,
    scale: f64,
    input_nodes: usize,
    extend_even: bool,
) -> (isize, usize) {
    if scale.abs() >= SCALE_EPS {
        let half = (width / (inc * scale) / 2.0).ceil();
        if half.is_finite() && half >= 0.0 && 2.0 * half + 1.0 <= input_nodes as f64 {
            let half = half as isize;
            return (half, (2 * half + 1) as usize);
        }
    }

    // Degenerate scale or a footprint wider than the grid: cover the whole
    // grid along this axis instead.
    let count = input_nodes as isize;
    let mut half = (count - 1) / 2;
    if extend_even && count - 2 * half - 1 > 0 {
        half += 1;
    }
    (half, (2 * half + 1) as usize)
}
