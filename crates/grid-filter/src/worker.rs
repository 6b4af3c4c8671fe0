//! Per-worker filtering of a contiguous range of output rows.
//!
//! Each worker owns a private weight matrix, visit-flag array and sample
//! scratch buffers; the input grid, area weights and filter spec are
//! shared read-only. Workers write only to their own slice of the output,
//! so the main loop needs no locking.

use crate::distance::{img_to_lat, DistanceMode};
use crate::effort::EffortLevel;
use crate::kernel::{Footprint, KernelParams, WeightFn};
use crate::spec::{FilterKind, NanPolicy, TieBreak};
use crate::stats::{self, BinSetup, Extremum, Observation, SignFilter};
use grid_common::{Grid, GridHeader};
use std::ops::Range;

/// How footprint samples are reduced to one output value.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Reducer {
    /// Running weighted sum; `normalize` divides by the weight sum
    /// (disabled for operator kernels, which may sum to zero).
    Convolution { normalize: bool },
    /// Collect raw values, report the requested quantile.
    Quantile,
    /// Collect weighted observations, report the weighted quantile.
    QuantileWeighted,
    /// Collect raw values, report the least-median-of-squares mode.
    LmsMode,
    /// Collect weighted observations, report the weighted shortest-50% mode.
    LmsModeWeighted,
    /// Collect unit-weight observations, report the histogram peak.
    Histogram,
    /// Collect weighted observations, report the weighted histogram peak.
    HistogramWeighted,
    /// Collect raw values, report a sign-filtered extremum.
    Extreme {
        sign: SignFilter,
        which: Extremum,
        default: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleKind {
    /// Accumulate the weighted sum in place.
    Accumulate,
    /// Collect plain values.
    Values,
    /// Collect (value, weight) observations.
    Observations,
}

impl Reducer {
    fn sample_kind(&self) -> SampleKind {
        match self {
            Reducer::Convolution { .. } => SampleKind::Accumulate,
            Reducer::Quantile | Reducer::LmsMode | Reducer::Extreme { .. } => SampleKind::Values,
            Reducer::QuantileWeighted
            | Reducer::LmsModeWeighted
            | Reducer::Histogram
            | Reducer::HistogramWeighted => SampleKind::Observations,
        }
    }

    fn normalize(&self) -> bool {
        !matches!(self, Reducer::Convolution { normalize: false })
    }
}

/// The weight function for a filter kind and width.
pub(crate) fn weight_fn_for_kind(kind: FilterKind, width: f64, rect: bool) -> WeightFn {
    match kind {
        FilterKind::Cosine => WeightFn::cosine(width, rect),
        FilterKind::Gaussian => WeightFn::gaussian(width, rect),
        _ => WeightFn::Unit,
    }
}

/// Everything a worker needs, shared read-only across all workers.
pub(crate) struct FilterContext<'a> {
    pub input: &'a Grid,
    pub out_header: &'a GridHeader,
    pub area: &'a Grid,
    pub footprint: &'a Footprint,
    pub params: &'a KernelParams,
    pub weight_fn: WeightFn,
    pub reducer: Reducer,
    pub effort: EffortLevel,
    pub mode: DistanceMode,
    pub nan_policy: NanPolicy,
    /// The shared weight matrix for `FromWeightGrid`/`Once` effort; sized
    /// but unfilled otherwise (workers rebuild into their own copy).
    pub base_weights: &'a [f64],
    /// Nearest input column for each output column.
    pub col_origin: &'a [isize],
    /// Sub-cell x offset per output column; empty when spacings are
    /// integer multiples.
    pub x_shift: &'a [f64],
    pub fast_way: bool,
    /// Fixed half-cell offsets between input and output lattices of
    /// different registrations.
    pub x_fix: f64,
    pub y_fix: f64,
    /// Fold footprint columns modulo `nx_wrap` (periodic geographic grid).
    pub spherical: bool,
    pub nx_wrap: isize,
    /// The footprint may span the full grid width, so duplicate column
    /// visits must be suppressed.
    pub visit_needed: bool,
    pub quantile: f64,
    pub tie_break: TieBreak,
    pub bin: Option<BinSetup>,
    /// Input data range, used to bracket the median search.
    pub z_bounds: (f64, f64),
    pub last_median_init: f64,
    /// Per-output-node widths; forces per-node kernel rebuilds.
    pub variable_width: Option<&'a Grid>,
    /// The filter kind, kept for rebuilding per-node weight functions.
    pub kind: FilterKind,
    /// Kilometers per degree, for per-row footprint shrinking.
    pub deg_scale: f64,
}

/// Diagnostic counters accumulated per worker and merged after the join.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WorkerStats {
    pub n_nan: u64,
    pub n_multiple_modes: u64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: WorkerStats) {
        self.n_nan += other.n_nan;
        self.n_multiple_modes += other.n_multiple_modes;
    }
}

/// Filter the output rows in `rows`, writing into `out` (the slice of the
/// output buffer covering exactly those rows).
pub(crate) fn filter_rows(ctx: &FilterContext, rows: Range<usize>, out: &mut [f32]) -> WorkerStats {
    let input = ctx.input;
    let in_header = input.header();
    let (in_rows, in_columns) = (in_header.n_rows as isize, in_header.n_columns as isize);
    let out_columns = ctx.out_header.n_columns;
    let area = ctx.area.data();
    let mut tally = WorkerStats::default();

    // Private scratch, reused for every node this worker handles.
    let mut footprint = ctx.footprint.clone();
    let mut params = ctx.params.clone();
    let mut weight_fn = ctx.weight_fn;
    let mut weights = ctx.base_weights.to_vec();
    let mut visit = vec![false; in_columns as usize];
    let max_samples = footprint.weight_len();
    let mut values: Vec<f64> = Vec::with_capacity(max_samples);
    let mut observations: Vec<Observation> = Vec::with_capacity(max_samples);
    let mut counts: Vec<f64> = Vec::new();
    let mut last_median = ctx.last_median_init;

    let sample_kind = ctx.reducer.sample_kind();
    let normalize = ctx.reducer.normalize();

    for row_out in rows.clone() {
        let y_out = ctx.out_header.row_to_y(row_out as isize);
        let lat_out = if ctx.mode == DistanceMode::Mercator {
            img_to_lat(y_out)
        } else {
            y_out
        };
        let row_origin = in_header.y_to_row(y_out);

        if ctx.mode == DistanceMode::FlatEarthPerRow {
            params.x_scale = ctx.deg_scale * lat_out.to_radians().cos();
        }

        let mut visit_needed = ctx.visit_needed;
        if ctx.mode.scale_varies_with_row() {
            // Fewer footprint columns are needed as the filter radius
            // spans more longitude toward the poles.
            let mut y = lat_out.abs();
            if ctx.mode == DistanceMode::Spherical {
                y += params.half_width / ctx.deg_scale;
            }
            let max_half = ((footprint.n_columns - 1) / 2) as isize;
            if y < 90.0 {
                let test_nx = (params.half_width
                    / (footprint.dx * ctx.deg_scale * y.to_radians().cos()))
                .round() as isize;
                footprint.x_half_width = max_half.min(test_nx);
            } else {
                footprint.x_half_width = max_half;
            }
            visit_needed = 2 * footprint.x_half_width + 1 >= in_columns;
        }

        if ctx.effort == EffortLevel::PerRow {
            footprint.build_weights(&mut weights, y_out, &params, &weight_fn, ctx.x_fix, ctx.y_fix);
        }
        let y_shift = if ctx.fast_way {
            0.0
        } else {
            y_out - in_header.row_to_y(row_origin)
        };

        for col_out in 0..out_columns {
            let out_index = (row_out - rows.start) * out_columns + col_out;

            if ctx.nan_policy == NanPolicy::Replace
                && input.value(row_out, col_out).is_nan()
            {
                // Output and input are co-registered; the filter loop is
                // bypassed entirely for this node.
                out[out_index] = f32::NAN;
                tally.n_nan += 1;
                continue;
            }

            if let Some(width_grid) = ctx.variable_width {
                let width = width_grid.value(row_out, col_out) as f64;
                if !(width > 0.0) {
                    out[out_index] = f32::NAN;
                    tally.n_nan += 1;
                    continue;
                }
                params = KernelParams::new(width, params.x_scale, params.y_scale);
                weight_fn = weight_fn_for_kind(ctx.kind, width, false);
                footprint.resize_for_width(width, width, &params);
                visit_needed = ctx.spherical && 2 * footprint.x_half_width + 1 >= in_columns;
            }

            if ctx.effort == EffortLevel::PerNode {
                let x_off = if ctx.fast_way {
                    ctx.x_fix
                } else {
                    ctx.x_shift[col_out]
                };
                let y_off = if ctx.fast_way { ctx.y_fix } else { y_shift };
                footprint.build_weights(&mut weights, y_out, &params, &weight_fn, x_off, y_off);
            }

            // Walk the footprint and collect the usable samples.
            let mut weighted_sum = 0.0f64;
            let mut weight_sum = 0.0f64;
            values.clear();
            observations.clear();
            let mut nan_abort = false;

            'footprint: for jj in -footprint.y_half_width..=footprint.y_half_width {
                let row_in = row_origin + jj;
                if row_in < 0 || row_in >= in_rows {
                    continue;
                }
                if visit_needed {
                    visit.fill(false);
                }
                for ii in -footprint.x_half_width..=footprint.x_half_width {
                    let mut col_in = ctx.col_origin[col_out] + ii;
                    if ctx.spherical {
                        // Left of west reappears in the east and vice versa.
                        if col_in < 0 {
                            col_in += ctx.nx_wrap;
                        } else if col_in >= ctx.nx_wrap {
                            col_in -= ctx.nx_wrap;
                        }
                    }
                    if col_in < 0 || col_in >= in_columns {
                        continue;
                    }
                    if visit_needed {
                        let col = col_in as usize;
                        if visit[col] {
                            continue;
                        }
                        visit[col] = true;
                    }
                    let w = weights[footprint.weight_index(jj, ii)];
                    if w <= 0.0 && normalize {
                        // Outside the circular footprint.
                        continue;
                    }

                    let ij_in = in_header.index(row_in as usize, col_in as usize);
                    let v = input.data()[ij_in] as f64;
                    if v.is_nan() {
                        if ctx.nan_policy == NanPolicy::Preserve {
                            nan_abort = true;
                            break 'footprint;
                        }
                        continue;
                    }

                    match sample_kind {
                        SampleKind::Accumulate => {
                            let wa = w * area[ij_in] as f64;
                            weighted_sum += v * wa;
                            if normalize {
                                weight_sum += wa;
                            }
                        }
                        SampleKind::Values => values.push(v),
                        SampleKind::Observations => {
                            let weight = match ctx.reducer {
                                Reducer::Histogram => 1.0,
                                _ => w * area[ij_in] as f64,
                            };
                            observations.push(Observation { value: v, weight });
                        }
                    }
                }
            }

            let estimate = if nan_abort {
                f64::NAN
            } else {
                match ctx.reducer {
                    Reducer::Convolution { normalize: true } => {
                        if weight_sum == 0.0 {
                            f64::NAN
                        } else {
                            weighted_sum / weight_sum
                        }
                    }
                    Reducer::Convolution { normalize: false } => weighted_sum,
                    Reducer::Quantile => {
                        if values.is_empty() {
                            f64::NAN
                        } else if ctx.quantile == 0.5 {
                            let m = stats::median_select(&values, ctx.z_bounds, last_median);
                            last_median = m;
                            m
                        } else {
                            stats::sorted_quantile(&mut values, ctx.quantile)
                        }
                    }
                    Reducer::QuantileWeighted => {
                        stats::weighted_quantile(&mut observations, ctx.quantile)
                    }
                    Reducer::LmsMode => {
                        stats::lms_mode(&mut values, ctx.tie_break, &mut tally.n_multiple_modes)
                    }
                    Reducer::LmsModeWeighted => stats::weighted_mode(&mut observations),
                    Reducer::Histogram | Reducer::HistogramWeighted => match &ctx.bin {
                        Some(bin) => stats::histogram_mode(
                            &observations,
                            bin,
                            &mut counts,
                            ctx.tie_break,
                            &mut tally.n_multiple_modes,
                        ),
                        None => f64::NAN,
                    },
                    Reducer::Extreme {
                        sign,
                        which,
                        default,
                    } => {
                        if values.is_empty() {
                            f64::NAN
                        } else {
                            stats::extreme(&values, default, sign, which)
                        }
                    }
                }
            };

            if estimate.is_nan() && !matches!(ctx.reducer, Reducer::Convolution { normalize: false })
            {
                tally.n_nan += 1;
            }
            out[out_index] = estimate as f32;
        }
    }
    tally
}
