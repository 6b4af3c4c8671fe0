//! The filtering engine: validation, setup and orchestration.
//!
//! `filter` takes a fully decoded input grid, a filter spec and the
//! output lattice, validates the combination once, precomputes the
//! distance scales, area weights and (where possible) the weight matrix,
//! then hands contiguous row ranges to the executor. The optional
//! highpass step subtracts the lowpass result from the input, resampling
//! first when the two lattices differ.

use crate::area::build_area_weights;
use crate::distance::{img_to_lat, lat_to_img, DistanceMode, DistanceModel, KM_PER_DEGREE};
use crate::effort::EffortLevel;
use crate::error::{FilterError, FilterResult};
use crate::executor;
use crate::kernel::{Footprint, KernelParams};
use crate::resample::resample_to;
use crate::spec::{FilterKind, FilterSpec, NanPolicy};
use crate::stats::{BinSetup, Extremum, SignFilter};
use crate::worker::{weight_fn_for_kind, FilterContext, Reducer};
use grid_common::region::INC_SLOP;
use grid_common::{Grid, GridHeader, Region, Registration};
use tracing::{info, warn};

/// Geometry requested for the output grid; unset fields default to the
/// input grid's region, increments and registration.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputLattice {
    pub region: Option<Region>,
    pub inc: Option<(f64, f64)>,
    pub registration: Option<Registration>,
}

/// Aggregate diagnostics from a completed run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    /// Output nodes with no usable samples, set to NaN.
    pub n_nan: u64,
    /// Total multiplicity of tied modes seen by the mode filters.
    pub n_multiple_modes: u64,
}

/// Filter `input` onto the requested output lattice.
///
/// Returns the lowpass result, or the highpass result (input minus
/// lowpass) when `spec.highpass` is set. Diagnostics are logged; use
/// [`filter_with_diagnostics`] to receive them programmatically.
pub fn filter(
    input: &Grid,
    spec: &FilterSpec,
    mode: DistanceMode,
    output: &OutputLattice,
    n_threads: usize,
) -> FilterResult<Grid> {
    filter_with_diagnostics(input, spec, mode, output, n_threads).map(|(grid, _)| grid)
}

/// Like [`filter`] but also returns the NaN and multi-mode counters.
pub fn filter_with_diagnostics(
    input: &Grid,
    spec: &FilterSpec,
    mode: DistanceMode,
    output: &OutputLattice,
    n_threads: usize,
) -> FilterResult<(Grid, Diagnostics)> {
    let in_header = input.header();
    let custom = spec.kind.is_custom();
    let rect = spec.is_rectangular();

    // All configuration errors are raised here, before any work begins.
    if !(0.0..=1.0).contains(&spec.quantile) {
        return Err(FilterError::InvalidQuantile(spec.quantile));
    }
    if !custom && !(spec.width > 0.0) {
        return Err(FilterError::InvalidWidth(spec.width));
    }
    if rect && mode.is_geographic() {
        return Err(FilterError::RectangularRequiresCartesian);
    }
    if custom && mode.is_geographic() {
        return Err(FilterError::CustomRequiresCartesian);
    }
    if custom && spec.weights.is_none() {
        return Err(FilterError::MissingWeightGrid);
    }

    // Pixel mode gives widths as node counts; convert to Cartesian
    // distances up front.
    let mut mode = mode;
    let mut width = spec.width;
    let mut width2 = spec.width2.unwrap_or(spec.width);
    if rect && !(width2 > 0.0) {
        return Err(FilterError::InvalidWidth(width2));
    }
    if mode == DistanceMode::Pixel {
        if !custom {
            if !is_odd_count(width) {
                return Err(FilterError::PixelWidthNotOdd(width));
            }
            width *= in_header.inc.0;
            if rect {
                if !is_odd_count(spec.width2.unwrap_or(0.0)) {
                    return Err(FilterError::PixelWidthNotOdd(width2));
                }
                width2 *= in_header.inc.0;
            }
        }
        mode = DistanceMode::Cartesian;
    }

    let full_360 = mode.is_geographic() && in_header.region.is_global_in_x();

    // Resolve the output lattice and check it against the input domain.
    let out_region = output.region.unwrap_or(in_header.region);
    let out_inc = output.inc.unwrap_or(in_header.inc);
    let out_registration = output.registration.unwrap_or(in_header.registration);

    let x_slop = INC_SLOP * in_header.inc.0;
    let y_slop = INC_SLOP * in_header.inc.1;
    if !full_360
        && (out_region.west < in_header.region.west - x_slop
            || out_region.east > in_header.region.east + x_slop)
    {
        return Err(FilterError::DomainExceeded {
            axis: "x",
            requested_min: out_region.west,
            requested_max: out_region.east,
            available_min: in_header.region.west,
            available_max: in_header.region.east,
        });
    }
    if out_region.south < in_header.region.south - y_slop
        || out_region.north > in_header.region.north + y_slop
    {
        return Err(FilterError::DomainExceeded {
            axis: "y",
            requested_min: out_region.south,
            requested_max: out_region.north,
            available_min: in_header.region.south,
            available_max: in_header.region.north,
        });
    }
    let out_header = GridHeader::new(out_region, out_inc, out_registration)?;

    // One weight matrix can serve many nodes only when the output spacing
    // is an integer multiple of the input spacing.
    let fast_way =
        is_integer_ratio(out_inc.0 / in_header.inc.0) && is_integer_ratio(out_inc.1 / in_header.inc.1);
    let same_grid = out_header.same_lattice(in_header);
    if custom && !fast_way {
        return Err(FilterError::CustomRequiresMatchedSpacing);
    }

    if let Some(width_grid) = &spec.variable_width {
        if custom || rect {
            return Err(FilterError::VariableWidthConflict);
        }
        if !width_grid.header().same_lattice(&out_header) {
            return Err(FilterError::VariableWidthGridMismatch);
        }
    }

    let nan_policy = if spec.nan_policy == NanPolicy::Replace && !same_grid {
        warn!("replacing NaNs requires co-registered input/output grids; ignoring NaNs instead");
        NanPolicy::Ignore
    } else {
        spec.nan_policy
    };

    // Half-cell offset between input and output lattices of different
    // registrations (only relevant on the fast path; otherwise the
    // per-node shifts absorb it).
    let (x_fix, y_fix) = if fast_way && in_header.registration != out_header.registration {
        (0.5 * in_header.inc.0, 0.5 * in_header.inc.1)
    } else {
        (0.0, 0.0)
    };

    let spherical = mode.is_geographic();
    // Wrap-around count in pixel nodes, which skips the duplicate east
    // column of gridline-registered global grids.
    let nx_wrap = if spherical {
        (360.0 / in_header.inc.0).round() as isize
    } else {
        0
    };

    let area = build_area_weights(input, mode);

    // Distance scales and the distance model for this run. The sizing
    // y-scale and the kernel y-scale differ for Mercator grids, where
    // footprint rows are sized in Mercator units but the per-row footprint
    // shrink works in km per degree.
    let km = KM_PER_DEGREE;
    let (x_scale, y_scale_sizing, model) = match mode {
        DistanceMode::Pixel | DistanceMode::Cartesian => (1.0, 1.0, DistanceModel::Cartesian),
        DistanceMode::GeoCartesian => (km, km, DistanceModel::CartesianScaled),
        DistanceMode::FlatEarth => (
            km * out_region.mid_y().to_radians().cos(),
            km,
            DistanceModel::FlatEarth,
        ),
        DistanceMode::FlatEarthPerRow => (
            // Worst-case scale at the most extreme output latitude; the
            // workers re-derive the per-row value.
            km * out_region.max_abs_y().to_radians().cos(),
            km,
            DistanceModel::FlatEarth,
        ),
        DistanceMode::Spherical => (
            km * in_header.region.max_abs_y().to_radians().cos(),
            km,
            DistanceModel::Spherical,
        ),
        DistanceMode::Mercator => {
            // Compare the Mercator-y span of half the filter width at the
            // grid's most extreme latitude to derive one y-unit scale.
            let max_lat = img_to_lat(in_header.region.max_abs_y());
            let merc_range = lat_to_img(max_lat + 0.5 * width / km) - lat_to_img(max_lat);
            let scale = 0.5 * width / merc_range;
            (scale, scale, DistanceModel::Spherical)
        }
    };
    let kernel_y_scale = if mode == DistanceMode::Mercator {
        km
    } else {
        y_scale_sizing
    };
    let params = KernelParams::new(width, x_scale, kernel_y_scale);

    // Variable widths size the footprint for the widest node they contain.
    let (sizing_x, sizing_y) = match &spec.variable_width {
        Some(width_grid) => {
            let max_width = width_grid.z_min_max().map(|(_, max)| max).unwrap_or(width);
            (max_width.max(width), max_width.max(width))
        }
        None => (width, if rect { width2 } else { width }),
    };

    let footprint = if custom {
        let weight_grid = spec.weights.as_ref().ok_or(FilterError::MissingWeightGrid)?;
        let (n_columns, n_rows) = (
            weight_grid.header().n_columns,
            weight_grid.header().n_rows,
        );
        if n_columns % 2 == 0 || n_rows % 2 == 0 {
            return Err(FilterError::CustomWeightsNotOdd { n_columns, n_rows });
        }
        Footprint::from_custom_dims(
            n_columns,
            n_rows,
            in_header.inc.0,
            in_header.inc.1,
            mode,
            model,
            in_header.region.south,
            in_header.region.north,
        )
    } else {
        Footprint::sized(
            sizing_x,
            sizing_y,
            in_header.inc.0,
            in_header.inc.1,
            x_scale,
            y_scale_sizing,
            in_header.n_columns,
            in_header.n_rows,
            rect,
            mode,
            model,
            in_header.region.south,
            in_header.region.north,
        )
    };
    let visit_needed =
        spherical && 2 * footprint.x_half_width + 1 >= in_header.n_columns as isize;

    // The shared weight matrix: read from the custom grid, computed once,
    // or left for the workers to (re)build at their own cadence.
    let weight_fn = weight_fn_for_kind(spec.kind, width, rect);
    let mut base_weights = vec![0.0f64; footprint.weight_len()];
    let mut normalize = spec.kind != FilterKind::Operator;
    if custom {
        let weight_grid = spec.weights.as_ref().ok_or(FilterError::MissingWeightGrid)?;
        let mut weight_sum = 0.0;
        for (dst, &src) in base_weights.iter_mut().zip(weight_grid.data()) {
            *dst = src as f64;
            weight_sum += src as f64;
        }
        if normalize && weight_sum.abs() < 1e-8 {
            warn!("custom filter weights sum to zero; switching to operator mode");
            normalize = false;
        }
    }

    let effort = EffortLevel::select(spec, mode, fast_way);
    if effort == EffortLevel::Once {
        footprint.build_weights(&mut base_weights, 0.0, &params, &weight_fn, x_fix, y_fix);
    }

    // Geographic runs weight the order statistics by cell area.
    let geographic = mode.is_geographic();
    let reducer = match spec.kind {
        FilterKind::Boxcar | FilterKind::Cosine | FilterKind::Gaussian | FilterKind::Custom => {
            Reducer::Convolution { normalize }
        }
        FilterKind::Operator => Reducer::Convolution { normalize: false },
        FilterKind::Median => {
            if geographic {
                Reducer::QuantileWeighted
            } else {
                Reducer::Quantile
            }
        }
        FilterKind::Mode => {
            if geographic {
                Reducer::LmsModeWeighted
            } else {
                Reducer::LmsMode
            }
        }
        FilterKind::HistogramMode => {
            if geographic {
                Reducer::HistogramWeighted
            } else {
                Reducer::Histogram
            }
        }
        FilterKind::Min => Reducer::Extreme {
            sign: SignFilter::All,
            which: Extremum::Min,
            default: f64::MAX,
        },
        FilterKind::MinPos => Reducer::Extreme {
            sign: SignFilter::PositiveOnly,
            which: Extremum::Min,
            default: 0.0,
        },
        FilterKind::Max => Reducer::Extreme {
            sign: SignFilter::All,
            which: Extremum::Max,
            default: -f64::MAX,
        },
        FilterKind::MaxNeg => Reducer::Extreme {
            sign: SignFilter::NegativeOnly,
            which: Extremum::Max,
            default: 0.0,
        },
    };

    let z_bounds = input.z_min_max().unwrap_or((0.0, 0.0));
    let bin = if spec.kind == FilterKind::HistogramMode {
        let bin_width = spec.bin_width.ok_or(FilterError::MissingBinWidth)?;
        if !(bin_width > 0.0) {
            return Err(FilterError::InvalidBinWidth(bin_width));
        }
        Some(BinSetup::new(
            bin_width,
            spec.center_bins,
            z_bounds.0,
            z_bounds.1,
        ))
    } else {
        None
    };

    // Nearest input column and sub-cell shift for every output column.
    let mut col_origin = Vec::with_capacity(out_header.n_columns);
    let mut x_shift = Vec::new();
    for col_out in 0..out_header.n_columns {
        let x_out = out_header.col_to_x(col_out as isize);
        let origin = in_header.x_to_col(x_out);
        col_origin.push(origin);
        if !fast_way {
            x_shift.push(x_out - in_header.col_to_x(origin));
        }
    }

    info!(
        input_size = %format_args!("{}x{}", in_header.n_columns, in_header.n_rows),
        output_size = %format_args!("{}x{}", out_header.n_columns, out_header.n_rows),
        footprint = %format_args!("{}x{}", footprint.n_columns, footprint.n_rows),
        kind = ?spec.kind,
        effort = ?effort,
        n_threads,
        "filtering grid"
    );

    let mut out_grid = Grid::create(out_header.clone());
    let ctx = FilterContext {
        input,
        out_header: &out_header,
        area: &area,
        footprint: &footprint,
        params: &params,
        weight_fn,
        reducer,
        effort,
        mode,
        nan_policy,
        base_weights: &base_weights,
        col_origin: &col_origin,
        x_shift: &x_shift,
        fast_way,
        x_fix,
        y_fix,
        spherical,
        nx_wrap,
        visit_needed,
        quantile: spec.quantile,
        tie_break: spec.tie_break,
        bin,
        z_bounds,
        last_median_init: 0.5 * (z_bounds.0 + z_bounds.1),
        variable_width: spec.variable_width.as_ref(),
        kind: spec.kind,
        deg_scale: km,
    };
    let stats = executor::run(&ctx, out_grid.data_mut(), out_header.n_columns, n_threads);

    if stats.n_nan > 0 {
        warn!(
            n_nan = stats.n_nan,
            "unable to estimate a value at some nodes, set to NaN"
        );
    }
    if stats.n_multiple_modes > 0 {
        info!(
            n_multiple_modes = stats.n_multiple_modes,
            "tied modes found by the mode filter"
        );
    }

    let result = if spec.highpass {
        highpass(input, out_grid)
    } else {
        out_grid
    };

    Ok((
        result,
        Diagnostics {
            n_nan: stats.n_nan,
            n_multiple_modes: stats.n_multiple_modes,
        },
    ))
}

/// Subtract the lowpass result from the input, resampling the lowpass
/// grid back onto the input lattice when the two differ.
fn highpass(input: &Grid, lowpass: Grid) -> Grid {
    let in_header = input.header();
    if lowpass.header().same_lattice(in_header) {
        let mut out = lowpass;
        for (node, &original) in out.data_mut().iter_mut().zip(input.data()) {
            *node = original - *node;
        }
        out
    } else {
        info!("resampling the lowpass result onto the input lattice for highpass");
        let mut resampled = resample_to(&lowpass, in_header);
        for (node, &original) in resampled.data_mut().iter_mut().zip(input.data()) {
            *node = original - *node;
        }
        resampled
    }
}

/// Pixel-mode widths must be odd node counts so the footprint has a
/// well-defined center node.
fn is_odd_count(width: f64) -> bool {
    (width.rem_euclid(2.0) - 1.0).abs() < INC_SLOP
}

/// Whether a spacing ratio is a whole number to within the grid tolerance.
fn is_integer_ratio(ratio: f64) -> bool {
    (ratio - ratio.round()).abs() < INC_SLOP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_odd_count() {
        assert!(is_odd_count(3.0));
        assert!(is_odd_count(1.0));
        assert!(!is_odd_count(2.0));
        assert!(!is_odd_count(3.5));
    }

    #[test]
    fn test_is_integer_ratio() {
        assert!(is_integer_ratio(1.0));
        assert!(is_integer_ratio(3.00000001));
        assert!(!is_integer_ratio(2.5));
    }
}
