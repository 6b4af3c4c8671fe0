//! Order statistics and mode estimators for footprint samples.
//!
//! The median uses an iterative counting selection seeded with the
//! previous output node's estimate, which converges in very few passes on
//! smooth data. The mode estimators are a least-median-of-squares span
//! search and a fixed-width histogram peak, each with the same tie-break
//! policies. Weighted variants operate on (value, weight) observations
//! where the weight is the product of the filter weight and the cell-area
//! weight.

use crate::spec::TieBreak;

/// A sample value with its combined filter-and-area weight.
#[derive(Debug, Clone, Copy, Default)]
pub struct Observation {
    pub value: f64,
    pub weight: f64,
}

/// Relative tolerance for comparing accumulated weights.
fn nearly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs())
}

/// Median by iterative counting, bracketed by `bounds` and seeded with
/// `guess` (typically the previous node's median).
///
/// Each pass counts values above, below and equal to the guess and either
/// recognizes the median or interpolates a better guess; no sorting is
/// performed.
pub fn median_select(values: &[f64], bounds: (f64, f64), guess: f64) -> f64 {
    let n = values.len();
    match n {
        0 => return f64::NAN,
        1 => return values[0],
        2 => return 0.5 * (values[0] + values[1]),
        _ => {}
    }
    if n % 2 == 0 {
        // The counting search may stop on either of the two central values
        // depending on the seed; even counts take the exact sorted path so
        // the result never depends on the previous node's estimate.
        let mut sorted = values.to_vec();
        return sorted_quantile(&mut sorted, 0.5);
    }

    let (xmin, xmax) = bounds;
    let mut m_guess = guess.clamp(xmin, xmax);
    let mut lower_bound = xmin;
    let mut upper_bound = xmax;
    let mut t_0 = 0.0;
    let mut t_1 = (n - 1) as f64;
    let t_middle = 0.5 * t_1;

    // The interpolation below always tightens the bracket, but fall back
    // to sorting if the counts ever stop making progress.
    for _ in 0..64 {
        let mut n_above: i64 = 0;
        let mut n_below: i64 = 0;
        let mut n_equal: i64 = 0;
        let mut n_lub: i64 = 0;
        let mut n_glb: i64 = 0;
        let mut lub = xmax;
        let mut glb = xmin;

        for &xx in values {
            if xx == m_guess {
                n_equal += 1;
            } else if xx > m_guess {
                n_above += 1;
                if xx < lub {
                    lub = xx;
                    n_lub = 1;
                } else if xx == lub {
                    n_lub += 1;
                }
            } else {
                n_below += 1;
                if xx > glb {
                    glb = xx;
                    n_glb = 1;
                } else if xx == glb {
                    n_glb += 1;
                }
            }
        }

        if (n_above - n_below).abs() <= n_equal {
            return if n_equal > 0 {
                m_guess
            } else {
                0.5 * (lub + glb)
            };
        }
        if ((n_above - n_lub) - (n_below + n_equal)).abs() < n_lub {
            return lub;
        }
        if ((n_below - n_glb) - (n_above + n_equal)).abs() < n_glb {
            return glb;
        }

        if n_above > n_below + n_equal {
            // Guess is too low.
            lower_bound = m_guess;
            t_0 = (n_below + n_equal - 1) as f64;
            let temp = lower_bound + (upper_bound - lower_bound) * (t_middle - t_0) / (t_1 - t_0);
            m_guess = if temp > lub { temp } else { lub };
        } else if n_below > n_above + n_equal {
            // Guess is too high.
            upper_bound = m_guess;
            t_1 = (n_below + n_equal - 1) as f64;
            let temp = lower_bound + (upper_bound - lower_bound) * (t_middle - t_0) / (t_1 - t_0);
            m_guess = if temp < glb { temp } else { glb };
        } else {
            break;
        }
    }

    let mut sorted = values.to_vec();
    sorted_quantile(&mut sorted, 0.5)
}

/// Quantile by sorting; `q = 0` and `q = 1` return the exact minimum and
/// maximum, interior quantiles interpolate linearly between ranks.
pub fn sorted_quantile(values: &mut [f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sort_unstable_by(f64::total_cmp);
    let rank = q * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        values[lo]
    } else {
        let frac = rank - lo as f64;
        values[lo] * (1.0 - frac) + values[hi] * frac
    }
}

/// Least-median-of-squares mode: the midpoint of the narrowest sorted span
/// covering half the samples. Ties between equally narrow spans are
/// resolved by `tie_break`; the `Average` policy averages all tied
/// midpoints and counts the multiplicity into `n_multiples`.
pub fn lms_mode(values: &mut [f64], tie_break: TieBreak, n_multiples: &mut u64) -> f64 {
    let n = values.len();
    match n {
        0 => return f64::NAN,
        1 => return values[0],
        _ => {}
    }
    values.sort_unstable_by(f64::total_cmp);

    let j = n / 2;
    let istop = n - j;
    let mut multiplicity: u64 = 0;
    let mut mid_point_sum = 0.0;
    let mut short_length = f64::INFINITY;

    for i in 0..istop {
        let length = values[i + j] - values[i];
        let midpoint = 0.5 * (values[i + j] + values[i]);
        if length == short_length {
            match tie_break {
                TieBreak::Lowest => {
                    if midpoint < mid_point_sum {
                        mid_point_sum = midpoint;
                    }
                }
                TieBreak::Average => {
                    multiplicity += 1;
                    mid_point_sum += midpoint;
                }
                TieBreak::Highest => {
                    if midpoint > mid_point_sum {
                        mid_point_sum = midpoint;
                    }
                }
            }
        } else if length < short_length {
            multiplicity = 1;
            mid_point_sum = midpoint;
            short_length = length;
        }
    }

    if multiplicity > 1 {
        mid_point_sum /= multiplicity as f64;
        *n_multiples += multiplicity;
    }
    mid_point_sum
}

/// Which values an extremum search may consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignFilter {
    NegativeOnly,
    All,
    PositiveOnly,
}

/// Direction of an extremum search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extremum {
    Min,
    Max,
}

/// Running extremum with a sign filter; returns `default` when the sign
/// filter rejects every sample.
pub fn extreme(values: &[f64], default: f64, sign: SignFilter, which: Extremum) -> f64 {
    let mut selected = f64::NAN;
    let mut found = false;
    for &x in values {
        match sign {
            SignFilter::NegativeOnly if x > 0.0 => continue,
            SignFilter::PositiveOnly if x < 0.0 => continue,
            _ => {}
        }
        if !found {
            selected = x;
            found = true;
            continue;
        }
        match which {
            Extremum::Min if x < selected => selected = x,
            Extremum::Max if x > selected => selected = x,
            _ => {}
        }
    }
    if found {
        selected
    } else {
        default
    }
}

/// Weighted quantile: sort observations by value and walk the cumulative
/// weight until it reaches `quantile` of the total. Landing exactly on the
/// mark averages the bracketing values.
pub fn weighted_quantile(obs: &mut [Observation], quantile: f64) -> f64 {
    let n = obs.len();
    if n == 0 {
        return f64::NAN;
    }
    obs.sort_unstable_by(|a, b| a.value.total_cmp(&b.value));

    let total: f64 = obs.iter().map(|o| o.weight).sum();
    let target = total * quantile;

    let mut k = 0;
    let mut count = obs[0].weight;
    while count < target && k + 1 < n {
        k += 1;
        count += obs[k].weight;
    }
    if nearly_equal(count, target) && k + 1 < n {
        0.5 * (obs[k].value + obs[k + 1].value)
    } else {
        obs[k].value
    }
}

/// Weighted mode: the "shortest 50%", i.e. the pair of observations whose
/// values bracket half the total weight with the steepest cumulative-weight
/// slope.
pub fn weighted_mode(obs: &mut [Observation]) -> f64 {
    let n = obs.len();
    if n == 0 {
        return f64::NAN;
    }
    obs.sort_unstable_by(|a, b| a.value.total_cmp(&b.value));

    let half: f64 = 0.5 * obs.iter().map(|o| o.weight).sum::<f64>();

    // A single observation carrying half the weight is the mode outright.
    for o in obs.iter() {
        if o.weight >= half {
            return o.value;
        }
    }

    let mut top = 0.0;
    let mut p_max = 0.0;
    let mut mode = 0.5 * (obs[0].value + obs[n - 1].value);
    let mut i = 0;
    for j in 0..n {
        top += obs[j].weight;
        if top < half {
            continue;
        }
        while top > half && i < j {
            top -= obs[i].weight;
            i += 1;
        }
        let bottom = obs[j].value - obs[i].value;
        if bottom == 0.0 {
            // A spike of identical values is its own mode.
            return obs[i].value;
        }
        let p = top / bottom;
        if p > p_max {
            p_max = p;
            mode = 0.5 * (obs[i].value + obs[j].value);
        }
    }
    mode
}

/// Fixed-width histogram binning, aligned on bin edges or bin centers.
#[derive(Debug, Clone)]
pub struct BinSetup {
    width: f64,
    i_width: f64,
    /// Offset applied when assigning values to bins.
    i_offset: f64,
    /// Offset applied when mapping a bin back to its representative value.
    o_offset: f64,
    min_bin: i64,
    pub n_bins: usize,
}

impl BinSetup {
    /// Lay out bins of `width` covering `[z_min, z_max]`; `center` aligns
    /// bin centers (rather than edges) on multiples of the width.
    pub fn new(width: f64, center: bool, z_min: f64, z_max: f64) -> Self {
        let i_width = 1.0 / width;
        let i_offset = if center { 0.5 } else { 0.0 };
        let o_offset = if center { 0.0 } else { 0.5 };
        let min_bin = (z_min * i_width + i_offset).floor() as i64;
        let max_bin = (z_max * i_width + i_offset).ceil() as i64;
        Self {
            width,
            i_width,
            i_offset,
            o_offset,
            min_bin,
            n_bins: (max_bin - min_bin + 1) as usize,
        }
    }

    fn bin_of(&self, value: f64) -> usize {
        let bin = (value * self.i_width + self.i_offset).floor() as i64 - self.min_bin;
        bin.clamp(0, self.n_bins as i64 - 1) as usize
    }

    fn value_of(&self, bin: usize) -> f64 {
        ((bin as i64 + self.min_bin) as f64 + self.o_offset) * self.width
    }
}

/// Histogram mode: accumulate each observation's weight into its bin and
/// report the bin with the greatest mass; co-equal peaks are resolved by
/// `tie_break`. `counts` is caller-owned scratch, resized and cleared here.
pub fn histogram_mode(
    obs: &[Observation],
    setup: &BinSetup,
    counts: &mut Vec<f64>,
    tie_break: TieBreak,
    n_multiples: &mut u64,
) -> f64 {
    if obs.is_empty() {
        return f64::NAN;
    }
    counts.clear();
    counts.resize(setup.n_bins, 0.0);

    let mut mode_count = 0.0;
    for o in obs {
        let bin = setup.bin_of(o.value);
        counts[bin] += o.weight;
        if counts[bin] > mode_count {
            mode_count = counts[bin];
        }
    }

    let peaks: Vec<usize> = (0..setup.n_bins)
        .filter(|&b| nearly_equal(counts[b], mode_count))
        .collect();

    if peaks.len() > 1 {
        *n_multiples += peaks.len() as u64;
    }
    match tie_break {
        TieBreak::Lowest => setup.value_of(peaks[0]),
        TieBreak::Highest => setup.value_of(peaks[peaks.len() - 1]),
        TieBreak::Average => {
            let sum: f64 = peaks.iter().map(|&b| setup.value_of(b)).sum();
            sum / peaks.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_count_exact_middle() {
        let values = [5.0, 1.0, 9.0, 3.0, 7.0];
        let m = median_select(&values, (1.0, 9.0), 4.0);
        assert_eq!(m, 5.0);
    }

    #[test]
    fn test_median_even_count_averages() {
        let values = [4.0, 1.0, 3.0, 2.0];
        let m = median_select(&values, (1.0, 4.0), 2.0);
        assert_eq!(m, 2.5);
    }

    #[test]
    fn test_median_seed_does_not_change_result() {
        let values = [2.0, 8.0, 5.0, 1.0, 9.0, 4.0, 7.0];
        for guess in [0.0, 5.0, 100.0, -3.0] {
            assert_eq!(median_select(&values, (1.0, 9.0), guess), 5.0);
        }
    }

    #[test]
    fn test_quantile_boundaries() {
        let mut values = vec![3.0, 1.0, 4.0, 1.5, 9.0];
        assert_eq!(sorted_quantile(&mut values.clone(), 0.0), 1.0);
        assert_eq!(sorted_quantile(&mut values.clone(), 1.0), 9.0);
        assert_eq!(sorted_quantile(&mut values, 0.5), 3.0);
    }

    #[test]
    fn test_lms_mode_finds_cluster() {
        // Tight cluster at 2 with outliers: the narrowest half-span sits
        // inside the cluster.
        let mut values = vec![2.0, 2.1, 1.9, 2.0, 50.0, -40.0];
        let mut multiples = 0;
        let m = lms_mode(&mut values, TieBreak::Average, &mut multiples);
        assert!((m - 2.0).abs() < 0.11, "got {}", m);
    }

    #[test]
    fn test_lms_mode_single_value() {
        let mut values = vec![7.5];
        let mut multiples = 0;
        assert_eq!(lms_mode(&mut values, TieBreak::Average, &mut multiples), 7.5);
    }

    #[test]
    fn test_extreme_sign_filters() {
        let values = [-5.0, -1.0, 2.0, 8.0];
        assert_eq!(extreme(&values, f64::MAX, SignFilter::All, Extremum::Min), -5.0);
        assert_eq!(extreme(&values, -f64::MAX, SignFilter::All, Extremum::Max), 8.0);
        assert_eq!(
            extreme(&values, 0.0, SignFilter::PositiveOnly, Extremum::Min),
            2.0
        );
        assert_eq!(
            extreme(&values, 0.0, SignFilter::NegativeOnly, Extremum::Max),
            -1.0
        );
        // No positive values: fall back to the default.
        assert_eq!(
            extreme(&[-3.0, -2.0], 0.0, SignFilter::PositiveOnly, Extremum::Min),
            0.0
        );
    }

    #[test]
    fn test_weighted_quantile_equal_weights_is_median() {
        let mut obs: Vec<Observation> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .map(|&value| Observation { value, weight: 1.0 })
            .collect();
        assert_eq!(weighted_quantile(&mut obs, 0.5), 3.0);
        assert_eq!(weighted_quantile(&mut obs, 1.0), 5.0);
    }

    #[test]
    fn test_weighted_quantile_heavy_point_dominates() {
        let mut obs = vec![
            Observation { value: 1.0, weight: 10.0 },
            Observation { value: 5.0, weight: 0.1 },
            Observation { value: 9.0, weight: 0.1 },
        ];
        assert_eq!(weighted_quantile(&mut obs, 0.5), 1.0);
    }

    #[test]
    fn test_weighted_mode_dominant_weight() {
        let mut obs = vec![
            Observation { value: 4.0, weight: 6.0 },
            Observation { value: 1.0, weight: 1.0 },
            Observation { value: 9.0, weight: 1.0 },
        ];
        assert_eq!(weighted_mode(&mut obs), 4.0);
    }

    #[test]
    fn test_weighted_mode_spike() {
        let mut obs: Vec<Observation> = [3.0, 3.0, 3.0, 1.0, 8.0]
            .iter()
            .map(|&value| Observation { value, weight: 1.0 })
            .collect();
        assert_eq!(weighted_mode(&mut obs), 3.0);
    }

    #[test]
    fn test_histogram_mode_majority_bin() {
        let obs: Vec<Observation> = [1.0, 1.0, 1.0, 2.0, 2.0, 3.0]
            .iter()
            .map(|&value| Observation { value, weight: 1.0 })
            .collect();
        let setup = BinSetup::new(1.0, true, 1.0, 3.0);
        let mut counts = Vec::new();
        let mut multiples = 0;
        let m = histogram_mode(&obs, &setup, &mut counts, TieBreak::Average, &mut multiples);
        assert_eq!(m, 1.0);
        assert_eq!(multiples, 0);
    }

    #[test]
    fn test_histogram_mode_tie_break() {
        let obs: Vec<Observation> = [1.0, 1.0, 3.0, 3.0]
            .iter()
            .map(|&value| Observation { value, weight: 1.0 })
            .collect();
        let setup = BinSetup::new(1.0, true, 1.0, 3.0);
        let mut counts = Vec::new();

        let mut multiples = 0;
        let low = histogram_mode(&obs, &setup, &mut counts, TieBreak::Lowest, &mut multiples);
        assert_eq!(low, 1.0);

        let high = histogram_mode(&obs, &setup, &mut counts, TieBreak::Highest, &mut multiples);
        assert_eq!(high, 3.0);

        multiples = 0;
        let avg = histogram_mode(&obs, &setup, &mut counts, TieBreak::Average, &mut multiples);
        assert_eq!(avg, 2.0);
        assert_eq!(multiples, 2);
    }

    #[test]
    fn test_histogram_weighted_mass() {
        // One heavy sample at 5 outweighs three light ones at 1.
        let obs = vec![
            Observation { value: 5.0, weight: 10.0 },
            Observation { value: 1.0, weight: 1.0 },
            Observation { value: 1.1, weight: 1.0 },
            Observation { value: 0.9, weight: 1.0 },
        ];
        let setup = BinSetup::new(1.0, true, 0.9, 5.0);
        let mut counts = Vec::new();
        let mut multiples = 0;
        let m = histogram_mode(&obs, &setup, &mut counts, TieBreak::Average, &mut multiples);
        assert_eq!(m, 5.0);
    }
}
