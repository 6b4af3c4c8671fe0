//! Grid-to-grid resampling, used by the highpass path to bring a lowpass
//! result computed on a coarse lattice back onto the input lattice before
//! subtraction.

use grid_common::{Grid, GridHeader};

/// Bilinearly resample `src` onto the `target` lattice.
///
/// Target nodes outside the source region are clamped to the source edge;
/// a NaN at any of the four surrounding source nodes makes the resampled
/// node NaN.
pub fn resample_to(src: &Grid, target: &GridHeader) -> Grid {
    let src_header = src.header();
    let (src_columns, src_rows) = (src_header.n_columns, src_header.n_rows);
    let mut out = Grid::create(target.clone());

    for row in 0..target.n_rows {
        let y = target.row_to_y(row as isize);
        let row_frac = (src_header.region.north - y) / src_header.inc.1
            - src_header.registration.offset();
        for col in 0..target.n_columns {
            let x = target.col_to_x(col as isize);
            let col_frac = (x - src_header.region.west) / src_header.inc.0
                - src_header.registration.offset();
            out.set(row, col, bilinear(src, src_columns, src_rows, col_frac, row_frac));
        }
    }
    out
}

fn bilinear(src: &Grid, n_columns: usize, n_rows: usize, x: f64, y: f64) -> f32 {
    let x = x.clamp(0.0, (n_columns - 1) as f64);
    let y = y.clamp(0.0, (n_rows - 1) as f64);

    let col0 = x.floor() as usize;
    let row0 = y.floor() as usize;
    let col1 = (col0 + 1).min(n_columns - 1);
    let row1 = (row0 + 1).min(n_rows - 1);

    let xf = (x - col0 as f64) as f32;
    let yf = (y - row0 as f64) as f32;

    let v00 = src.value(row0, col0);
    let v10 = src.value(row0, col1);
    let v01 = src.value(row1, col0);
    let v11 = src.value(row1, col1);

    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f32::NAN;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_common::{GridHeader, Region, Registration};

    fn header(region: Region, inc: f64) -> GridHeader {
        GridHeader::new(region, (inc, inc), Registration::Gridline).unwrap()
    }

    #[test]
    fn test_identity_resample() {
        let h = header(Region::new(0.0, 2.0, 0.0, 2.0), 1.0);
        let src = Grid::from_data(h.clone(), (1..=9).map(|v| v as f32).collect()).unwrap();
        let out = resample_to(&src, &h);
        assert_eq!(out.data(), src.data());
    }

    #[test]
    fn test_upsample_interpolates_midpoints() {
        let h = header(Region::new(0.0, 2.0, 0.0, 2.0), 1.0);
        let src = Grid::from_data(h, (1..=9).map(|v| v as f32).collect()).unwrap();
        let fine = header(Region::new(0.0, 2.0, 0.0, 2.0), 0.5);
        let out = resample_to(&src, &fine);
        assert_eq!(out.header().n_columns, 5);
        // Midpoint between nodes 4 and 5 (centre row of the source).
        assert!((out.value(2, 1) - 4.5).abs() < 1e-6);
        // Corners are preserved.
        assert_eq!(out.value(0, 0), src.value(0, 0));
        assert_eq!(out.value(4, 4), src.value(2, 2));
    }

    #[test]
    fn test_nan_propagates() {
        let h = header(Region::new(0.0, 1.0, 0.0, 1.0), 1.0);
        let src = Grid::from_data(h, vec![1.0, f32::NAN, 3.0, 4.0]).unwrap();
        let fine = header(Region::new(0.0, 1.0, 0.0, 1.0), 0.5);
        let out = resample_to(&src, &fine);
        assert!(out.value(1, 1).is_nan());
    }
}
