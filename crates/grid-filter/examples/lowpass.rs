//! Filter a synthetic bumpy surface and print a before/after summary.
//!
//! Run with: cargo run --example lowpass

use grid_common::{Grid, GridHeader, Region, Registration};
use grid_filter::{filter_with_diagnostics, DistanceMode, FilterKind, FilterSpec, OutputLattice};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // A 1x1 degree global grid with a smooth bump plus short-wavelength noise.
    let header = GridHeader::new(
        Region::new(0.0, 360.0, -90.0, 90.0),
        (1.0, 1.0),
        Registration::Pixel,
    )
    .expect("valid header");
    let mut grid = Grid::create(header);
    for row in 0..grid.header().n_rows {
        let lat = grid.header().row_to_y(row as isize);
        for col in 0..grid.header().n_columns {
            let lon = grid.header().col_to_x(col as isize);
            let bump = (lat.to_radians().cos() * lon.to_radians().sin()) as f32;
            let ripple = 0.2 * ((7.0 * lon).to_radians().sin() * (9.0 * lat).to_radians().cos()) as f32;
            grid.set(row, col, bump + ripple);
        }
    }

    let spec = FilterSpec::new(FilterKind::Gaussian, 600.0);
    let (smooth, diagnostics) = filter_with_diagnostics(
        &grid,
        &spec,
        DistanceMode::Spherical,
        &OutputLattice::default(),
        4,
    )
    .expect("filtering failed");

    let (z_min, z_max) = grid.z_min_max().expect("input has data");
    let (s_min, s_max) = smooth.z_min_max().expect("output has data");
    println!("input  range: [{z_min:.3}, {z_max:.3}]");
    println!("output range: [{s_min:.3}, {s_max:.3}]");
    println!("nodes without estimates: {}", diagnostics.n_nan);
}
