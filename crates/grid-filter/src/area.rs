//! Per-node cell-area weights.
//!
//! Geographic cells shrink toward the poles and Mercator rows have
//! irregular latitude spacing, so samples must be weighted by the true
//! area of their cell. Gridline-registered grids additionally share edge
//! and corner cells between boundary nodes.

use crate::distance::{img_to_lat, DistanceMode};
use grid_common::{Grid, Registration};

/// Latitudes this close to +/-90 are treated as the pole.
const POLE_EPS: f64 = 1e-8;

/// Precompute the area weight of every input node.
///
/// The result is a grid on the same lattice as `input`, built once before
/// the main loop and shared read-only by all workers.
pub fn build_area_weights(input: &Grid, mode: DistanceMode) -> Grid {
    let header = input.header().clone();
    let gridline = header.registration == Registration::Gridline;
    let (n_rows, n_columns) = (header.n_rows, header.n_columns);
    let geographic = mode.is_geographic();

    // Longitude increment in radians for geographic grids, else plain dx.
    let dx = if geographic {
        header.inc.0.to_radians()
    } else {
        header.inc.0
    };
    // sin(dy/2), the half-cell latitude factor.
    let s2 = (0.5 * header.inc.1).to_radians().sin();
    let dy_half = 0.5 * header.inc.1;

    let mut area = Grid::create(header.clone());
    for row in 0..n_rows {
        let row_weight = if mode == DistanceMode::Mercator {
            // Mercator rows have irregular latitude spacing; integrate the
            // cell from its south to north edge. These grids never reach a pole.
            let y = header.row_to_y(row as isize);
            let lat_s = img_to_lat(y - dy_half);
            let lat_n = img_to_lat(y + dy_half);
            lat_n.to_radians().sin() - lat_s.to_radians().sin()
        } else if geographic {
            let lat = header.row_to_y(row as isize);
            if (lat.abs() - 90.0).abs() < POLE_EPS {
                // Polar cap.
                1.0 - dy_half.to_radians().cos()
            } else {
                2.0 * lat.to_radians().cos() * s2
            }
        } else {
            // Cartesian rows are constant except that gridline-registered
            // boundary rows own only half a cell.
            let share = if gridline && (row == 0 || row == n_rows - 1) {
                0.5
            } else {
                1.0
            };
            share * header.inc.1
        };

        for col in 0..n_columns {
            let share = if gridline && (col == 0 || col == n_columns - 1) {
                0.5
            } else {
                1.0
            };
            area.set(row, col, (row_weight * dx * share) as f32);
        }
    }
    area
}
