//! Distance models mapping grid-coordinate offsets into filter-width units.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers (IUGG authalic sphere).
pub const EARTH_RADIUS_KM: f64 = 6371.0087714;

/// Kilometers per degree of great-circle arc.
pub const KM_PER_DEGREE: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

/// How grid (x, y) offsets map into the distance units of the filter width.
///
/// The first two modes are Cartesian and allow the weight matrix to be
/// computed once for the whole run; the geographic modes with a
/// latitude-dependent x-scale force a recomputation per output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMode {
    /// Widths are given as an odd number of nodes; distances are Cartesian.
    Pixel,
    /// Grid units equal filter-width units; Cartesian distances.
    Cartesian,
    /// Grid in degrees, width in km, one fixed degrees-to-km scale on both axes.
    GeoCartesian,
    /// Flat-Earth distances with the x-scale fixed at the output mid-latitude.
    FlatEarth,
    /// Flat-Earth distances with the x-scale recomputed for every output row.
    FlatEarthPerRow,
    /// True great-circle distances in km.
    Spherical,
    /// Great-circle distances on a grid in spherical Mercator y-units.
    Mercator,
}

impl DistanceMode {
    /// Geographic modes need area weights, periodic wrap checks and
    /// degree-based scales.
    pub fn is_geographic(&self) -> bool {
        !matches!(self, DistanceMode::Pixel | DistanceMode::Cartesian)
    }

    /// Modes whose x-scale depends on the output latitude; these need the
    /// weight matrix rebuilt once per output row and the footprint width
    /// shrunk toward the poles.
    pub fn scale_varies_with_row(&self) -> bool {
        matches!(
            self,
            DistanceMode::FlatEarthPerRow | DistanceMode::Spherical | DistanceMode::Mercator
        )
    }
}

/// The distance function installed for a run, dispatched by `match` in the
/// weight-matrix builder rather than per-sample function pointers.
#[derive(Debug, Clone, Copy)]
pub enum DistanceModel {
    /// Plain Euclidean distance in grid units.
    Cartesian,
    /// Euclidean distance scaled by a single linear factor on both axes.
    CartesianScaled,
    /// Anisotropic Euclidean distance with separate x and y scales.
    FlatEarth,
    /// Great-circle distance in km with polar wrap-around.
    Spherical,
}

impl DistanceModel {
    /// Distance between two grid points in filter-width units.
    ///
    /// `x_scale`/`y_scale` are the per-axis scale factors; the spherical
    /// model ignores them and works in degrees directly.
    pub fn radius(&self, x0: f64, y0: f64, x1: f64, y1: f64, x_scale: f64, y_scale: f64) -> f64 {
        match self {
            DistanceModel::Cartesian => (x0 - x1).hypot(y0 - y1),
            DistanceModel::CartesianScaled => x_scale * (x0 - x1).hypot(y0 - y1),
            DistanceModel::FlatEarth => {
                (x_scale * (x0 - x1)).hypot(y_scale * (y0 - y1))
            }
            DistanceModel::Spherical => spherical_radius(x0, y0, x1, y1),
        }
    }
}

/// Great-circle distance in km with a polar wrap-around test on the second
/// point: a latitude beyond the pole is reflected across it so footprints
/// extend correctly over the pole.
pub fn spherical_radius(lon0: f64, lat0: f64, lon1: f64, lat1: f64) -> f64 {
    let (mut lon1, mut lat1) = (lon1, lat1);
    if lat1.abs() > 90.0 {
        lat1 = (180.0 - lat1.abs()).copysign(lat1);
        lon1 += 180.0;
    }
    great_circle_km(lon0, lat0, lon1, lat1)
}

/// Great-circle distance between two lon/lat points in km (haversine).
pub fn great_circle_km(lon0: f64, lat0: f64, lon1: f64, lat1: f64) -> f64 {
    let phi0 = lat0.to_radians();
    let phi1 = lat1.to_radians();
    let dphi = phi1 - phi0;
    let dlambda = (lon1 - lon0).to_radians();

    let a = (0.5 * dphi).sin().powi(2) + phi0.cos() * phi1.cos() * (0.5 * dlambda).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Latitude (degrees) for a spherical Mercator y-coordinate (inverse
/// Gudermannian).
pub fn img_to_lat(y: f64) -> f64 {
    2.0 * y.to_radians().exp().atan().to_degrees() - 90.0
}

/// Spherical Mercator y-coordinate for a latitude in degrees.
pub fn lat_to_img(lat: f64) -> f64 {
    (0.5 * (lat + 90.0)).to_radians().tan().ln().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        assert_eq!(spherical_radius(12.0, 34.0, 12.0, 34.0), 0.0);
        assert_eq!(
            DistanceModel::Cartesian.radius(1.0, 2.0, 1.0, 2.0, 1.0, 1.0),
            0.0
        );
    }

    #[test]
    fn test_spherical_symmetry() {
        let d1 = spherical_radius(10.0, 20.0, 30.0, 40.0);
        let d2 = spherical_radius(30.0, 40.0, 10.0, 20.0);
        assert!((d1 - d2).abs() < 1e-9, "{} vs {}", d1, d2);
    }

    #[test]
    fn test_one_degree_along_equator() {
        let d = great_circle_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - KM_PER_DEGREE).abs() < 1e-6, "got {}", d);
    }

    #[test]
    fn test_polar_wraparound() {
        // A point 2 degrees past the pole equals the reflected point.
        let over = spherical_radius(0.0, 88.0, 0.0, 92.0);
        let reflected = great_circle_km(0.0, 88.0, 180.0, 88.0);
        assert!((over - reflected).abs() < 1e-9, "{} vs {}", over, reflected);
    }

    #[test]
    fn test_flat_earth_anisotropy() {
        let d = DistanceModel::FlatEarth.radius(0.0, 0.0, 1.0, 1.0, 0.5, 1.0);
        assert!((d - (0.25f64 + 1.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_mercator_roundtrip() {
        for lat in [-75.0, -30.0, 0.0, 45.0, 80.0] {
            let y = lat_to_img(lat);
            assert!((img_to_lat(y) - lat).abs() < 1e-9, "lat {}", lat);
        }
        // The equator maps to y = 0.
        assert!(lat_to_img(0.0).abs() < 1e-12);
    }
}
