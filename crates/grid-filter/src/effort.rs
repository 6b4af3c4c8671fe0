//! Effort levels: how often the weight matrix must be recomputed.

use crate::distance::DistanceMode;
use crate::spec::FilterSpec;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Weight-recomputation cadence for a run, chosen once from static inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    /// Weights come verbatim from a user-supplied grid; never recomputed.
    FromWeightGrid,
    /// One weight matrix serves the whole run.
    Once,
    /// The weight matrix is rebuilt at the start of each output row.
    PerRow,
    /// The weight matrix is rebuilt for every output node.
    PerNode,
}

impl EffortLevel {
    /// Select the effort level for a run.
    ///
    /// `fast_way` is true when the output grid spacing is an exact integer
    /// multiple of the input spacing, which lets one weight matrix serve
    /// many output nodes.
    pub fn select(spec: &FilterSpec, mode: DistanceMode, fast_way: bool) -> Self {
        let level = if spec.kind.is_custom() {
            EffortLevel::FromWeightGrid
        } else if spec.variable_width.is_some() || !fast_way {
            EffortLevel::PerNode
        } else if mode.scale_varies_with_row() {
            EffortLevel::PerRow
        } else {
            EffortLevel::Once
        };
        if level == EffortLevel::PerNode {
            warn!(
                "filter weights must be recomputed for every output node; \
                 expect this run to be slow"
            );
        }
        level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FilterKind;
    use grid_common::{Grid, GridHeader, Region, Registration};

    fn spec(kind: FilterKind) -> FilterSpec {
        FilterSpec::new(kind, 100.0)
    }

    #[test]
    fn test_custom_weights_never_recompute() {
        assert_eq!(
            EffortLevel::select(&spec(FilterKind::Custom), DistanceMode::Cartesian, true),
            EffortLevel::FromWeightGrid
        );
        assert_eq!(
            EffortLevel::select(&spec(FilterKind::Operator), DistanceMode::Cartesian, true),
            EffortLevel::FromWeightGrid
        );
    }

    #[test]
    fn test_row_independent_scales_compute_once() {
        for mode in [
            DistanceMode::Cartesian,
            DistanceMode::GeoCartesian,
            DistanceMode::FlatEarth,
        ] {
            assert_eq!(
                EffortLevel::select(&spec(FilterKind::Boxcar), mode, true),
                EffortLevel::Once
            );
        }
    }

    #[test]
    fn test_latitude_dependent_scales_compute_per_row() {
        for mode in [
            DistanceMode::FlatEarthPerRow,
            DistanceMode::Spherical,
            DistanceMode::Mercator,
        ] {
            assert_eq!(
                EffortLevel::select(&spec(FilterKind::Boxcar), mode, true),
                EffortLevel::PerRow
            );
        }
    }

    #[test]
    fn test_mismatched_spacing_computes_per_node() {
        assert_eq!(
            EffortLevel::select(&spec(FilterKind::Boxcar), DistanceMode::Cartesian, false),
            EffortLevel::PerNode
        );
    }

    #[test]
    fn test_variable_width_computes_per_node() {
        let mut s = spec(FilterKind::Gaussian);
        let header = GridHeader::new(
            Region::new(0.0, 4.0, 0.0, 4.0),
            (1.0, 1.0),
            Registration::Gridline,
        )
        .unwrap();
        s.variable_width = Some(Grid::create(header));
        assert_eq!(
            EffortLevel::select(&s, DistanceMode::Cartesian, true),
            EffortLevel::PerNode
        );
    }
}
