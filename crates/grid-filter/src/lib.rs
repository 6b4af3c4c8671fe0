//! Spatial grid filtering engine.
//!
//! Given a regularly sampled 2D grid, produce a new grid where every
//! output node is a local aggregate (weighted average, quantile, mode or
//! extremum) of the input nodes inside a geometrically defined footprint.
//! Footprint distances can be Cartesian, flat-Earth, great-circle
//! spherical or Mercator-projected, and work is partitioned over
//! contiguous row ranges across worker threads.

pub mod area;
pub mod distance;
pub mod effort;
pub mod engine;
pub mod error;
pub mod executor;
pub mod kernel;
pub mod resample;
pub mod spec;
pub mod stats;
mod worker;

pub use distance::DistanceMode;
pub use effort::EffortLevel;
pub use engine::{filter, filter_with_diagnostics, Diagnostics, OutputLattice};
pub use error::{FilterError, FilterResult};
pub use spec::{FilterKind, FilterSpec, NanPolicy, TieBreak};
