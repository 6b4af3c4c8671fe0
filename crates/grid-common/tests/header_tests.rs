//! Comprehensive tests for grid header geometry.

use grid_common::{Grid, GridError, GridHeader, Region, Registration};

// ============================================================================
// Dimension derivation
// ============================================================================

#[test]
fn test_global_one_degree_gridline() {
    let h = GridHeader::new(
        Region::new(0.0, 360.0, -90.0, 90.0),
        (1.0, 1.0),
        Registration::Gridline,
    )
    .unwrap();
    assert_eq!(h.n_columns, 361);
    assert_eq!(h.n_rows, 181);
    assert_eq!(h.node_count(), 361 * 181);
}

#[test]
fn test_global_one_degree_pixel() {
    let h = GridHeader::new(
        Region::new(0.0, 360.0, -90.0, 90.0),
        (1.0, 1.0),
        Registration::Pixel,
    )
    .unwrap();
    assert_eq!(h.n_columns, 360);
    assert_eq!(h.n_rows, 180);
}

#[test]
fn test_quarter_degree_grid() {
    let h = GridHeader::new(
        Region::new(-125.0, -66.0, 24.0, 50.0),
        (0.25, 0.25),
        Registration::Gridline,
    )
    .unwrap();
    assert_eq!(h.n_columns, 237);
    assert_eq!(h.n_rows, 105);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_span_must_be_multiple_of_increment() {
    let result = GridHeader::new(
        Region::new(0.0, 10.0, 0.0, 5.3),
        (1.0, 1.0),
        Registration::Gridline,
    );
    assert!(matches!(
        result,
        Err(GridError::InconsistentDimensions { axis: "y", .. })
    ));
}

#[test]
fn test_small_slop_is_tolerated() {
    // A span off by less than the tolerance still rounds cleanly.
    let h = GridHeader::new(
        Region::new(0.0, 10.000005, 0.0, 5.0),
        (1.0, 1.0),
        Registration::Gridline,
    )
    .unwrap();
    assert_eq!(h.n_columns, 11);
}

#[test]
fn test_negative_increment_rejected() {
    let result = GridHeader::new(
        Region::new(0.0, 10.0, 0.0, 5.0),
        (-1.0, 1.0),
        Registration::Gridline,
    );
    assert!(matches!(result, Err(GridError::InvalidIncrement { .. })));
}

#[test]
fn test_inverted_region_rejected() {
    let result = GridHeader::new(
        Region::new(10.0, 0.0, 0.0, 5.0),
        (1.0, 1.0),
        Registration::Gridline,
    );
    assert!(matches!(result, Err(GridError::InvalidRegion { .. })));
}

// ============================================================================
// Coordinate mapping
// ============================================================================

#[test]
fn test_row_zero_is_north() {
    let h = GridHeader::new(
        Region::new(0.0, 360.0, -90.0, 90.0),
        (1.0, 1.0),
        Registration::Gridline,
    )
    .unwrap();
    assert_eq!(h.row_to_y(0), 90.0);
    assert_eq!(h.row_to_y(180), -90.0);
    assert_eq!(h.y_to_row(90.0), 0);
    assert_eq!(h.y_to_row(-90.0), 180);
}

#[test]
fn test_pixel_nodes_at_cell_centers() {
    let h = GridHeader::new(
        Region::new(0.0, 360.0, -90.0, 90.0),
        (10.0, 10.0),
        Registration::Pixel,
    )
    .unwrap();
    assert_eq!(h.col_to_x(0), 5.0);
    assert_eq!(h.row_to_y(0), 85.0);
    // Nearest-node mapping snaps to the containing cell.
    assert_eq!(h.x_to_col(7.0), 0);
    assert_eq!(h.x_to_col(12.0), 1);
}

#[test]
fn test_out_of_range_coordinates_give_out_of_range_indices() {
    let h = GridHeader::new(
        Region::new(0.0, 10.0, 0.0, 10.0),
        (1.0, 1.0),
        Registration::Gridline,
    )
    .unwrap();
    assert!(h.x_to_col(-3.0) < 0);
    assert!(h.x_to_col(15.0) > 10);
}

#[test]
fn test_same_lattice() {
    let a = GridHeader::new(
        Region::new(0.0, 10.0, 0.0, 10.0),
        (1.0, 1.0),
        Registration::Gridline,
    )
    .unwrap();
    let mut b = a.clone();
    assert!(a.same_lattice(&b));
    b.registration = Registration::Pixel;
    assert!(!a.same_lattice(&b));
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_header_serde_roundtrip() {
    let h = GridHeader::new(
        Region::new(-10.0, 10.0, -5.0, 5.0),
        (0.5, 0.5),
        Registration::Pixel,
    )
    .unwrap();
    let json = serde_json::to_string(&h).unwrap();
    let back: GridHeader = serde_json::from_str(&json).unwrap();
    assert_eq!(h, back);
}

// ============================================================================
// Grid container
// ============================================================================

#[test]
fn test_create_fills_with_nan() {
    let h = GridHeader::new(
        Region::new(0.0, 3.0, 0.0, 3.0),
        (1.0, 1.0),
        Registration::Pixel,
    )
    .unwrap();
    let g = Grid::create(h);
    assert!(g.data().iter().all(|v| v.is_nan()));
}

#[test]
fn test_set_and_value() {
    let h = GridHeader::new(
        Region::new(0.0, 3.0, 0.0, 3.0),
        (1.0, 1.0),
        Registration::Pixel,
    )
    .unwrap();
    let mut g = Grid::create(h);
    g.set(2, 1, 7.5);
    assert_eq!(g.value(2, 1), 7.5);
    assert_eq!(g.data()[2 * 3 + 1], 7.5);
}
