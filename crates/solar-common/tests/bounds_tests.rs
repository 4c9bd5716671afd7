//! Tests for GeoBounds operations and anchor repair.

use solar_common::bounds::{GeoBounds, MIN_SAFETY_MARGIN_DEG};
use solar_common::LatLng;

const TAMPA: LatLng = LatLng {
    lat: 27.95,
    lng: -82.46,
};

// ============================================================================
// Constructor tests
// ============================================================================

#[test]
fn test_bounds_from_edges() {
    let b = GeoBounds::from_edges(27.0, -83.0, 28.0, -82.0);
    assert_eq!(b.south(), 27.0);
    assert_eq!(b.west(), -83.0);
    assert_eq!(b.north(), 28.0);
    assert_eq!(b.east(), -82.0);
}

#[test]
fn test_bounds_around_is_centered() {
    let b = GeoBounds::around(TAMPA, 0.0003);
    let c = b.center();
    assert!((c.lat - TAMPA.lat).abs() < 1e-12);
    assert!((c.lng - TAMPA.lng).abs() < 1e-12);
    assert!((b.width_deg() - 0.0006).abs() < 1e-12);
    assert!((b.height_deg() - 0.0006).abs() < 1e-12);
}

#[test]
fn test_envelope_of_points() {
    let b = GeoBounds::envelope([
        LatLng::new(1.0, 5.0),
        LatLng::new(-2.0, 3.0),
        LatLng::new(0.5, 7.0),
    ])
    .unwrap();
    assert_eq!(b, GeoBounds::from_edges(-2.0, 3.0, 1.0, 7.0));
}

#[test]
fn test_envelope_empty() {
    assert!(GeoBounds::envelope(Vec::new()).is_none());
}

// ============================================================================
// Validity and containment tests
// ============================================================================

#[test]
fn test_inverted_bounds_invalid_until_normalized() {
    let b = GeoBounds::from_edges(28.0, -82.0, 27.0, -83.0);
    assert!(!b.is_valid());
    assert!(b.normalized().is_valid());
}

#[test]
fn test_zero_area_bounds_invalid() {
    let b = GeoBounds::new(TAMPA, TAMPA);
    assert!(!b.is_valid());
}

#[test]
fn test_nan_bounds_invalid() {
    let b = GeoBounds::from_edges(f64::NAN, -83.0, 28.0, -82.0);
    assert!(!b.is_valid());
}

#[test]
fn test_contains_point_edges() {
    let b = GeoBounds::from_edges(0.0, 0.0, 10.0, 10.0);
    assert!(b.contains_point(&LatLng::new(0.0, 5.0)));
    assert!(!b.strictly_contains(&LatLng::new(0.0, 5.0)));
    assert!(b.strictly_contains(&LatLng::new(5.0, 5.0)));
    assert!(!b.contains_point(&LatLng::new(10.5, 5.0)));
}

// ============================================================================
// Repair tests
// ============================================================================

#[test]
fn test_repair_bounds_one_km_away() {
    // ~1 km north of the anchor, no overlap.
    let far = GeoBounds::around(LatLng::new(TAMPA.lat + 0.009, TAMPA.lng), 0.0005);
    assert!(!far.contains_point(&TAMPA));

    let r = far.repair_around(TAMPA, MIN_SAFETY_MARGIN_DEG);
    assert!(r.repaired);
    assert!(r.bounds.contains_point(&TAMPA));
    assert!(r.bounds.strictly_contains(&TAMPA));
    assert!(r.bounds.width_deg() >= MIN_SAFETY_MARGIN_DEG);
    assert!(r.bounds.height_deg() >= MIN_SAFETY_MARGIN_DEG);
}

#[test]
fn test_repair_keeps_existing_half_extent() {
    let far = GeoBounds::around(LatLng::new(30.0, -80.0), 0.002);
    let r = far.repair_around(TAMPA, MIN_SAFETY_MARGIN_DEG);
    assert!((r.bounds.width_deg() - 0.004).abs() < 1e-9);
    assert!((r.bounds.height_deg() - 0.004).abs() < 1e-9);
    assert!((r.bounds.center().lat - TAMPA.lat).abs() < 1e-9);
}

#[test]
fn test_repair_tiny_bounds_uses_margin() {
    let tiny = GeoBounds::around(LatLng::new(30.0, -80.0), 0.00001);
    let r = tiny.repair_around(TAMPA, MIN_SAFETY_MARGIN_DEG);
    assert!((r.bounds.width_deg() - 2.0 * MIN_SAFETY_MARGIN_DEG).abs() < 1e-12);
    assert!((r.bounds.height_deg() - 2.0 * MIN_SAFETY_MARGIN_DEG).abs() < 1e-12);
}

#[test]
fn test_repair_degenerate_bounds() {
    let nan = GeoBounds::from_edges(f64::NAN, f64::NAN, f64::NAN, f64::NAN);
    let r = nan.repair_around(TAMPA, MIN_SAFETY_MARGIN_DEG);
    assert!(r.repaired);
    assert!(r.bounds.is_valid());
    assert!(r.bounds.strictly_contains(&TAMPA));
}

#[test]
fn test_repair_anchor_on_edge() {
    let b = GeoBounds::from_edges(TAMPA.lat, TAMPA.lng - 0.001, TAMPA.lat + 0.001, TAMPA.lng + 0.001);
    let r = b.repair_around(TAMPA, MIN_SAFETY_MARGIN_DEG);
    assert!(r.repaired);
    assert!(r.bounds.strictly_contains(&TAMPA));
}

#[test]
fn test_repair_normalizes_inverted_input() {
    let b = GeoBounds::from_edges(TAMPA.lat + 0.001, TAMPA.lng + 0.001, TAMPA.lat - 0.001, TAMPA.lng - 0.001);
    let r = b.repair_around(TAMPA, MIN_SAFETY_MARGIN_DEG);
    assert!(!r.repaired);
    assert!(r.bounds.is_valid());
}

// ============================================================================
// Extent checks
// ============================================================================

#[test]
fn test_unusual_extent() {
    assert!(!GeoBounds::around(TAMPA, 0.0008).has_unusual_extent());
    assert!(GeoBounds::around(TAMPA, 0.1).has_unusual_extent());
    assert!(GeoBounds::around(TAMPA, 0.00001).has_unusual_extent());
}

#[test]
fn test_padded() {
    let b = GeoBounds::from_edges(0.0, 0.0, 1.0, 1.0).padded(0.0001);
    assert!((b.south() + 0.0001).abs() < 1e-12);
    assert!((b.east() - 1.0001).abs() < 1e-12);
}
