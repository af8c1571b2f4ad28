//! Tests for bounding boxes, CRS handling and transforms working together.

use geo_common::{BoundingBox, Crs, CrsTransform, Extent, GeoTransform};
use test_utils::{assert_approx_eq, bbox};

fn fixture(b: (f64, f64, f64, f64)) -> BoundingBox {
    BoundingBox::new(b.0, b.1, b.2, b.3).unwrap()
}

// ============================================================================
// BoundingBox tests
// ============================================================================

#[test]
fn test_chicago_dimensions() {
    let chicago = fixture(bbox::CHICAGO);
    assert_approx_eq!(chicago.width(), 0.42, 1e-9);
    assert_approx_eq!(chicago.height(), 0.39, 1e-9);
}

#[test]
fn test_invalid_fixture_rejected() {
    let (a, b, c, d) = bbox::INVALID;
    assert!(BoundingBox::new(a, b, c, d).is_err());
}

#[test]
fn test_conus_intersection() {
    let conus = fixture(bbox::CONUS);
    assert!(fixture(bbox::CHICAGO).intersects(&conus));
    assert!(fixture(bbox::LARGE_METRO).intersects(&conus));
    assert!(!fixture(bbox::LONDON).intersects(&conus));
}

#[test]
fn test_center() {
    let b = BoundingBox::new(-10.0, 20.0, 10.0, 40.0).unwrap();
    assert_eq!(b.center(), (0.0, 30.0));
    assert!(b.contains_point(0.0, 30.0));
    assert!(!b.contains_point(11.0, 30.0));
}

// ============================================================================
// Projection tests
// ============================================================================

#[test]
fn test_projected_bbox_is_meters() {
    let chicago = fixture(bbox::CHICAGO);
    let t = CrsTransform::new(Crs::wgs84(), Crs::conus_albers()).unwrap();
    let projected = t.convert_extent(&chicago.to_extent(), 21).unwrap();

    // ~35 km by ~43 km on the ground, widened by grid convergence
    assert!(projected.width() > 30_000.0 && projected.width() < 45_000.0);
    assert!(projected.height() > 40_000.0 && projected.height() < 52_000.0);
}

#[test]
fn test_crs_serde_as_string() {
    let json = serde_json::to_string(&Crs::conus_albers()).unwrap();
    assert_eq!(json, "\"EPSG:5070\"");
    let back: Crs = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Crs::conus_albers());
    assert!(serde_json::from_str::<Crs>("\"EPSG:nope\"").is_err());
}

// ============================================================================
// GeoTransform tests
// ============================================================================

#[test]
fn test_transform_pixel_zero_is_northwest_corner() {
    let b = fixture(bbox::LARGE_METRO);
    let gt = GeoTransform::from_extent(&b.to_extent(), 2226, 1855);
    let (x, y) = gt.pixel_to_world(0.0, 0.0);
    assert_eq!(x, b.min_lon());
    assert_eq!(y, b.max_lat());
}

#[test]
fn test_transform_extent_round_trip() {
    let extent = Extent::new(100.0, 200.0, 400.0, 500.0);
    let gt = GeoTransform::from_extent(&extent, 10, 30);
    let back = gt.extent(10, 30);
    assert_approx_eq!(back.min_x, extent.min_x, 1e-9);
    assert_approx_eq!(back.min_y, extent.min_y, 1e-9);
    assert_approx_eq!(back.max_x, extent.max_x, 1e-9);
    assert_approx_eq!(back.max_y, extent.max_y, 1e-9);
}
