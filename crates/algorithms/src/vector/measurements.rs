//! Geometric measurements: planar and spherical area

use forestwatch_core::crs::EARTH_RADIUS_M;
use geo::{Area as GeoArea, Geometry, LineString, Polygon};

/// Planar area of a geometry in CRS units squared.
///
/// Returns unsigned area; non-areal geometries have area 0.
pub fn area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        Geometry::Rect(r) => r.unsigned_area(),
        _ => 0.0,
    }
}

/// Signed ring area on the sphere, in m², for lon/lat degree coordinates.
///
/// Chamberlain & Duquette (2007): `R²/2 · Σ (λ₂ − λ₁)(2 + sin φ₁ + sin φ₂)`.
/// Counter-clockwise rings are positive.
pub fn spherical_ring_area(ring: &LineString<f64>) -> f64 {
    let sum: f64 = ring
        .lines()
        .map(|line| {
            let (l1, p1) = (line.start.x.to_radians(), line.start.y.to_radians());
            let (l2, p2) = (line.end.x.to_radians(), line.end.y.to_radians());
            (l2 - l1) * (2.0 + p1.sin() + p2.sin())
        })
        .sum();
    // Traversal direction in the formula is opposite to the planar convention.
    -sum * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0
}

/// Geodesic area of a lon/lat polygon in m² (exterior minus holes), using
/// the same sphere as per-pixel areas
pub fn spherical_area(polygon: &Polygon<f64>) -> f64 {
    let exterior = spherical_ring_area(polygon.exterior()).abs();
    let holes: f64 = polygon
        .interiors()
        .iter()
        .map(|r| spherical_ring_area(r).abs())
        .sum();
    exterior - holes
}
