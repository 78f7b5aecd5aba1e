//! Containment and center-point helpers for region polygons.

use geo::{Centroid, Geometry, Intersects, Point};

/// Whether a region polygon covers a point.
///
/// Only polygonal geometries can contain a point. A point lying exactly on
/// a ring counts as covered.
pub fn covers(geometry: &Geometry<f64>, point: Point<f64>) -> bool {
    match geometry {
        Geometry::Polygon(p) => p.intersects(&point),
        Geometry::MultiPolygon(mp) => mp.intersects(&point),
        Geometry::Rect(r) => r.intersects(&point),
        Geometry::GeometryCollection(gc) => gc.iter().any(|g| covers(g, point)),
        _ => false,
    }
}

/// `[x, y]` centroid of a geometry
pub fn center_point(geometry: &Geometry<f64>) -> Option<[f64; 2]> {
    geometry.centroid().map(|p| [p.x(), p.y()])
}
