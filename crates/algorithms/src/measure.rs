//! Per-shape measurements: parts, areas, perimeter, centre and extent

use geo::{Centroid, Euclidean, GeodesicArea, Length};
use rasterzones_core::NamedPolygon;
use serde::Serialize;

/// Descriptive numbers for one named polygon
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeSummary {
    pub name: String,
    pub parts: usize,
    /// Planar area in CRS units squared
    pub area: f64,
    /// Geodesic area in km², meaningful for lon/lat shapes only
    pub area_km2: f64,
    /// Total ring length in CRS units
    pub perimeter: f64,
    /// Area-weighted centroid `(x, y)`
    pub center: Option<(f64, f64)>,
    /// `(min_x, min_y, max_x, max_y)`
    pub bbox: (f64, f64, f64, f64),
}

impl ShapeSummary {
    pub fn of(shape: &NamedPolygon) -> Self {
        let geometry = shape.geometry();
        let perimeter: f64 = geometry
            .iter()
            .map(|p| {
                Euclidean.length(p.exterior())
                    + p.interiors()
                        .iter()
                        .map(|r| Euclidean.length(r))
                        .sum::<f64>()
            })
            .sum();
        let bbox = shape.bbox();

        Self {
            name: shape.name().to_string(),
            parts: shape.parts(),
            area: shape.area(),
            area_km2: geometry.geodesic_area_unsigned() / 1e6,
            perimeter,
            center: geometry.centroid().map(|p| (p.x(), p.y())),
            bbox: (bbox.min().x, bbox.min().y, bbox.max().x, bbox.max().y),
        }
    }
}
