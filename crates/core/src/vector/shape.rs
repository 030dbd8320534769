//! Named polygons and ordered polygon collections

use crate::crs::CRS;
use crate::error::{Error, Result};
use geo::{Area, BooleanOps, BoundingRect, Geometry, MultiPolygon, Polygon, Rect, Validation};
use indexmap::IndexMap;

/// A named polygonal shape with its precomputed bounding box.
///
/// Simple polygons are stored as one-part multipolygons, so every consumer
/// deals with a single geometry type. Construction validates the geometry
/// and repairs self-intersecting rings and overlapping parts where possible.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedPolygon {
    name: String,
    geometry: MultiPolygon<f64>,
    bbox: Rect<f64>,
    area: f64,
}

impl NamedPolygon {
    /// Build a named polygon from any polygonal geometry.
    ///
    /// Accepts `Polygon`, `MultiPolygon`, `Rect`, `Triangle` and geometry
    /// collections made only of those.
    pub fn new(name: impl Into<String>, geometry: impl Into<Geometry<f64>>) -> Result<Self> {
        let name = name.into();
        let multi = to_multi_polygon(&name, geometry.into())?;
        Self::from_multi(name, multi)
    }

    /// Build a named polygon from a multipolygon.
    pub fn from_multi(name: impl Into<String>, geometry: MultiPolygon<f64>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::geometry(name, "shape has no name"));
        }

        let parts: Vec<Polygon<f64>> = geometry
            .into_iter()
            .filter(|p| p.exterior().0.len() >= 4)
            .collect();
        if parts.is_empty() {
            return Err(Error::geometry(name, "no parts in shape"));
        }

        let mut geometry = MultiPolygon::new(parts);
        if geometry
            .iter()
            .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
            .flat_map(|ring| ring.coords())
            .any(|c| !c.x.is_finite() || !c.y.is_finite())
        {
            return Err(Error::geometry(name, "non-finite coordinate"));
        }

        if !geometry.is_valid() {
            tracing::debug!(shape = %name, "repairing invalid geometry");
            geometry = dissolve(geometry);
        }

        let area = geometry.unsigned_area();
        let bbox = geometry
            .bounding_rect()
            .ok_or_else(|| Error::geometry(&name, "empty geometry"))?;
        if !(area > 0.0) || area <= bbox_tolerance(&bbox) {
            return Err(Error::geometry(name, "zero area"));
        }

        Ok(Self {
            name,
            geometry,
            bbox,
            area,
        })
    }

    /// Shape name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape geometry
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Tight axis-aligned envelope of all rings
    pub fn bbox(&self) -> Rect<f64> {
        self.bbox
    }

    /// Planar area in CRS units squared
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Number of polygon parts
    pub fn parts(&self) -> usize {
        self.geometry.0.len()
    }
}

/// Areas below this fraction of the bounding box are numerical residue.
fn bbox_tolerance(bbox: &Rect<f64>) -> f64 {
    let w = bbox.width().abs().max(f64::MIN_POSITIVE);
    let h = bbox.height().abs().max(f64::MIN_POSITIVE);
    w * h * 1e-12
}

fn to_multi_polygon(name: &str, geometry: Geometry<f64>) -> Result<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Ok(mp),
        Geometry::Rect(r) => Ok(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Ok(MultiPolygon::new(vec![t.to_polygon()])),
        Geometry::GeometryCollection(gc) => {
            let mut parts = Vec::new();
            for g in gc {
                parts.extend(to_multi_polygon(name, g)?);
            }
            Ok(MultiPolygon::new(parts))
        }
        other => Err(Error::geometry(
            name,
            format!("unsupported geometry type {}", geometry_kind(&other)),
        )),
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        _ => "Polygon",
    }
}

/// Union the parts one at a time.
///
/// Boolean ops fill each operand even-odd, so overlapping parts must meet
/// as separate operands to merge instead of cancelling.
fn dissolve(geometry: MultiPolygon<f64>) -> MultiPolygon<f64> {
    geometry
        .into_iter()
        .fold(MultiPolygon::new(vec![]), |acc, part| acc.union(&part))
}

/// Ordered collection of uniquely named polygons sharing one CRS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonCollection {
    shapes: IndexMap<String, NamedPolygon>,
    crs: Option<CRS>,
}

impl PolygonCollection {
    pub fn new(crs: Option<CRS>) -> Self {
        Self {
            shapes: IndexMap::new(),
            crs,
        }
    }

    /// Build a collection, failing on the first duplicate name.
    pub fn from_shapes(
        shapes: impl IntoIterator<Item = NamedPolygon>,
        crs: Option<CRS>,
    ) -> Result<Self> {
        let mut collection = Self::new(crs);
        for shape in shapes {
            collection.push(shape)?;
        }
        Ok(collection)
    }

    /// Append a shape; names must be unique.
    pub fn push(&mut self, shape: NamedPolygon) -> Result<()> {
        if self.shapes.contains_key(shape.name()) {
            return Err(Error::DuplicateName(shape.name().to_string()));
        }
        self.shapes.insert(shape.name().to_string(), shape);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&NamedPolygon> {
        self.shapes.get(name)
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Replace the declared CRS without touching coordinates
    pub fn with_crs(mut self, crs: Option<CRS>) -> Self {
        self.crs = crs;
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shapes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedPolygon> {
        self.shapes.values()
    }

    /// Total planar area of all shapes
    pub fn total_area(&self) -> f64 {
        self.iter().map(NamedPolygon::area).sum()
    }
}

impl From<NamedPolygon> for PolygonCollection {
    fn from(shape: NamedPolygon) -> Self {
        Self {
            shapes: IndexMap::from([(shape.name().to_string(), shape)]),
            crs: None,
        }
    }
}

impl IntoIterator for PolygonCollection {
    type Item = NamedPolygon;
    type IntoIter = indexmap::map::IntoValues<String, NamedPolygon>;

    fn into_iter(self) -> Self::IntoIter {
        self.shapes.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{line_string, polygon, Coord, Point};

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
    }

    #[test]
    fn test_bbox_is_tight_over_all_parts() {
        let mp = MultiPolygon::new(vec![square(0.0, 0.0, 1.0), square(5.0, -2.0, 1.0)]);
        let shape = NamedPolygon::new("a", mp).unwrap();
        let bbox = shape.bbox();
        assert_eq!(bbox.min(), Coord { x: 0.0, y: -2.0 });
        assert_eq!(bbox.max(), Coord { x: 6.0, y: 1.0 });
        assert_eq!(shape.parts(), 2);
        assert_relative_eq!(shape.area(), 2.0);
    }

    #[test]
    fn test_rejects_empty_and_degenerate() {
        let empty = MultiPolygon::<f64>::new(vec![]);
        assert!(matches!(
            NamedPolygon::new("e", empty),
            Err(Error::InvalidGeometry { .. })
        ));

        let flat = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)];
        assert!(matches!(
            NamedPolygon::new("flat", flat),
            Err(Error::InvalidGeometry { reason, .. }) if reason == "zero area"
        ));

        assert!(NamedPolygon::new("", square(0.0, 0.0, 1.0)).is_err());
        assert!(NamedPolygon::new("pt", Point::new(0.0, 0.0)).is_err());
    }

    #[test]
    fn test_repairs_bow_tie() {
        // Two triangles of area 0.25 each meeting at (0.5, 0.5)
        let bow_tie = Polygon::new(
            line_string![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 1.0, y: 0.0),
                (x: 0.0, y: 1.0),
                (x: 0.0, y: 0.0),
            ],
            vec![],
        );
        let shape = NamedPolygon::new("bow", bow_tie).unwrap();
        assert_relative_eq!(shape.area(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_parts_touching_at_a_corner_are_kept() {
        let mp = MultiPolygon::new(vec![square(0.0, 0.0, 1.0), square(1.0, 1.0, 1.0)]);
        let shape = NamedPolygon::new("corner", mp.clone()).unwrap();
        assert_eq!(shape.geometry(), &mp);
        assert_eq!(shape.parts(), 2);
    }

    #[test]
    fn test_duplicate_parts_are_merged() {
        let half = polygon![(x: 0.0, y: 0.0), (x: 0.5, y: 0.0), (x: 0.5, y: 1.0), (x: 0.0, y: 1.0)];
        let shape =
            NamedPolygon::new("dup", MultiPolygon::new(vec![half.clone(), half])).unwrap();
        assert_relative_eq!(shape.area(), 0.5, epsilon = 1e-9);
        assert_eq!(shape.parts(), 1);
    }

    #[test]
    fn test_nested_part_is_absorbed() {
        let outer = polygon![(x: 0.0, y: 0.0), (x: 0.5, y: 0.0), (x: 0.5, y: 1.0), (x: 0.0, y: 1.0)];
        let inner = square(0.1, 0.1, 0.2);
        let shape = NamedPolygon::new("nest", MultiPolygon::new(vec![outer, inner])).unwrap();
        assert_relative_eq!(shape.area(), 0.5, epsilon = 1e-9);
        assert!(shape.geometry().is_valid());
    }

    #[test]
    fn test_collection_preserves_order_and_rejects_duplicates() {
        let mut c = PolygonCollection::new(Some(CRS::wgs84()));
        c.push(NamedPolygon::new("b", square(0.0, 0.0, 1.0)).unwrap()).unwrap();
        c.push(NamedPolygon::new("a", square(1.0, 0.0, 1.0)).unwrap()).unwrap();
        let dup = c.push(NamedPolygon::new("b", square(2.0, 0.0, 1.0)).unwrap());
        assert!(matches!(dup, Err(Error::DuplicateName(n)) if n == "b"));
        assert_eq!(c.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_relative_eq!(c.total_area(), 2.0);
    }
}
