//! Polygon subdivision into near-equal-area zones
//!
//! Seeds are placed inside the polygon ([`seeds`]), their bounded Voronoi
//! cells are built ([`voronoi`]) and each cell is intersected with the
//! polygon. The surviving pieces partition the parent and are named
//! `"{parent}:A{k:04}"` with consecutive `k`.

pub mod seeds;
pub mod voronoi;

pub use seeds::{generate_seeds, SeedLayout};
pub use voronoi::voronoi_cells;

use crate::clip::EPSILON;
use crate::maybe_rayon::*;
use geo::{Area, BooleanOps, Coord, GeodesicArea, InteriorPoint, MultiPolygon, Rect};
use indexmap::IndexMap;
use rasterzones_core::vector::Rejected;
use rasterzones_core::{Algorithm, Error, NamedPolygon, PolygonCollection, Result};

/// Zone sizes at or below this fraction of the coordinate magnitude cannot
/// be resolved by the bisector arithmetic
const MIN_ZONE_RESOLUTION: f64 = 1e-9;

/// Seed shifts tried when zones miss part of the parent
const MAX_NUDGES: usize = 4;

/// Relative gap between total zone area and parent area still accepted
const AREA_TOLERANCE: f64 = 1e-7;

/// How many zones a polygon should be split into
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneTarget {
    /// Exact zone count; grid layouts that cannot hit it switch to
    /// k-means seeds
    Count(usize),
    /// Zone area in CRS units squared
    AreaPerZone(f64),
    /// Zone area in km², measured geodesically (lon/lat shapes)
    AreaPerZoneKm2(f64),
}

impl Default for ZoneTarget {
    fn default() -> Self {
        ZoneTarget::AreaPerZoneKm2(100.0)
    }
}

impl ZoneTarget {
    /// Zone count for a shape: `max(round(area / per_zone), 1)` for area targets.
    pub fn zone_count(&self, shape: &NamedPolygon) -> Result<usize> {
        let (area, per_zone) = match *self {
            ZoneTarget::Count(n) => return Ok(n),
            ZoneTarget::AreaPerZone(a) => (shape.area(), a),
            ZoneTarget::AreaPerZoneKm2(a) => {
                (shape.geometry().geodesic_area_unsigned() / 1e6, a)
            }
        };
        if !per_zone.is_finite() || per_zone <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "target",
                value: per_zone.to_string(),
                reason: "area per zone must be positive".into(),
            });
        }
        Ok(((area / per_zone).round() as usize).max(1))
    }
}

/// Parameters for polygon subdivision
#[derive(Debug, Clone)]
pub struct SubdivideParams {
    /// Zone count or zone size
    pub target: ZoneTarget,
    /// Seed placement
    pub seeds: SeedLayout,
    /// Upper bound on zones per polygon (default: 10 000)
    pub max_zones: usize,
    /// Only subdivide the first `limit` polygons of a collection
    pub limit: Option<usize>,
}

impl Default for SubdivideParams {
    fn default() -> Self {
        Self {
            target: ZoneTarget::default(),
            seeds: SeedLayout::default(),
            max_zones: 10_000,
            limit: None,
        }
    }
}

/// Zones of one parent polygon with the seed that generated each
#[derive(Debug, Clone)]
pub struct Subdivision {
    pub parent: String,
    pub zones: PolygonCollection,
    pub seeds: IndexMap<String, Coord<f64>>,
}

/// Zones of every subdivided polygon plus per-parent failures
#[derive(Debug)]
pub struct SubdivisionReport {
    pub zones: PolygonCollection,
    pub seeds: IndexMap<String, Coord<f64>>,
    /// Zone name to parent name
    pub parents: IndexMap<String, String>,
    pub failures: Vec<Rejected>,
}

/// Polygon subdivision algorithm
#[derive(Debug, Clone, Default)]
pub struct ShapeSubdivide;

impl Algorithm for ShapeSubdivide {
    type Input = PolygonCollection;
    type Output = SubdivisionReport;
    type Params = SubdivideParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ShapeSubdivide"
    }

    fn description(&self) -> &'static str {
        "Split polygons into near-equal-area zones using Voronoi cells of interior seeds"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        Ok(subdivide_collection(&input, &params))
    }
}

/// Split one polygon into zones.
///
/// Zone areas sum to the parent area and zones do not overlap, up to
/// floating point tolerance. Pieces of at most `EPSILON` × parent area are
/// dropped before naming.
pub fn subdivide_polygon(shape: &NamedPolygon, params: &SubdivideParams) -> Result<Subdivision> {
    let count = params.target.zone_count(shape)?;
    check_zone_count(shape, count, params.max_zones)?;

    let mut zones = PolygonCollection::new(None);
    let mut seeds = IndexMap::new();

    if count == 1 {
        let name = zone_name(shape.name(), 0);
        let seed = shape
            .geometry()
            .interior_point()
            .map(|p| p.0)
            .ok_or_else(|| Error::subdivision(shape.name(), "no interior point"))?;
        zones.push(NamedPolygon::from_multi(name.clone(), shape.geometry().clone())?)?;
        seeds.insert(name, seed);
        return Ok(Subdivision {
            parent: shape.name().to_string(),
            zones,
            seeds,
        });
    }

    let points = seed_points(shape, count, params);
    if points.is_empty() {
        return Err(Error::subdivision(shape.name(), "no seed point falls inside the shape"));
    }

    let frame = frame(&shape.bbox());
    let spacing = (shape.area() / points.len() as f64).sqrt();
    let tolerance = AREA_TOLERANCE * shape.area();

    // Bisectors lying on polygon edges can make the overlay drop area
    let mut pieces = clip_cells(shape, &points, &frame, nudge(0, spacing));
    let mut gap = area_gap(shape, &pieces);
    for attempt in 1..=MAX_NUDGES {
        if gap <= tolerance {
            break;
        }
        tracing::debug!(
            parent = shape.name(),
            attempt,
            gap,
            "zones miss part of the shape, shifting seeds"
        );
        let retry = clip_cells(shape, &points, &frame, nudge(attempt, spacing));
        let retry_gap = area_gap(shape, &retry);
        if retry_gap < gap {
            pieces = retry;
            gap = retry_gap;
        }
    }
    if gap > tolerance {
        tracing::warn!(parent = shape.name(), gap, "zone areas do not add up to the parent");
    }

    for (seed, piece) in pieces {
        let name = zone_name(shape.name(), zones.len());
        match NamedPolygon::from_multi(name.clone(), piece) {
            Ok(zone) => {
                zones.push(zone)?;
                seeds.insert(name, seed);
            }
            Err(error) => tracing::warn!(parent = shape.name(), %error, "dropping zone"),
        }
    }

    if zones.is_empty() {
        return Err(Error::subdivision(shape.name(), "every zone was empty"));
    }

    tracing::debug!(
        parent = shape.name(),
        requested = count,
        zones = zones.len(),
        "subdivided"
    );

    Ok(Subdivision {
        parent: shape.name().to_string(),
        zones,
        seeds,
    })
}

/// Subdivide every polygon of a collection (or the first `limit`).
///
/// Polygons are processed independently; one that cannot be subdivided is
/// reported in `failures` and the rest still succeed. Zones keep parent
/// order and inherit the collection CRS.
pub fn subdivide_collection(
    shapes: &PolygonCollection,
    params: &SubdivideParams,
) -> SubdivisionReport {
    let selected: Vec<&NamedPolygon> = shapes
        .iter()
        .take(params.limit.unwrap_or(usize::MAX))
        .collect();

    let results: Vec<(String, Result<Subdivision>)> = selected
        .into_par_iter()
        .map(|shape| (shape.name().to_string(), subdivide_polygon(shape, params)))
        .collect();

    let mut zones = PolygonCollection::new(shapes.crs().cloned());
    let mut seeds = IndexMap::new();
    let mut parents = IndexMap::new();
    let mut failures = Vec::new();

    for (name, result) in results {
        let merged = result.and_then(|sub| {
            if let Some(taken) = sub.zones.names().find(|n| zones.get(n).is_some()) {
                return Err(Error::DuplicateName(taken.to_string()));
            }
            for zone in sub.zones {
                let name = zone.name().to_string();
                zones.push(zone)?;
                parents.insert(name, sub.parent.clone());
            }
            seeds.extend(sub.seeds);
            Ok(())
        });
        if let Err(error) = merged {
            tracing::warn!(shape = %name, %error, "subdivision failed");
            failures.push(Rejected { name, error });
        }
    }

    tracing::info!(
        parents = shapes.len().min(params.limit.unwrap_or(usize::MAX)),
        zones = zones.len(),
        failed = failures.len(),
        "subdivision complete"
    );

    SubdivisionReport {
        zones,
        seeds,
        parents,
        failures,
    }
}

fn zone_name(parent: &str, k: usize) -> String {
    format!("{}:A{:04}", parent, k)
}

fn check_zone_count(shape: &NamedPolygon, count: usize, max_zones: usize) -> Result<()> {
    if count == 0 {
        return Err(Error::subdivision(shape.name(), "zone count is zero"));
    }
    if count > max_zones {
        return Err(Error::subdivision(
            shape.name(),
            format!("{} zones exceeds the limit of {}", count, max_zones),
        ));
    }
    let bbox = shape.bbox();
    let magnitude = [bbox.min().x, bbox.min().y, bbox.max().x, bbox.max().y]
        .iter()
        .fold(bbox.width().max(bbox.height()), |m, v| m.max(v.abs()));
    let side = (shape.area() / count as f64).sqrt();
    if side <= magnitude * MIN_ZONE_RESOLUTION {
        return Err(Error::subdivision(
            shape.name(),
            format!("{} zones would be slivers", count),
        ));
    }
    Ok(())
}

/// Seeds for `count` zones, switching to k-means when an exact count is
/// requested and the grid cannot deliver it
fn seed_points(shape: &NamedPolygon, count: usize, params: &SubdivideParams) -> Vec<Coord<f64>> {
    let points = generate_seeds(shape, count, &params.seeds);
    if !matches!(params.target, ZoneTarget::Count(_)) || points.len() == count {
        return points;
    }
    let rng_seed = match params.seeds {
        SeedLayout::Grid => 0,
        SeedLayout::Jittered { seed, .. } => seed,
        SeedLayout::KMeans { .. } => return points,
    };
    tracing::debug!(
        parent = shape.name(),
        requested = count,
        seeds = points.len(),
        "grid missed the zone count, using k-means seeds"
    );
    generate_seeds(shape, count, &SeedLayout::kmeans(rng_seed))
}

/// Clip every Voronoi cell of the (shifted) seeds to the shape.
///
/// Pieces of at most `EPSILON` × parent area are dropped; each kept piece
/// carries its unshifted seed.
fn clip_cells(
    shape: &NamedPolygon,
    points: &[Coord<f64>],
    frame: &Rect<f64>,
    shift: Coord<f64>,
) -> Vec<(Coord<f64>, MultiPolygon<f64>)> {
    let sites: Vec<Coord<f64>> = points.iter().map(|p| *p + shift).collect();
    let floor = EPSILON * shape.area();

    points
        .iter()
        .zip(voronoi_cells(&sites, frame))
        .filter(|(_, cell)| !cell.exterior().0.is_empty())
        .map(|(seed, cell)| (*seed, MultiPolygon::new(vec![cell]).intersection(shape.geometry())))
        .filter(|(_, piece)| piece.unsigned_area() > floor)
        .collect()
}

fn area_gap(shape: &NamedPolygon, pieces: &[(Coord<f64>, MultiPolygon<f64>)]) -> f64 {
    let total: f64 = pieces.iter().map(|(_, piece)| piece.unsigned_area()).sum();
    (total - shape.area()).abs()
}

/// Common offset for every seed on retry `attempt`, off both axes
fn nudge(attempt: usize, spacing: f64) -> Coord<f64> {
    let step = attempt as f64 * spacing * 1e-3;
    Coord {
        x: step * 0.754_877_666_246_692_7,
        y: step * 0.569_840_290_998_053_2,
    }
}

/// Bounding box grown so every Voronoi cell reaching the shape is closed
fn frame(bbox: &Rect<f64>) -> Rect<f64> {
    let margin = bbox.width().max(bbox.height()) * 0.1;
    let (min, max) = (bbox.min(), bbox.max());
    Rect::new(
        Coord {
            x: min.x - margin,
            y: min.y - margin,
        },
        Coord {
            x: max.x + margin,
            y: max.y + margin,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, Polygon};

    fn square(name: &str, x: f64, size: f64) -> NamedPolygon {
        let poly: Polygon<f64> = polygon![
            (x: x, y: 0.0),
            (x: x + size, y: 0.0),
            (x: x + size, y: size),
            (x: x, y: size),
        ];
        NamedPolygon::new(name, poly).unwrap()
    }

    fn count(n: usize) -> SubdivideParams {
        SubdivideParams {
            target: ZoneTarget::Count(n),
            ..Default::default()
        }
    }

    #[test]
    fn test_zone_count_from_area() {
        let shape = square("s", 0.0, 10.0);
        assert_eq!(ZoneTarget::AreaPerZone(30.0).zone_count(&shape).unwrap(), 3);
        assert_eq!(ZoneTarget::AreaPerZone(1000.0).zone_count(&shape).unwrap(), 1);
        assert!(ZoneTarget::AreaPerZone(0.0).zone_count(&shape).is_err());
    }

    #[test]
    fn test_zone_count_geodesic() {
        // One degree square at the equator is about 12 300 km²
        let shape = square("deg", 0.0, 1.0);
        let n = ZoneTarget::AreaPerZoneKm2(100.0).zone_count(&shape).unwrap();
        assert!((120..=125).contains(&n), "got {}", n);
    }

    #[test]
    fn test_names_and_seeds() {
        let sub = subdivide_polygon(&square("P", 0.0, 10.0), &count(4)).unwrap();
        let names: Vec<_> = sub.zones.names().collect();
        assert_eq!(names, vec!["P:A0000", "P:A0001", "P:A0002", "P:A0003"]);
        assert_eq!(sub.seeds.len(), 4);
        assert_relative_eq!(sub.zones.total_area(), 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_single_zone_is_parent() {
        let sub = subdivide_polygon(&square("P", 0.0, 3.0), &count(1)).unwrap();
        assert_eq!(sub.zones.len(), 1);
        assert_relative_eq!(sub.zones.get("P:A0000").unwrap().area(), 9.0);
    }

    #[test]
    fn test_sanity_bounds() {
        let shape = square("P", 0.0, 10.0);
        assert!(matches!(
            subdivide_polygon(&shape, &count(0)),
            Err(Error::Subdivision { .. })
        ));
        let params = SubdivideParams {
            max_zones: 10,
            ..count(11)
        };
        assert!(matches!(
            subdivide_polygon(&shape, &params),
            Err(Error::Subdivision { .. })
        ));
    }

    #[test]
    fn test_count_is_exact_on_square() {
        let shape = square("P", 0.0, 10.0);
        for n in [3, 5, 7] {
            let sub = subdivide_polygon(&shape, &count(n)).unwrap();
            assert_eq!(sub.zones.len(), n, "requested {}", n);
            assert_relative_eq!(sub.zones.total_area(), 100.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_unresolvable_zones_are_slivers() {
        let poly: Polygon<f64> = polygon![
            (x: 1e4, y: 1e4),
            (x: 1e4 + 1e-4, y: 1e4),
            (x: 1e4 + 1e-4, y: 1e4 + 1e-4),
            (x: 1e4, y: 1e4 + 1e-4),
        ];
        let tiny = NamedPolygon::new("tiny", poly).unwrap();
        let result = subdivide_polygon(&tiny, &count(10_000));
        assert!(matches!(
            result,
            Err(Error::Subdivision { reason, .. }) if reason.contains("slivers")
        ));
        assert!(subdivide_polygon(&tiny, &count(4)).is_ok());
    }

    #[test]
    fn test_nudge_is_off_axis_and_grows() {
        assert_eq!(nudge(0, 5.0), Coord { x: 0.0, y: 0.0 });
        let (a, b) = (nudge(1, 5.0), nudge(2, 5.0));
        assert!(a.x > 0.0 && a.y > 0.0 && a.x != a.y);
        assert_relative_eq!(b.x, 2.0 * a.x);
    }

    #[test]
    fn test_collection_collects_failures_and_limit() {
        let shapes = PolygonCollection::from_shapes(
            vec![square("a", 0.0, 10.0), square("b", 20.0, 10.0), square("c", 40.0, 10.0)],
            None,
        )
        .unwrap();
        let params = SubdivideParams {
            target: ZoneTarget::AreaPerZone(25.0),
            limit: Some(2),
            ..Default::default()
        };
        let report = subdivide_collection(&shapes, &params);
        assert_eq!(report.zones.len(), 8);
        assert!(report.failures.is_empty());
        assert!(report.zones.names().all(|n| !n.starts_with("c:")));
        assert_eq!(report.parents.len(), 8);
        assert_eq!(report.parents["b:A0003"], "b");

        let strict = SubdivideParams {
            max_zones: 2,
            ..params
        };
        let report = ShapeSubdivide.execute(shapes, strict).unwrap();
        assert_eq!(report.failures.len(), 2);
        assert!(report.zones.is_empty());
    }
}
