//! Shape adapter: normalizes single shapes and named collections into a
//! [`PolygonCollection`] expressed in the raster's coordinate system.

use super::shape::{NamedPolygon, PolygonCollection};
use crate::crs::{reproject_multipolygon, Reproject, CRS};
use crate::error::{Error, Result};
use geo::Geometry;
use std::collections::HashSet;

/// Polygon input accepted by the clipping and subdivision entry points.
#[derive(Debug, Clone)]
pub enum ShapeInput {
    /// One named geometry
    Single {
        name: String,
        geometry: Geometry<f64>,
        crs: Option<CRS>,
    },
    /// Ordered named geometries sharing one CRS
    Collection {
        shapes: Vec<(String, Geometry<f64>)>,
        crs: Option<CRS>,
    },
    /// Already validated shapes
    Prepared(PolygonCollection),
}

impl ShapeInput {
    pub fn single(name: impl Into<String>, geometry: impl Into<Geometry<f64>>) -> Self {
        ShapeInput::Single {
            name: name.into(),
            geometry: geometry.into(),
            crs: None,
        }
    }

    pub fn collection<N, G>(shapes: impl IntoIterator<Item = (N, G)>) -> Self
    where
        N: Into<String>,
        G: Into<Geometry<f64>>,
    {
        ShapeInput::Collection {
            shapes: shapes
                .into_iter()
                .map(|(n, g)| (n.into(), g.into()))
                .collect(),
            crs: None,
        }
    }

    /// Declare the CRS of the input shapes
    pub fn with_crs(self, crs: CRS) -> Self {
        match self {
            ShapeInput::Single { name, geometry, .. } => ShapeInput::Single {
                name,
                geometry,
                crs: Some(crs),
            },
            ShapeInput::Collection { shapes, .. } => ShapeInput::Collection {
                shapes,
                crs: Some(crs),
            },
            ShapeInput::Prepared(collection) => ShapeInput::Prepared(collection.with_crs(Some(crs))),
        }
    }

    fn crs(&self) -> Option<&CRS> {
        match self {
            ShapeInput::Single { crs, .. } | ShapeInput::Collection { crs, .. } => crs.as_ref(),
            ShapeInput::Prepared(c) => c.crs(),
        }
    }
}

impl From<PolygonCollection> for ShapeInput {
    fn from(collection: PolygonCollection) -> Self {
        ShapeInput::Prepared(collection)
    }
}

impl From<NamedPolygon> for ShapeInput {
    fn from(shape: NamedPolygon) -> Self {
        ShapeInput::Prepared(shape.into())
    }
}

/// A shape that failed validation or reprojection.
#[derive(Debug)]
pub struct Rejected {
    pub name: String,
    pub error: Error,
}

/// Adapter output: valid shapes plus per-shape failures.
#[derive(Debug)]
pub struct Normalized {
    pub collection: PolygonCollection,
    pub rejected: Vec<Rejected>,
}

impl Normalized {
    /// Fail with the first rejection, if any.
    pub fn into_strict(self) -> Result<PolygonCollection> {
        match self.rejected.into_iter().next() {
            Some(rejected) => Err(rejected.error),
            None => Ok(self.collection),
        }
    }
}

enum Pending {
    Raw(String, Geometry<f64>),
    Ready(NamedPolygon),
}

impl Pending {
    fn name(&self) -> &str {
        match self {
            Pending::Raw(name, _) => name,
            Pending::Ready(shape) => shape.name(),
        }
    }
}

/// Normalize polygon input into a collection in `target_crs`.
///
/// Duplicate names and unreconcilable coordinate systems fail the whole
/// batch; invalid individual shapes are returned in [`Normalized::rejected`].
/// When either CRS is unknown the shapes are taken as already matching.
pub fn normalize(
    input: impl Into<ShapeInput>,
    target_crs: Option<&CRS>,
    reprojector: &dyn Reproject,
) -> Result<Normalized> {
    let input = input.into();
    let source_crs = input.crs().cloned();

    let pending: Vec<Pending> = match input {
        ShapeInput::Single { name, geometry, .. } => vec![Pending::Raw(name, geometry)],
        ShapeInput::Collection { shapes, .. } => shapes
            .into_iter()
            .map(|(name, geometry)| Pending::Raw(name, geometry))
            .collect(),
        ShapeInput::Prepared(collection) => collection.into_iter().map(Pending::Ready).collect(),
    };

    let mut seen = HashSet::with_capacity(pending.len());
    for item in &pending {
        if !seen.insert(item.name()) {
            return Err(Error::DuplicateName(item.name().to_string()));
        }
    }

    let reprojection = match (&source_crs, target_crs) {
        (Some(from), Some(to)) if !from.is_equivalent(to) => Some((from.clone(), to.clone())),
        (None, Some(to)) => {
            tracing::debug!(target = %to, "shape CRS unknown, assuming raster CRS");
            None
        }
        (Some(from), None) => {
            tracing::debug!(source = %from, "raster CRS unknown, assuming shape CRS");
            None
        }
        _ => None,
    };

    let output_crs = match &reprojection {
        Some((_, to)) => Some(to.clone()),
        None => source_crs.or_else(|| target_crs.cloned()),
    };

    let mut collection = PolygonCollection::new(output_crs);
    let mut rejected = Vec::new();

    for item in pending {
        let name = item.name().to_string();
        let shape = match item {
            Pending::Raw(name, geometry) => NamedPolygon::new(name, geometry),
            Pending::Ready(shape) => Ok(shape),
        };

        let shape = match (shape, &reprojection) {
            (Ok(shape), Some((from, to))) => {
                match reproject_multipolygon(reprojector, shape.geometry(), from, to) {
                    Ok(geometry) => NamedPolygon::from_multi(shape.name(), geometry),
                    Err(e @ Error::CrsMismatch(..)) => return Err(e),
                    Err(e) => Err(e),
                }
            }
            (result, _) => result,
        };

        match shape {
            Ok(shape) => collection.push(shape)?,
            Err(error) => {
                tracing::warn!(shape = %name, %error, "rejecting shape");
                rejected.push(Rejected { name, error });
            }
        }
    }

    Ok(Normalized {
        collection,
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::NoReprojection;
    use approx::assert_relative_eq;
    use geo::{polygon, Coord, Polygon};

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
    }

    #[test]
    fn test_single_becomes_collection_of_one() {
        let out = normalize(ShapeInput::single("only", square(0.0, 0.0, 2.0)), None, &NoReprojection)
            .unwrap()
            .into_strict()
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out.get("only").unwrap().area(), 4.0);
    }

    #[test]
    fn test_prepared_shape_passes_through() {
        let shape = NamedPolygon::new("ready", square(1.0, 1.0, 3.0)).unwrap();
        let out = normalize(shape.clone(), None, &NoReprojection)
            .unwrap()
            .into_strict()
            .unwrap();
        assert_eq!(out.names().collect::<Vec<_>>(), vec!["ready"]);
        assert_eq!(out.get("ready"), Some(&shape));
    }

    #[test]
    fn test_collection_keeps_order_and_collects_failures() {
        let flat = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)];
        let input = ShapeInput::collection(vec![
            ("z", Geometry::from(square(0.0, 0.0, 1.0))),
            ("bad", Geometry::from(flat)),
            ("a", Geometry::from(square(1.0, 0.0, 1.0))),
        ]);
        let out = normalize(input, None, &NoReprojection).unwrap();
        assert_eq!(out.collection.names().collect::<Vec<_>>(), vec!["z", "a"]);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].name, "bad");
        assert!(out.into_strict().is_err());
    }

    #[test]
    fn test_duplicate_names_fail_batch() {
        let input = ShapeInput::collection(vec![
            ("x", square(0.0, 0.0, 1.0)),
            ("x", square(1.0, 0.0, 1.0)),
        ]);
        assert!(matches!(
            normalize(input, None, &NoReprojection),
            Err(Error::DuplicateName(n)) if n == "x"
        ));
    }

    #[test]
    fn test_crs_mismatch_without_reprojector() {
        let input = ShapeInput::single("s", square(0.0, 0.0, 1.0)).with_crs(CRS::from_epsg(4326));
        let result = normalize(input, Some(&CRS::from_epsg(32633)), &NoReprojection);
        assert!(matches!(result, Err(Error::CrsMismatch(..))));
    }

    #[test]
    fn test_injected_reprojection() {
        let shift = |_: &CRS, _: &CRS, c: Coord<f64>| -> Result<Coord<f64>> {
            Ok(Coord { x: c.x + 10.0, y: c.y })
        };
        let input = ShapeInput::single("s", square(0.0, 0.0, 1.0)).with_crs(CRS::from_epsg(4326));
        let target = CRS::from_epsg(3857);
        let out = normalize(input, Some(&target), &shift).unwrap().into_strict().unwrap();
        let shape = out.get("s").unwrap();
        assert_relative_eq!(shape.bbox().min().x, 10.0);
        assert_eq!(out.crs(), Some(&target));
    }

    #[test]
    fn test_unknown_crs_is_assumed_matching() {
        let input = ShapeInput::single("s", square(0.0, 0.0, 1.0));
        let out = normalize(input, Some(&CRS::from_epsg(3857)), &NoReprojection).unwrap();
        assert_eq!(out.collection.crs(), Some(&CRS::from_epsg(3857)));
    }
}
