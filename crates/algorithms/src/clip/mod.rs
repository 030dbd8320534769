//! Raster clipping: aggregate raster values inside named polygons
//!
//! For each polygon the cells its bounding box can reach are selected
//! ([`window`]), their coverage weights are computed ([`coverage`]) and the
//! raster values are folded into a [`ZoneStats`] ([`aggregate`]).
//! Polygons are independent and processed in parallel when the `parallel`
//! feature is enabled; results always follow the input order.

pub mod aggregate;
pub mod coverage;
pub mod window;

pub use aggregate::{aggregate, Summary, ZoneCoverage, ZoneStats};
pub use coverage::{cell_weights, CellWeight, ClipMode, InclusionRule, EPSILON};
pub use window::{select_window, CellWindow};

use crate::maybe_rayon::*;
use indexmap::IndexMap;
use rasterzones_core::raster::{PixelTransform, Raster, RasterElement};
use rasterzones_core::vector::{normalize, Rejected};
use rasterzones_core::{Algorithm, Error, NamedPolygon, PolygonCollection, Reproject, Result, ShapeInput};

/// Ordered mapping from polygon name to its aggregate
pub type ClipResult = IndexMap<String, ZoneStats>;

/// Parameters for raster clipping
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipParams {
    /// Full-cell or area-weighted contributions
    pub mode: ClipMode,
    /// Cell inclusion rule for unweighted mode
    pub rule: InclusionRule,
    /// Also compute the value-weighted centre of each polygon
    pub with_center: bool,
}

impl ClipParams {
    pub fn weighted() -> Self {
        Self {
            mode: ClipMode::Weighted,
            ..Self::default()
        }
    }

    pub fn with_center(mut self, with_center: bool) -> Self {
        self.with_center = with_center;
        self
    }
}

/// Clip results plus the shapes the adapter rejected
#[derive(Debug)]
pub struct ClipReport {
    pub zones: ClipResult,
    pub rejected: Vec<Rejected>,
}

/// Raster clipping algorithm
#[derive(Debug, Clone, Default)]
pub struct RasterClip;

impl Algorithm for RasterClip {
    type Input = (Raster<f64>, PolygonCollection);
    type Output = ClipResult;
    type Params = ClipParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "RasterClip"
    }

    fn description(&self) -> &'static str {
        "Sum raster values inside each named polygon, optionally weighted by covered cell area"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (raster, shapes) = input;
        clip_raster(&raster, &shapes, &params)
    }
}

/// Aggregate raster values for every polygon of a validated collection.
///
/// The collection must already be in the raster's CRS (see [`clip_shapes`]
/// for the adapter-driven entry point). Every input name appears in the
/// result, in input order; polygons missing the raster carry
/// [`ZoneCoverage::NoCoverage`]. Fails only for a non-invertible transform.
pub fn clip_raster<T: RasterElement>(
    raster: &Raster<T>,
    shapes: &PolygonCollection,
    params: &ClipParams,
) -> Result<ClipResult> {
    let inverse = raster.transform().inverse()?;
    let shapes: Vec<&NamedPolygon> = shapes.iter().collect();

    let zones: Vec<(String, ZoneStats)> = shapes
        .into_par_iter()
        .map(|shape| {
            let stats = clip_one(raster, &inverse, shape, params);
            (shape.name().to_string(), stats)
        })
        .collect();

    let covered = zones.iter().filter(|(_, s)| s.is_covered()).count();
    tracing::debug!(
        shapes = zones.len(),
        covered,
        mode = ?params.mode,
        "clipped raster"
    );

    Ok(zones.into_iter().collect())
}

/// Aggregate raster values for a single polygon.
pub fn clip_polygon<T: RasterElement>(
    raster: &Raster<T>,
    shape: &NamedPolygon,
    params: &ClipParams,
) -> Result<ZoneStats> {
    let inverse = raster.transform().inverse()?;
    Ok(clip_one(raster, &inverse, shape, params))
}

/// Normalize arbitrary shape input against the raster CRS, then clip.
///
/// Shapes failing validation are reported in [`ClipReport::rejected`] and
/// left out of the zones; duplicate names or an unreconcilable CRS fail the
/// whole call.
pub fn clip_shapes<T: RasterElement>(
    raster: &Raster<T>,
    input: impl Into<ShapeInput>,
    reprojector: &dyn Reproject,
    params: &ClipParams,
) -> Result<ClipReport> {
    let normalized = normalize(input, raster.crs(), reprojector)?;
    let zones = clip_raster(raster, &normalized.collection, params)?;
    Ok(ClipReport {
        zones,
        rejected: normalized.rejected,
    })
}

fn clip_one<T: RasterElement>(
    raster: &Raster<T>,
    inverse: &PixelTransform,
    shape: &NamedPolygon,
    params: &ClipParams,
) -> ZoneStats {
    let cells = coverage::pixel_weights(
        inverse,
        raster.rows(),
        raster.cols(),
        shape,
        params.mode,
        params.rule,
    );
    let stats = aggregate(raster, &cells, params.mode, params.with_center);
    tracing::trace!(shape = shape.name(), cells = cells.len(), sum = stats.sum, "zone");
    stats
}
