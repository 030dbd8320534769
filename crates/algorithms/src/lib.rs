//! # rasterzones algorithms
//!
//! Zonal aggregation of rasters over named polygons, and polygon
//! subdivision into near-equal-area zones.
//!
//! ## Modules
//!
//! - **clip**: window selection, exact cell coverage weights and aggregation
//! - **subdivide**: seed layouts, bounded Voronoi cells and zone naming
//! - **measure**: per-shape areas, centroids and extents

pub mod clip;
mod maybe_rayon;
pub mod measure;
pub mod subdivide;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::clip::{
        cell_weights, clip_polygon, clip_raster, clip_shapes, select_window, CellWeight,
        CellWindow, ClipMode, ClipParams, ClipReport, ClipResult, InclusionRule, RasterClip,
        Summary, ZoneCoverage, ZoneStats,
    };
    pub use crate::measure::ShapeSummary;
    pub use crate::subdivide::{
        subdivide_collection, subdivide_polygon, SeedLayout, ShapeSubdivide, SubdivideParams,
        Subdivision, SubdivisionReport, ZoneTarget,
    };
    pub use rasterzones_core::prelude::*;
}
