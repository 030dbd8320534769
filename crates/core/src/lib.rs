//! # rasterzones core
//!
//! Core types, traits and I/O for rasterzones.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid with nodata handling
//! - `GeoTransform`: invertible affine transform between cells and coordinates
//! - `CRS` and the `Reproject` seam for caller-supplied coordinate transforms
//! - `NamedPolygon` / `PolygonCollection` and the shape adapter
//! - Thin GeoTIFF and GeoJSON readers for the command line tool

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::{NoReprojection, Reproject, CRS};
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use vector::{NamedPolygon, PolygonCollection, ShapeInput};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::{NoReprojection, Reproject, CRS};
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{normalize, NamedPolygon, Normalized, PolygonCollection, ShapeInput};
    pub use crate::Algorithm;
}

/// Core trait for the algorithms in rasterzones.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
