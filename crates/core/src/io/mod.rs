//! Thin readers and writers feeding the core types
//!
//! Rasters come from GeoTIFF through the `tiff` crate, polygon layers from
//! GeoJSON through the `geojson` crate.

mod geojson_io;
mod native;

pub use geojson_io::{
    points_to_geojson_string, read_shapes_geojson, shapes_from_geojson_str,
    shapes_to_geojson_string, write_points_geojson, write_shapes_geojson, GeoJsonShapes,
    DEFAULT_NAME_ATTR,
};
pub use native::{read_geotiff, read_geotiff_from_buffer};
