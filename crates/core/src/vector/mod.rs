//! Vector data: named polygons, ordered collections and the shape adapter

mod adapter;
mod shape;

pub use adapter::{normalize, Normalized, Rejected, ShapeInput};
pub use shape::{NamedPolygon, PolygonCollection};
