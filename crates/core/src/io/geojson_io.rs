//! GeoJSON reading and writing of named polygon layers
//!
//! Each feature's name comes from one property (`DOTNAME` by default).
//! The layer CRS is taken from the legacy `crs` member when present,
//! otherwise WGS84 as RFC 7946 requires.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{PolygonCollection, ShapeInput};
use geo::Coord;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use indexmap::IndexMap;
use std::path::Path;

/// Default attribute holding the shape name
pub const DEFAULT_NAME_ATTR: &str = "DOTNAME";

/// Shapes read from a GeoJSON layer, with each feature's properties kept by name.
#[derive(Debug, Clone)]
pub struct GeoJsonShapes {
    pub input: ShapeInput,
    pub properties: IndexMap<String, JsonObject>,
}

/// Read a GeoJSON FeatureCollection file
pub fn read_shapes_geojson<P: AsRef<Path>>(path: P, name_attr: &str) -> Result<GeoJsonShapes> {
    let text = std::fs::read_to_string(path.as_ref())?;
    shapes_from_geojson_str(&text, name_attr)
}

/// Parse a GeoJSON FeatureCollection
pub fn shapes_from_geojson_str(text: &str, name_attr: &str) -> Result<GeoJsonShapes> {
    let geojson: GeoJson = text.parse()?;
    let collection = FeatureCollection::try_from(geojson)?;

    let crs = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(JsonValue::as_str)
        .map(CRS::parse)
        .unwrap_or_else(CRS::wgs84);

    let mut shapes = Vec::with_capacity(collection.features.len());
    let mut properties = IndexMap::new();

    for (index, feature) in collection.features.into_iter().enumerate() {
        let name = match feature.property(name_attr) {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => {
                return Err(Error::Format(format!(
                    "feature {} has no '{}' attribute",
                    index, name_attr
                )))
            }
        };

        let geometry = match feature.geometry {
            Some(g) => geo::Geometry::<f64>::try_from(g)?,
            None => geo::Geometry::GeometryCollection(geo::GeometryCollection::default()),
        };

        properties.insert(name.clone(), feature.properties.unwrap_or_default());
        shapes.push((name, geometry));
    }

    Ok(GeoJsonShapes {
        input: ShapeInput::collection(shapes).with_crs(crs),
        properties,
    })
}

/// Serialize a collection as a GeoJSON FeatureCollection.
///
/// `properties` supplies extra attributes per shape name; the name attribute
/// always holds the shape name.
pub fn shapes_to_geojson_string(
    collection: &PolygonCollection,
    name_attr: &str,
    properties: &IndexMap<String, JsonObject>,
) -> String {
    let features = collection
        .iter()
        .map(|shape| {
            let mut props = properties.get(shape.name()).cloned().unwrap_or_default();
            props.insert(name_attr.to_string(), JsonValue::from(shape.name()));
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(shape.geometry()))),
                id: None,
                properties: Some(props),
                foreign_members: None,
            }
        })
        .collect();

    GeoJson::from(FeatureCollection {
        bbox: None,
        features,
        foreign_members: crs_member(collection.crs()),
    })
    .to_string()
}

/// Serialize named points (zone seeds) as a GeoJSON FeatureCollection
pub fn points_to_geojson_string(
    points: &IndexMap<String, Coord<f64>>,
    name_attr: &str,
    crs: Option<&CRS>,
) -> String {
    let features = points
        .iter()
        .map(|(name, coord)| {
            let mut props = JsonObject::new();
            props.insert(name_attr.to_string(), JsonValue::from(name.as_str()));
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                    coord.x, coord.y,
                ]))),
                id: None,
                properties: Some(props),
                foreign_members: None,
            }
        })
        .collect();

    GeoJson::from(FeatureCollection {
        bbox: None,
        features,
        foreign_members: crs_member(crs),
    })
    .to_string()
}

/// Legacy `crs` member, omitted for WGS84
fn crs_member(crs: Option<&CRS>) -> Option<JsonObject> {
    crs.filter(|crs| !crs.is_wgs84()).map(|crs| {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            serde_json::json!({ "type": "name", "properties": { "name": crs.identifier() } }),
        );
        members
    })
}

/// Write a collection to a GeoJSON file
pub fn write_shapes_geojson<P: AsRef<Path>>(
    path: P,
    collection: &PolygonCollection,
    name_attr: &str,
    properties: &IndexMap<String, JsonObject>,
) -> Result<()> {
    ensure_parent(path.as_ref())?;
    std::fs::write(path, shapes_to_geojson_string(collection, name_attr, properties))?;
    Ok(())
}

/// Write named points to a GeoJSON file
pub fn write_points_geojson<P: AsRef<Path>>(
    path: P,
    points: &IndexMap<String, Coord<f64>>,
    name_attr: &str,
    crs: Option<&CRS>,
) -> Result<()> {
    ensure_parent(path.as_ref())?;
    std::fs::write(path, points_to_geojson_string(points, name_attr, crs))?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
