//! Coordinate Reference System handling
//!
//! The core never does projection math itself. When vector and raster
//! coordinate systems differ, the caller supplies a [`Reproject`]
//! implementation; [`NoReprojection`] reports the mismatch instead.

use crate::error::{Error, Result};
use geo::{Coord, MapCoords, MultiPolygon};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// WKT representation
    wkt: Option<String>,
    /// EPSG code if known
    epsg: Option<u32>,
    /// PROJ string if available
    proj: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
            proj: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
            proj: None,
        }
    }

    /// Create a CRS from a PROJ string
    pub fn from_proj(proj: impl Into<String>) -> Self {
        Self {
            wkt: None,
            epsg: None,
            proj: Some(proj.into()),
        }
    }

    /// Parse a CRS identifier as found in vector metadata.
    ///
    /// Understands `EPSG:4326`, OGC URNs (`urn:ogc:def:crs:EPSG::32633`),
    /// `CRS84`, PROJ strings (`+proj=...`) and falls back to WKT.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Self::wgs84();
        }
        if let Some(pos) = upper.rfind("EPSG:") {
            let code = upper[pos + 5..].trim_start_matches(':');
            if let Ok(code) = code.parse::<u32>() {
                return Self::from_epsg(code);
            }
        }
        if trimmed.starts_with("+proj") {
            return Self::from_proj(trimmed);
        }
        Self::from_wkt(trimmed)
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Get PROJ string
    pub fn proj(&self) -> Option<&str> {
        self.proj.as_deref()
    }

    /// Whether this CRS is geographic WGS84 (lon/lat degrees)
    pub fn is_wgs84(&self) -> bool {
        self.epsg == Some(4326)
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Textual comparison is imperfect but never reports a false match
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        if let (Some(a), Some(b)) = (&self.proj, &other.proj) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(proj) = &self.proj {
            return proj.clone();
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// Caller-supplied coordinate transform between two reference systems.
///
/// Any `Fn(&CRS, &CRS, Coord<f64>) -> Result<Coord<f64>>` closure implements
/// this trait, which keeps tests free of projection libraries.
pub trait Reproject: Send + Sync {
    /// Transform a single coordinate from `from` into `to`.
    fn transform(&self, from: &CRS, to: &CRS, coord: Coord<f64>) -> Result<Coord<f64>>;
}

impl<F> Reproject for F
where
    F: Fn(&CRS, &CRS, Coord<f64>) -> Result<Coord<f64>> + Send + Sync,
{
    fn transform(&self, from: &CRS, to: &CRS, coord: Coord<f64>) -> Result<Coord<f64>> {
        self(from, to, coord)
    }
}

/// Reprojector that refuses every transform with [`Error::CrsMismatch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReprojection;

impl Reproject for NoReprojection {
    fn transform(&self, from: &CRS, to: &CRS, _coord: Coord<f64>) -> Result<Coord<f64>> {
        Err(Error::CrsMismatch(from.identifier(), to.identifier()))
    }
}

/// Transform every vertex of a multipolygon.
pub fn reproject_multipolygon(
    reprojector: &dyn Reproject,
    geometry: &MultiPolygon<f64>,
    from: &CRS,
    to: &CRS,
) -> Result<MultiPolygon<f64>> {
    geometry.try_map_coords(|coord| reprojector.transform(from, to, coord))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Area};

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(4326);
        assert_eq!(crs.epsg(), Some(4326));
        assert_eq!(crs.identifier(), "EPSG:4326");
    }

    #[test]
    fn test_crs_equivalence() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(!CRS::from_epsg(4326).is_equivalent(&CRS::from_epsg(3857)));
        assert!(!CRS::from_epsg(4326).is_equivalent(&CRS::from_wkt("LOCAL_CS[]")));
    }

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(CRS::parse("EPSG:32633").epsg(), Some(32633));
        assert_eq!(CRS::parse("urn:ogc:def:crs:EPSG::3857").epsg(), Some(3857));
        assert!(CRS::parse("urn:ogc:def:crs:OGC:1.3:CRS84").is_wgs84());
        assert!(CRS::parse("+proj=longlat +datum=WGS84").proj().is_some());
        assert!(CRS::parse("GEOGCS[\"x\"]").wkt().is_some());
    }

    #[test]
    fn test_no_reprojection_reports_mismatch() {
        let err = NoReprojection
            .transform(&CRS::wgs84(), &CRS::from_epsg(3857), Coord { x: 1.0, y: 2.0 })
            .unwrap_err();
        assert!(matches!(err, Error::CrsMismatch(a, b) if a == "EPSG:4326" && b == "EPSG:3857"));
    }

    #[test]
    fn test_closure_reprojector() {
        let scale = |_: &CRS, _: &CRS, c: Coord<f64>| -> Result<Coord<f64>> {
            Ok(Coord { x: c.x * 2.0, y: c.y * 2.0 })
        };
        let square = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]]);
        let out = reproject_multipolygon(&scale, &square, &CRS::wgs84(), &CRS::from_epsg(3857)).unwrap();
        assert!((out.unsigned_area() - 4.0).abs() < 1e-12);
    }
}
