//! Affine geotransformation for rasters

use crate::error::{Error, Result};
use geo::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

/// Determinants smaller than this are treated as singular.
const SINGULAR_EPSILON: f64 = 1e-18;

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and geographic coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up images the rotations are 0 and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

/// Inverse of a [`GeoTransform`], mapping geographic coordinates to
/// fractional pixel coordinates `(col, row)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelTransform {
    origin_x: f64,
    origin_y: f64,
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

impl PixelTransform {
    /// Map a geographic coordinate to pixel space (`x` = col, `y` = row).
    pub fn apply(&self, coord: Coord<f64>) -> Coord<f64> {
        let dx = coord.x - self.origin_x;
        let dy = coord.y - self.origin_y;
        Coord {
            x: self.a * dx + self.b * dy,
            y: self.c * dx + self.d * dy,
        }
    }
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Determinant of the linear part
    pub fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// Whether the transform can be inverted
    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        det.is_finite() && det.abs() > SINGULAR_EPSILON
    }

    /// Build the inverse transform (geographic -> fractional pixel).
    pub fn inverse(&self) -> Result<PixelTransform> {
        let det = self.determinant();
        if !self.is_invertible() {
            return Err(Error::InvalidTransform { determinant: det });
        }
        Ok(PixelTransform {
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            a: self.pixel_height / det,
            b: -self.row_rotation / det,
            c: -self.col_rotation / det,
            d: self.pixel_width / det,
        })
    }

    /// Geographic coordinates of a fractional pixel position
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Convert pixel coordinates to geographic coordinates
    ///
    /// Returns the coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Convert pixel coordinates to geographic coordinates (top-left corner)
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    /// Convert geographic coordinates to fractional pixel coordinates `(col, row)`.
    ///
    /// Returns NaNs for a singular transform.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        match self.inverse() {
            Ok(inv) => {
                let p = inv.apply(Coord { x, y });
                (p.x, p.y)
            }
            Err(_) => (f64::NAN, f64::NAN),
        }
    }

    /// Area of one cell footprint in CRS units squared
    pub fn cell_area(&self) -> f64 {
        self.determinant().abs()
    }

    /// Geographic footprint of cell `(row, col)` as a closed polygon
    pub fn cell_footprint(&self, row: usize, col: usize) -> Polygon<f64> {
        let corners = [(col, row), (col + 1, row), (col + 1, row + 1), (col, row + 1), (col, row)];
        let ring: Vec<Coord<f64>> = corners
            .iter()
            .map(|&(c, r)| {
                let (x, y) = self.pixel_to_geo_corner(c, r);
                Coord { x, y }
            })
            .collect();
        Polygon::new(LineString::new(ring), vec![])
    }

    /// Calculate the bounding box for a raster of given dimensions
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.pixel_to_geo_corner(0, 0);
        let (x1, y1) = self.pixel_to_geo_corner(width, 0);
        let (x2, y2) = self.pixel_to_geo_corner(0, height);
        let (x3, y3) = self.pixel_to_geo_corner(width, height);

        let min_x = x0.min(x1).min(x2).min(x3);
        let max_x = x0.max(x1).max(x2).max(x3);
        let min_y = y0.min(y1).min(y2).min(y3);
        let max_y = y0.max(y1).max(y2).max(y3);

        (min_x, min_y, max_x, max_y)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
