//! Raster window selection
//!
//! Finds the block of cells whose footprints can intersect a bounding box,
//! so the coverage pass never walks the whole raster.

use geo::{Coord, Rect};
use rasterzones_core::raster::{GeoTransform, PixelTransform};
use rasterzones_core::Result;
use std::ops::RangeInclusive;

/// Inclusive block of raster cells, or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellWindow {
    Empty,
    Cells {
        row_min: usize,
        row_max: usize,
        col_min: usize,
        col_max: usize,
    },
}

impl CellWindow {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellWindow::Empty)
    }

    /// Number of cells in the window
    pub fn len(&self) -> usize {
        match *self {
            CellWindow::Empty => 0,
            CellWindow::Cells {
                row_min,
                row_max,
                col_min,
                col_max,
            } => (row_max - row_min + 1) * (col_max - col_min + 1),
        }
    }

    /// Row indices covered by the window
    pub fn rows(&self) -> Option<RangeInclusive<usize>> {
        match *self {
            CellWindow::Empty => None,
            CellWindow::Cells { row_min, row_max, .. } => Some(row_min..=row_max),
        }
    }

    /// Column indices covered by the window
    pub fn cols(&self) -> Option<RangeInclusive<usize>> {
        match *self {
            CellWindow::Empty => None,
            CellWindow::Cells { col_min, col_max, .. } => Some(col_min..=col_max),
        }
    }
}

/// Select the cells of a `rows × cols` raster that a bbox can touch.
///
/// Fails only for a non-invertible transform. A bbox outside the raster,
/// or one that only touches its border, yields [`CellWindow::Empty`].
pub fn select_window(
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    bbox: &Rect<f64>,
) -> Result<CellWindow> {
    let inverse = transform.inverse()?;
    Ok(pixel_window(&inverse, rows, cols, bbox))
}

pub(crate) fn pixel_window(
    inverse: &PixelTransform,
    rows: usize,
    cols: usize,
    bbox: &Rect<f64>,
) -> CellWindow {
    if rows == 0 || cols == 0 {
        return CellWindow::Empty;
    }

    let (min, max) = (bbox.min(), bbox.max());
    let corners = [
        Coord { x: min.x, y: min.y },
        Coord { x: max.x, y: min.y },
        Coord { x: max.x, y: max.y },
        Coord { x: min.x, y: max.y },
    ];

    let mut col_lo = f64::INFINITY;
    let mut col_hi = f64::NEG_INFINITY;
    let mut row_lo = f64::INFINITY;
    let mut row_hi = f64::NEG_INFINITY;
    for corner in corners {
        let p = inverse.apply(corner);
        if !p.x.is_finite() || !p.y.is_finite() {
            return CellWindow::Empty;
        }
        col_lo = col_lo.min(p.x);
        col_hi = col_hi.max(p.x);
        row_lo = row_lo.min(p.y);
        row_hi = row_hi.max(p.y);
    }

    match (index_span(col_lo, col_hi, cols), index_span(row_lo, row_hi, rows)) {
        (Some((col_min, col_max)), Some((row_min, row_max))) => CellWindow::Cells {
            row_min,
            row_max,
            col_min,
            col_max,
        },
        _ => CellWindow::Empty,
    }
}

/// Cell indices `floor(lo) ..= ceil(hi) - 1` clamped to `[0, n)`.
fn index_span(lo: f64, hi: f64, n: usize) -> Option<(usize, usize)> {
    let first = lo.floor().max(0.0);
    let last = (hi.ceil() - 1.0).min(n as f64 - 1.0);
    if first > last {
        return None;
    }
    Some((first as usize, last as usize))
}
