//! Cell coverage weights
//!
//! The polygon is mapped once into pixel space, where cell `(row, col)` is
//! the unit square `[col, col + 1] × [row, row + 1]`. Affine maps preserve
//! area ratios, so the overlap area measured there is directly the fraction
//! of the cell covered by the polygon, for any invertible transform.
//!
//! Overlaps are exact: each ring is clipped (Sutherland-Hodgman) to the row
//! band, then to each column interval, and the shoelace areas of the pieces
//! are combined, exteriors adding and holes subtracting.

use super::window::pixel_window;
use geo::{Contains, Coord, LineString, MapCoords, MultiPolygon, Point};
use rasterzones_core::raster::{GeoTransform, PixelTransform};
use rasterzones_core::{NamedPolygon, Result};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Coverage fractions at or below this are treated as no contact.
pub const EPSILON: f64 = 1e-9;

/// How cells contribute to a polygon's aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipMode {
    /// Each included cell contributes its full value
    #[default]
    Unweighted,
    /// Each cell contributes in proportion to its covered area
    Weighted,
}

/// Which cells count as inside a polygon in unweighted mode.
///
/// Weighted mode ignores the rule: any cell with coverage above
/// [`EPSILON`] contributes its fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionRule {
    /// Covered area above `EPSILON` of the cell. A polygon that only
    /// touches a cell along an edge or at a corner does not include it.
    #[default]
    AnyOverlap,
    /// The cell centre lies strictly inside the polygon.
    CellCenter,
}

/// A cell and its contribution weight in `(0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellWeight {
    pub row: usize,
    pub col: usize,
    pub weight: f64,
}

/// Compute the contributing cells of a `rows × cols` raster for one polygon.
///
/// Cells are returned in row-major order. Fails only when the transform is
/// not invertible.
pub fn cell_weights(
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
    shape: &NamedPolygon,
    mode: ClipMode,
    rule: InclusionRule,
) -> Result<Vec<CellWeight>> {
    let inverse = transform.inverse()?;
    Ok(pixel_weights(&inverse, rows, cols, shape, mode, rule))
}

pub(crate) fn pixel_weights(
    inverse: &PixelTransform,
    rows: usize,
    cols: usize,
    shape: &NamedPolygon,
    mode: ClipMode,
    rule: InclusionRule,
) -> Vec<CellWeight> {
    let window = pixel_window(inverse, rows, cols, &shape.bbox());
    let (Some(row_range), Some(col_range)) = (window.rows(), window.cols()) else {
        return Vec::new();
    };

    let pixel = PixelShape::new(shape.geometry(), inverse);
    if mode == ClipMode::Unweighted && rule == InclusionRule::CellCenter {
        return pixel.center_cells(row_range, col_range);
    }

    let col_min = *col_range.start();
    let mut overlap = vec![0.0; col_range.end() - col_min + 1];
    let mut weights = Vec::new();

    for row in row_range {
        overlap.iter_mut().for_each(|a| *a = 0.0);
        pixel.accumulate_row(row, col_min, &mut overlap);

        for (offset, &area) in overlap.iter().enumerate() {
            let fraction = area.min(1.0);
            if fraction <= EPSILON {
                continue;
            }
            weights.push(CellWeight {
                row,
                col: col_min + offset,
                weight: match mode {
                    ClipMode::Weighted => fraction,
                    ClipMode::Unweighted => 1.0,
                },
            });
        }
    }

    weights
}

/// One polygon part in pixel coordinates, rings stored open.
struct PixelPart {
    exterior: Vec<Coord<f64>>,
    holes: Vec<Vec<Coord<f64>>>,
    row_min: f64,
    row_max: f64,
}

struct PixelShape {
    parts: Vec<PixelPart>,
    geometry: MultiPolygon<f64>,
}

impl PixelShape {
    fn new(geometry: &MultiPolygon<f64>, inverse: &PixelTransform) -> Self {
        let geometry = geometry.map_coords(|c| inverse.apply(c));
        let parts = geometry
            .iter()
            .map(|polygon| {
                let exterior = open_ring(polygon.exterior());
                let (row_min, row_max) = exterior
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
                        (lo.min(c.y), hi.max(c.y))
                    });
                PixelPart {
                    exterior,
                    holes: polygon.interiors().iter().map(open_ring).collect(),
                    row_min,
                    row_max,
                }
            })
            .collect();
        Self { parts, geometry }
    }

    /// Add the overlap area of every cell in `row` starting at `col_min`.
    fn accumulate_row(&self, row: usize, col_min: usize, overlap: &mut [f64]) {
        let top = row as f64;
        let bottom = top + 1.0;
        let col_max = (col_min + overlap.len() - 1) as f64;

        for part in &self.parts {
            if part.row_max <= top || part.row_min >= bottom {
                continue;
            }
            let exterior = clip_band(&part.exterior, Axis::Row, top, bottom);
            if exterior.len() < 3 {
                continue;
            }
            let holes: Vec<Vec<Coord<f64>>> = part
                .holes
                .iter()
                .map(|hole| clip_band(hole, Axis::Row, top, bottom))
                .filter(|hole| hole.len() >= 3)
                .collect();

            let (x_lo, x_hi) = exterior
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
                    (lo.min(c.x), hi.max(c.x))
                });
            let first = x_lo.floor().max(col_min as f64);
            let last = (x_hi.ceil() - 1.0).min(col_max);
            if first > last {
                continue;
            }

            for col in first as usize..=last as usize {
                let left = col as f64;
                let right = left + 1.0;
                let mut area = ring_area(&clip_band(&exterior, Axis::Col, left, right)).abs();
                for hole in &holes {
                    area -= ring_area(&clip_band(hole, Axis::Col, left, right)).abs();
                }
                overlap[col - col_min] += area.max(0.0);
            }
        }
    }

    fn center_cells(
        &self,
        rows: RangeInclusive<usize>,
        cols: RangeInclusive<usize>,
    ) -> Vec<CellWeight> {
        let mut weights = Vec::new();
        for row in rows {
            for col in cols.clone() {
                let center = Point::new(col as f64 + 0.5, row as f64 + 0.5);
                if self.geometry.contains(&center) {
                    weights.push(CellWeight { row, col, weight: 1.0 });
                }
            }
        }
        weights
    }
}

fn open_ring(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut coords = ring.0.clone();
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    coords
}

/// Signed shoelace area of an open ring
fn ring_area(ring: &[Coord<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let n = ring.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let p = ring[i];
            let q = ring[(i + 1) % n];
            p.x * q.y - q.x * p.y
        })
        .sum();
    twice / 2.0
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    /// Pixel `y`
    Row,
    /// Pixel `x`
    Col,
}

/// Axis-aligned clipping boundary
#[derive(Debug, Clone, Copy)]
enum Edge {
    MinX(f64),
    MaxX(f64),
    MinY(f64),
    MaxY(f64),
}

impl Edge {
    fn is_inside(&self, p: &Coord<f64>) -> bool {
        match *self {
            Edge::MinX(v) => p.x >= v,
            Edge::MaxX(v) => p.x <= v,
            Edge::MinY(v) => p.y >= v,
            Edge::MaxY(v) => p.y <= v,
        }
    }

    fn intersect(&self, p: &Coord<f64>, q: &Coord<f64>) -> Coord<f64> {
        let dx = q.x - p.x;
        let dy = q.y - p.y;
        match *self {
            Edge::MinX(v) | Edge::MaxX(v) => Coord {
                x: v,
                y: p.y + (v - p.x) / dx * dy,
            },
            Edge::MinY(v) | Edge::MaxY(v) => Coord {
                x: p.x + (v - p.y) / dy * dx,
                y: v,
            },
        }
    }
}

/// One Sutherland-Hodgman step against a single boundary
fn clip_edge(vertices: &[Coord<f64>], edge: Edge) -> Vec<Coord<f64>> {
    let n = vertices.len();
    let mut output = Vec::with_capacity(n + 2);

    for i in 0..n {
        let current = &vertices[i];
        let next = &vertices[(i + 1) % n];

        match (edge.is_inside(current), edge.is_inside(next)) {
            (true, true) => output.push(*next),
            (true, false) => output.push(edge.intersect(current, next)),
            (false, true) => {
                output.push(edge.intersect(current, next));
                output.push(*next);
            }
            (false, false) => {}
        }
    }

    output
}

/// Clip a ring to the slab `lo <= axis <= hi`.
fn clip_band(ring: &[Coord<f64>], axis: Axis, lo: f64, hi: f64) -> Vec<Coord<f64>> {
    let (low, high) = match axis {
        Axis::Row => (Edge::MinY(lo), Edge::MaxY(hi)),
        Axis::Col => (Edge::MinX(lo), Edge::MaxX(hi)),
    };
    clip_edge(&clip_edge(ring, low), high)
}
