//! Per-polygon aggregation of raster values over coverage weights

use super::coverage::{CellWeight, ClipMode};
use rasterzones_core::raster::{Raster, RasterElement};
use serde::{Deserialize, Serialize};

/// Whether a polygon reached any raster cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneCoverage {
    Covered,
    /// The polygon does not overlap the raster at all
    NoCoverage,
}

/// Aggregate of one polygon.
///
/// `sum` is the raw value sum (unweighted) or Σ value × weight (weighted);
/// `weight` is the number of contributing cells or Σ weight. `min` and `max`
/// are raw cell values, unaffected by weights. Cells holding nodata are
/// counted in `nodata_cells` and contribute nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneStats {
    pub sum: f64,
    pub weight: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub cells: usize,
    pub nodata_cells: usize,
    pub coverage: ZoneCoverage,
    /// Value-weighted centre `(x, y)` of the contributing cells
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<(f64, f64)>,
}

impl ZoneStats {
    /// Result for a polygon outside the raster
    pub fn no_coverage() -> Self {
        Self {
            sum: 0.0,
            weight: 0.0,
            min: None,
            max: None,
            cells: 0,
            nodata_cells: 0,
            coverage: ZoneCoverage::NoCoverage,
            center: None,
        }
    }

    pub fn is_covered(&self) -> bool {
        self.coverage == ZoneCoverage::Covered
    }

    /// Weighted average `sum / weight`, if any weight was accumulated
    pub fn mean(&self) -> Option<f64> {
        (self.weight > 0.0).then(|| self.sum / self.weight)
    }

    /// Reduce to one reporting value, optionally rounded to an integer.
    ///
    /// A mean with no weight reports 0; min and max with no contributing
    /// cell report NaN.
    pub fn summarize(&self, summary: Summary, round: bool) -> f64 {
        let value = match summary {
            Summary::Sum => self.sum,
            Summary::Mean => self.mean().unwrap_or(0.0),
            Summary::Weight => self.weight,
            Summary::Count => self.cells as f64,
            Summary::Min => self.min.unwrap_or(f64::NAN),
            Summary::Max => self.max.unwrap_or(f64::NAN),
        };
        if round {
            value.round()
        } else {
            value
        }
    }
}

/// Scalar reported per polygon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Summary {
    #[default]
    Sum,
    Mean,
    Weight,
    Count,
    Min,
    Max,
}

/// Neumaier compensated summation
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    pub(crate) fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    pub(crate) fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Fold raster values over a polygon's cell weights.
///
/// An empty weight list means the polygon missed the raster and yields
/// [`ZoneStats::no_coverage`].
pub fn aggregate<T: RasterElement>(
    raster: &Raster<T>,
    cells: &[CellWeight],
    mode: ClipMode,
    with_center: bool,
) -> ZoneStats {
    if cells.is_empty() {
        return ZoneStats::no_coverage();
    }

    let mut sum = CompensatedSum::default();
    let mut weight = CompensatedSum::default();
    let mut center_x = CompensatedSum::default();
    let mut center_y = CompensatedSum::default();
    let mut center_mass = CompensatedSum::default();
    let mut range: Option<(f64, f64)> = None;
    let mut counted = 0usize;
    let mut nodata = 0usize;

    for cell in cells {
        let Some(value) = raster.valid_value(cell.row, cell.col) else {
            nodata += 1;
            continue;
        };
        let w = match mode {
            ClipMode::Unweighted => 1.0,
            ClipMode::Weighted => cell.weight,
        };
        sum.add(value * w);
        weight.add(w);
        counted += 1;
        range = Some(match range {
            Some((lo, hi)) => (lo.min(value), hi.max(value)),
            None => (value, value),
        });

        if with_center && value > 0.0 {
            let (x, y) = raster.pixel_to_geo(cell.col, cell.row);
            let mass = value * w;
            center_x.add(x * mass);
            center_y.add(y * mass);
            center_mass.add(mass);
        }
    }

    let mass = center_mass.value();
    let center = (with_center && mass > 0.0)
        .then(|| (center_x.value() / mass, center_y.value() / mass));

    ZoneStats {
        sum: sum.value(),
        weight: weight.value(),
        min: range.map(|(lo, _)| lo),
        max: range.map(|(_, hi)| hi),
        cells: counted,
        nodata_cells: nodata,
        coverage: ZoneCoverage::Covered,
        center,
    }
}
