//! Seed point layouts for polygon subdivision
//!
//! Every layout is deterministic: the same shape, zone count and layout
//! always yield the same seeds.

use crate::maybe_rayon::*;
use geo::{Contains, Coord, Point, Rect};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rasterzones_core::NamedPolygon;

/// Grid densifications tried before settling for fewer inside points
const MAX_GRID_ATTEMPTS: usize = 6;

/// Longest-to-shortest side ratio accepted for an exact `nx × ny` lattice
const MAX_CELL_SKEW: f64 = 4.0;

/// How seed points are placed inside a polygon
#[derive(Debug, Clone, PartialEq)]
pub enum SeedLayout {
    /// Regular grid over the bounding box, points at grid-cell centres
    Grid,
    /// The grid with each point displaced within `amount` (0..=1) of its
    /// grid cell
    Jittered { seed: u64, amount: f64 },
    /// Lloyd's k-means over a dense sample grid inside the polygon,
    /// producing one centre per zone
    KMeans {
        seed: u64,
        samples_per_zone: usize,
        max_iterations: usize,
    },
}

impl Default for SeedLayout {
    fn default() -> Self {
        SeedLayout::Grid
    }
}

impl SeedLayout {
    /// k-means with 250 samples per zone
    pub fn kmeans(seed: u64) -> Self {
        SeedLayout::KMeans {
            seed,
            samples_per_zone: 250,
            max_iterations: 300,
        }
    }
}

/// Place roughly `zones` seed points strictly inside `shape`.
///
/// Grid layouts first try an `nx × ny == zones` lattice with near-square
/// cells; when that misses they keep every point of a denser lattice that
/// falls inside the polygon, so the count can then be off by a few. The
/// k-means layout returns exactly `zones` centres whenever the polygon holds
/// more sample points than that. An empty result means no point landed
/// inside.
pub fn generate_seeds(shape: &NamedPolygon, zones: usize, layout: &SeedLayout) -> Vec<Coord<f64>> {
    if zones == 0 {
        return Vec::new();
    }
    match *layout {
        SeedLayout::Grid => grid_seeds(shape, zones, None),
        SeedLayout::Jittered { seed, amount } => {
            grid_seeds(shape, zones, Some((seed, amount.clamp(0.0, 1.0))))
        }
        SeedLayout::KMeans {
            seed,
            samples_per_zone,
            max_iterations,
        } => {
            let count = (zones * samples_per_zone.max(1)) as f64;
            let samples = Lattice::over(&shape.bbox(), count).inside(shape, None);
            if samples.len() <= zones {
                return samples;
            }
            kmeans(&samples, zones, seed, max_iterations)
        }
    }
}

fn grid_seeds(shape: &NamedPolygon, zones: usize, jitter: Option<(u64, f64)>) -> Vec<Coord<f64>> {
    let bbox = shape.bbox();
    if let Some(lattice) = Lattice::exact(&bbox, zones) {
        let points = lattice.inside(shape, jitter);
        if points.len() == zones {
            return points;
        }
    }

    let fill = (bbox.width() * bbox.height() / shape.area()).max(1.0);
    let mut count = zones as f64 * fill;
    let mut best = Vec::new();

    for _ in 0..MAX_GRID_ATTEMPTS {
        let points = Lattice::over(&bbox, count).inside(shape, jitter);
        if points.len() >= zones {
            return points;
        }
        if points.len() > best.len() {
            best = points;
        }
        count *= 2.0;
    }
    best
}

/// Cell-centred point lattice over a rectangle
struct Lattice {
    origin: Coord<f64>,
    nx: usize,
    ny: usize,
    dx: f64,
    dy: f64,
}

impl Lattice {
    /// About `count` points, spaced evenly in both directions
    fn over(bbox: &Rect<f64>, count: f64) -> Self {
        let (w, h) = (bbox.width(), bbox.height());
        let count = count.max(1.0);
        let nx = ((count * w / h).sqrt().round().max(1.0)).min(count.ceil()) as usize;
        let ny = (count / nx as f64).ceil().max(1.0) as usize;
        Self {
            origin: bbox.min(),
            nx,
            ny,
            dx: w / nx as f64,
            dy: h / ny as f64,
        }
    }

    /// Exactly `count` points as the factor pair with the squarest cells
    fn exact(bbox: &Rect<f64>, count: usize) -> Option<Self> {
        let (w, h) = (bbox.width(), bbox.height());
        (1..=count)
            .filter(|nx| count % nx == 0)
            .map(|nx| {
                let ny = count / nx;
                let aspect = (w / nx as f64) / (h / ny as f64);
                (aspect.max(aspect.recip()), nx, ny)
            })
            .filter(|(skew, _, _)| *skew <= MAX_CELL_SKEW)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, nx, ny)| Self {
                origin: bbox.min(),
                nx,
                ny,
                dx: w / nx as f64,
                dy: h / ny as f64,
            })
    }

    fn inside(&self, shape: &NamedPolygon, jitter: Option<(u64, f64)>) -> Vec<Coord<f64>> {
        let mut rng = jitter.map(|(seed, _)| StdRng::seed_from_u64(seed));
        let amount = jitter.map_or(0.0, |(_, a)| a);
        let mut points = Vec::new();

        for j in 0..self.ny {
            for i in 0..self.nx {
                let (mut fx, mut fy) = (i as f64 + 0.5, j as f64 + 0.5);
                if let Some(rng) = rng.as_mut() {
                    fx += rng.gen_range(-0.5..0.5) * amount;
                    fy += rng.gen_range(-0.5..0.5) * amount;
                }
                let p = Coord {
                    x: self.origin.x + fx * self.dx,
                    y: self.origin.y + fy * self.dy,
                };
                if shape.geometry().contains(&Point::from(p)) {
                    points.push(p);
                }
            }
        }
        points
    }
}

fn dist2(a: &Coord<f64>, b: &Coord<f64>) -> f64 {
    let (dx, dy) = (a.x - b.x, a.y - b.y);
    dx * dx + dy * dy
}

fn nearest(centers: &[Coord<f64>], p: &Coord<f64>) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (k, c) in centers.iter().enumerate() {
        let d = dist2(c, p);
        if d < best_dist {
            best_dist = d;
            best = k;
        }
    }
    best
}

/// Lloyd's algorithm with k-means++ initialisation
fn kmeans(points: &[Coord<f64>], k: usize, seed: u64, max_iterations: usize) -> Vec<Coord<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centers = init_plus_plus(points, k, &mut rng);

    let (lo, hi) = points.iter().fold(
        (
            Coord { x: f64::INFINITY, y: f64::INFINITY },
            Coord { x: f64::NEG_INFINITY, y: f64::NEG_INFINITY },
        ),
        |(lo, hi), p| {
            (
                Coord { x: lo.x.min(p.x), y: lo.y.min(p.y) },
                Coord { x: hi.x.max(p.x), y: hi.y.max(p.y) },
            )
        },
    );
    let tolerance = (dist2(&lo, &hi).sqrt() * 1e-9).powi(2);

    for _ in 0..max_iterations {
        let labels: Vec<usize> = points
            .par_iter()
            .map(|p| nearest(&centers, p))
            .collect();

        let mut sums = vec![Coord { x: 0.0, y: 0.0 }; centers.len()];
        let mut counts = vec![0usize; centers.len()];
        for (p, &label) in points.iter().zip(&labels) {
            sums[label].x += p.x;
            sums[label].y += p.y;
            counts[label] += 1;
        }

        let mut max_shift = 0.0_f64;
        for (k, center) in centers.iter_mut().enumerate() {
            // Empty clusters keep their centre
            if counts[k] == 0 {
                continue;
            }
            let moved = Coord {
                x: sums[k].x / counts[k] as f64,
                y: sums[k].y / counts[k] as f64,
            };
            max_shift = max_shift.max(dist2(center, &moved));
            *center = moved;
        }

        if max_shift <= tolerance {
            break;
        }
    }

    centers
}

fn init_plus_plus(points: &[Coord<f64>], k: usize, rng: &mut StdRng) -> Vec<Coord<f64>> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);
    let mut d2: Vec<f64> = points.iter().map(|p| dist2(p, &centers[0])).collect();

    while centers.len() < k {
        let total: f64 = d2.iter().sum();
        if total <= 0.0 {
            break;
        }
        let target = rng.gen::<f64>() * total;
        let mut acc = 0.0;
        let mut pick = points.len() - 1;
        for (i, &d) in d2.iter().enumerate() {
            acc += d;
            if acc >= target && d > 0.0 {
                pick = i;
                break;
            }
        }
        let center = points[pick];
        for (d, p) in d2.iter_mut().zip(points) {
            *d = d.min(dist2(p, &center));
        }
        centers.push(center);
    }
    centers
}
