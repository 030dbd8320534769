//! Bounded Voronoi cells by half-plane clipping
//!
//! Each site's cell starts as the frame rectangle and is cut by the
//! perpendicular bisector with every other site, nearest first. Once the
//! next site is farther than twice the cell's radius no bisector can cut
//! the cell any more and the loop stops. Cells are convex.

use crate::maybe_rayon::*;
use geo::{Coord, LineString, Polygon, Rect};

/// Voronoi cell of every site within `frame`, in site order.
///
/// A site repeating an earlier one gets an empty polygon, so cells never
/// overlap.
pub fn voronoi_cells(sites: &[Coord<f64>], frame: &Rect<f64>) -> Vec<Polygon<f64>> {
    (0..sites.len())
        .into_par_iter()
        .map(|i| {
            let ring = cell_ring(sites, i, frame);
            if ring.len() < 3 {
                return Polygon::new(LineString::new(vec![]), vec![]);
            }
            // Polygon::new closes the ring
            Polygon::new(LineString::new(ring), vec![])
        })
        .collect()
}

fn cell_ring(sites: &[Coord<f64>], i: usize, frame: &Rect<f64>) -> Vec<Coord<f64>> {
    let site = sites[i];
    let (min, max) = (frame.min(), frame.max());
    let mut cell = vec![
        min,
        Coord { x: max.x, y: min.y },
        max,
        Coord { x: min.x, y: max.y },
    ];

    let mut others: Vec<(f64, usize)> = sites
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(j, other)| (dist2(&site, other), j))
        .collect();
    others.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut radius2 = max_dist2(&cell, &site);
    for (d2, j) in others {
        if d2 == 0.0 {
            if j < i {
                return Vec::new();
            }
            continue;
        }
        if d2 / 4.0 >= radius2 {
            break;
        }
        cell = clip_half_plane(&cell, site, sites[j]);
        if cell.len() < 3 {
            return Vec::new();
        }
        radius2 = max_dist2(&cell, &site);
    }
    cell
}

fn dist2(a: &Coord<f64>, b: &Coord<f64>) -> f64 {
    let (dx, dy) = (a.x - b.x, a.y - b.y);
    dx * dx + dy * dy
}

fn max_dist2(cell: &[Coord<f64>], site: &Coord<f64>) -> f64 {
    cell.iter().map(|c| dist2(c, site)).fold(0.0, f64::max)
}

/// Keep the part of a convex ring closer to `site` than to `other`.
fn clip_half_plane(ring: &[Coord<f64>], site: Coord<f64>, other: Coord<f64>) -> Vec<Coord<f64>> {
    let normal = Coord {
        x: other.x - site.x,
        y: other.y - site.y,
    };
    let mid = Coord {
        x: (site.x + other.x) / 2.0,
        y: (site.y + other.y) / 2.0,
    };
    let side = |p: &Coord<f64>| (p.x - mid.x) * normal.x + (p.y - mid.y) * normal.y;

    let n = ring.len();
    let mut output = Vec::with_capacity(n + 1);
    for k in 0..n {
        let current = ring[k];
        let next = ring[(k + 1) % n];
        let (sc, sn) = (side(&current), side(&next));

        if sc <= 0.0 {
            output.push(current);
        }
        if (sc < 0.0 && sn > 0.0) || (sc > 0.0 && sn < 0.0) {
            let t = sc / (sc - sn);
            output.push(Coord {
                x: current.x + t * (next.x - current.x),
                y: current.y + t * (next.y - current.y),
            });
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{coord, Area};

    fn frame() -> Rect<f64> {
        Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 })
    }

    #[test]
    fn test_single_site_is_frame() {
        let cells = voronoi_cells(&[coord! { x: 3.0, y: 4.0 }], &frame());
        assert_relative_eq!(cells[0].unsigned_area(), 100.0);
    }

    #[test]
    fn test_quadrants() {
        let sites = [
            coord! { x: 2.5, y: 2.5 },
            coord! { x: 7.5, y: 2.5 },
            coord! { x: 2.5, y: 7.5 },
            coord! { x: 7.5, y: 7.5 },
        ];
        let cells = voronoi_cells(&sites, &frame());
        for cell in &cells {
            assert_relative_eq!(cell.unsigned_area(), 25.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_cells_partition_frame() {
        let sites = [
            coord! { x: 1.0, y: 1.0 },
            coord! { x: 8.0, y: 2.0 },
            coord! { x: 4.0, y: 6.0 },
            coord! { x: 9.0, y: 9.0 },
            coord! { x: 2.0, y: 8.5 },
        ];
        let total: f64 = voronoi_cells(&sites, &frame())
            .iter()
            .map(|c| c.unsigned_area())
            .sum();
        assert_relative_eq!(total, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_duplicate_site_gets_empty_cell() {
        let sites = [coord! { x: 2.0, y: 2.0 }, coord! { x: 2.0, y: 2.0 }];
        let cells = voronoi_cells(&sites, &frame());
        assert_relative_eq!(cells[0].unsigned_area(), 100.0);
        assert_eq!(cells[1].unsigned_area(), 0.0);
    }
}
