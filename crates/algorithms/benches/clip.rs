//! Benchmarks for raster clipping

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geo::{Coord, LineString, Polygon};
use rasterzones_algorithms::clip::{clip_raster, ClipParams};
use rasterzones_core::{GeoTransform, NamedPolygon, PolygonCollection, Raster};

fn create_raster(size: usize) -> Raster<f64> {
    let mut r = Raster::new(size, size);
    r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
    for row in 0..size {
        for col in 0..size {
            r.set(row, col, ((row * 7 + col * 13) % 200) as f64).unwrap();
        }
    }
    r
}

/// `count` star-shaped polygons with 64 vertices tiled over the raster
fn create_shapes(size: usize, count: usize) -> PolygonCollection {
    let per_side = (count as f64).sqrt().ceil() as usize;
    let step = size as f64 / per_side as f64;
    let shapes = (0..count).map(|k| {
        let cx = (k % per_side) as f64 * step + step / 2.0;
        let cy = (k / per_side) as f64 * step + step / 2.0;
        let ring: Vec<Coord<f64>> = (0..64)
            .map(|i| {
                let a = i as f64 / 64.0 * std::f64::consts::TAU;
                let r = if i % 2 == 0 { 0.45 } else { 0.3 } * step;
                Coord { x: cx + r * a.cos(), y: cy + r * a.sin() }
            })
            .collect();
        NamedPolygon::new(format!("s{}", k), Polygon::new(LineString::new(ring), vec![])).unwrap()
    });
    PolygonCollection::from_shapes(shapes, None).unwrap()
}

fn bench_clip(c: &mut Criterion) {
    let mut group = c.benchmark_group("clip");
    for size in [256, 1024] {
        let raster = create_raster(size);
        let shapes = create_shapes(size, 64);
        group.bench_with_input(BenchmarkId::new("unweighted", size), &size, |b, _| {
            b.iter(|| clip_raster(black_box(&raster), black_box(&shapes), &ClipParams::default()).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("weighted", size), &size, |b, _| {
            b.iter(|| clip_raster(black_box(&raster), black_box(&shapes), &ClipParams::weighted()).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_clip);
criterion_main!(benches);
