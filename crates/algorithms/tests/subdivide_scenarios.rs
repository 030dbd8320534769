//! Subdivision scenarios: partition properties on simple and concave shapes.

use approx::assert_relative_eq;
use indexmap::IndexMap;
use geo::{polygon, Area, BooleanOps, MultiPolygon, Polygon};
use rasterzones_algorithms::subdivide::{
    subdivide_collection, subdivide_polygon, SeedLayout, SubdivideParams, ZoneTarget,
};
use rasterzones_core::io::{shapes_from_geojson_str, shapes_to_geojson_string};
use rasterzones_core::vector::normalize;
use rasterzones_core::{NamedPolygon, NoReprojection, PolygonCollection};

fn square(name: &str, size: f64) -> NamedPolygon {
    let poly: Polygon<f64> = polygon![
        (x: 0.0, y: 0.0),
        (x: size, y: 0.0),
        (x: size, y: size),
        (x: 0.0, y: size),
    ];
    NamedPolygon::new(name, poly).unwrap()
}

fn comb() -> NamedPolygon {
    // Three teeth joined along the bottom, with a hole in the base
    let poly: Polygon<f64> = polygon!(
        exterior: [
            (x: 0.0, y: 0.0), (x: 9.0, y: 0.0), (x: 9.0, y: 8.0), (x: 7.0, y: 8.0),
            (x: 7.0, y: 3.0), (x: 5.5, y: 3.0), (x: 5.5, y: 8.0), (x: 3.5, y: 8.0),
            (x: 3.5, y: 3.0), (x: 2.0, y: 3.0), (x: 2.0, y: 8.0), (x: 0.0, y: 8.0),
        ],
        interiors: [[(x: 4.0, y: 1.0), (x: 5.0, y: 1.0), (x: 5.0, y: 2.0), (x: 4.0, y: 2.0)]],
    );
    NamedPolygon::new("comb", poly).unwrap()
}

fn assert_partition(parent: &NamedPolygon, zones: &PolygonCollection) {
    let total: f64 = zones.iter().map(|z| z.area()).sum();
    assert_relative_eq!(total, parent.area(), epsilon = 1e-6 * parent.area());

    let zones: Vec<&NamedPolygon> = zones.iter().collect();
    for (i, a) in zones.iter().enumerate() {
        for b in &zones[i + 1..] {
            let overlap: MultiPolygon<f64> = a.geometry().intersection(b.geometry());
            assert!(
                overlap.unsigned_area() < 1e-6 * parent.area(),
                "{} and {} overlap",
                a.name(),
                b.name()
            );
        }
    }
}

#[test]
fn square_into_four_grid_zones() {
    let parent = square("sq", 10.0);
    let params = SubdivideParams {
        target: ZoneTarget::Count(4),
        seeds: SeedLayout::Grid,
        ..Default::default()
    };
    let sub = subdivide_polygon(&parent, &params).unwrap();
    assert_eq!(sub.zones.len(), 4);
    for zone in sub.zones.iter() {
        assert_relative_eq!(zone.area(), 25.0, epsilon = 1e-9);
    }
    assert_partition(&parent, &sub.zones);
}

#[test]
fn concave_shape_with_hole_every_layout() {
    let parent = comb();
    let layouts = [
        SeedLayout::Grid,
        SeedLayout::Jittered { seed: 11, amount: 0.6 },
        SeedLayout::KMeans {
            seed: 4,
            samples_per_zone: 120,
            max_iterations: 100,
        },
    ];
    for layout in layouts {
        let params = SubdivideParams {
            target: ZoneTarget::AreaPerZone(8.0),
            seeds: layout,
            ..Default::default()
        };
        let sub = subdivide_polygon(&parent, &params).unwrap();
        assert!(sub.zones.len() >= 2);
        assert_eq!(sub.zones.len(), sub.seeds.len());
        assert_partition(&parent, &sub.zones);
    }
}

#[test]
fn kmeans_is_reproducible() {
    let params = SubdivideParams {
        target: ZoneTarget::Count(6),
        seeds: SeedLayout::kmeans(4),
        ..Default::default()
    };
    let a = subdivide_polygon(&comb(), &params).unwrap();
    let b = subdivide_polygon(&comb(), &params).unwrap();
    assert_eq!(a.zones.len(), 6);
    assert_eq!(a.seeds, b.seeds);
    for (za, zb) in a.zones.iter().zip(b.zones.iter()) {
        assert_eq!(za.geometry(), zb.geometry());
    }
}

#[test]
fn geojson_round_trip_of_zones() {
    let text = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"DOTNAME": "AFRO:NGA"},
             "geometry": {"type": "Polygon", "coordinates": [[[3,6],[4,6],[4,7],[3,7],[3,6]]]}}
        ]
    }"#;
    let shapes = shapes_from_geojson_str(text, "DOTNAME").unwrap();
    let parents = normalize(shapes.input, None, &NoReprojection)
        .unwrap()
        .into_strict()
        .unwrap();

    // About 12 300 km² split into 2 500 km² zones
    let params = SubdivideParams {
        target: ZoneTarget::AreaPerZoneKm2(2_500.0),
        seeds: SeedLayout::kmeans(4),
        ..Default::default()
    };
    let report = subdivide_collection(&parents, &params);
    assert!(report.failures.is_empty());
    assert_eq!(report.zones.len(), 5);
    assert!(report.zones.names().all(|n| n.starts_with("AFRO:NGA:A000")));
    assert_partition(parents.get("AFRO:NGA").unwrap(), &report.zones);

    let out = shapes_to_geojson_string(&report.zones, "DOTNAME", &IndexMap::new());
    let back = shapes_from_geojson_str(&out, "DOTNAME").unwrap();
    let back = normalize(back.input, None, &NoReprojection)
        .unwrap()
        .into_strict()
        .unwrap();
    assert_eq!(
        back.names().collect::<Vec<_>>(),
        report.zones.names().collect::<Vec<_>>()
    );
}
