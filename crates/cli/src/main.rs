//! rasterzones CLI - raster aggregation over named shapes and shape subdivision

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use rasterzones_algorithms::clip::{clip_shapes, ClipMode, ClipParams, InclusionRule, Summary};
use rasterzones_algorithms::measure::ShapeSummary;
use rasterzones_algorithms::subdivide::{
    subdivide_collection, SeedLayout, SubdivideParams, SubdivisionReport, ZoneTarget,
};
use rasterzones_core::io::{
    read_geotiff, read_shapes_geojson, write_points_geojson, write_shapes_geojson,
    DEFAULT_NAME_ATTR,
};
use rasterzones_core::vector::{normalize, Rejected};
use rasterzones_core::{NoReprojection, PolygonCollection, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "rasterzones")]
#[command(author, version, about = "Aggregate rasters over named shapes and subdivide shapes", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sum raster values inside each shape of a GeoJSON layer
    Clip {
        /// Input raster (GeoTIFF)
        raster: PathBuf,
        /// Input shapes (GeoJSON FeatureCollection)
        shapes: PathBuf,
        /// Feature property holding the shape name
        #[arg(long, default_value = DEFAULT_NAME_ATTR)]
        attr: String,
        /// Weight cells by the fraction of their area inside the shape
        #[arg(long)]
        weighted: bool,
        /// Unweighted inclusion rule: any (overlap), center (cell centre inside)
        #[arg(long, default_value = "any")]
        rule: String,
        /// Reported value: sum, mean, weight, count, min, max
        #[arg(long, default_value = "sum")]
        stat: String,
        /// Round reported values to integers
        #[arg(long)]
        round: bool,
        /// Also report the value-weighted centre of each shape
        #[arg(long)]
        center: bool,
        /// Report every statistic instead of a single value
        #[arg(long)]
        full: bool,
        /// Output JSON file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Split each shape of a GeoJSON layer into near-equal-area zones
    Subdivide {
        /// Input shapes (GeoJSON FeatureCollection)
        shapes: PathBuf,
        /// Output zones (GeoJSON)
        output: PathBuf,
        /// Feature property holding the shape name
        #[arg(long, default_value = DEFAULT_NAME_ATTR)]
        attr: String,
        /// Exact number of zones per shape
        #[arg(long, conflicts_with_all = ["area", "area_km2"])]
        zones: Option<usize>,
        /// Zone area in CRS units squared
        #[arg(long, conflicts_with = "area_km2")]
        area: Option<f64>,
        /// Zone area in km² (lon/lat shapes; default 100)
        #[arg(long)]
        area_km2: Option<f64>,
        /// Seed layout: grid, jittered, kmeans
        #[arg(long, default_value = "grid")]
        layout: String,
        /// Random seed for the jittered and kmeans layouts
        #[arg(long, default_value_t = 4)]
        seed: u64,
        /// Only subdivide the first N shapes
        #[arg(long)]
        limit: Option<usize>,
        /// Maximum zones per shape
        #[arg(long, default_value_t = 10_000)]
        max_zones: usize,
        /// Also write the zone seed points (GeoJSON)
        #[arg(long)]
        centers: Option<PathBuf>,
    },
    /// Show parts, areas and extents of the shapes in a GeoJSON layer
    Info {
        /// Input shapes (GeoJSON FeatureCollection)
        shapes: PathBuf,
        /// Feature property holding the shape name
        #[arg(long, default_value = DEFAULT_NAME_ATTR)]
        attr: String,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Raster: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

/// Feature attributes keyed by shape name
type Attributes = IndexMap<String, Map<String, Value>>;

fn read_shapes(path: &Path, attr: &str) -> Result<(PolygonCollection, Attributes)> {
    let pb = spinner("Reading shapes...");
    let layer = read_shapes_geojson(path, attr)
        .with_context(|| format!("Failed to read shapes {}", path.display()))?;
    let normalized =
        normalize(layer.input, None, &NoReprojection).context("Failed to prepare shapes")?;
    pb.finish_and_clear();
    report_rejected(&normalized.rejected);
    info!("Shapes: {}", normalized.collection.len());
    Ok((normalized.collection, layer.properties))
}

/// Every zone carries its parent's attributes
fn inherit_attributes(report: &SubdivisionReport, parents: &Attributes) -> Attributes {
    report
        .parents
        .iter()
        .filter_map(|(zone, parent)| Some((zone.clone(), parents.get(parent)?.clone())))
        .collect()
}

fn report_rejected(rejected: &[Rejected]) {
    for r in rejected {
        warn!("Skipped {}: {}", r.name, r.error);
    }
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn write_json(value: &Value, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", text);
            Ok(())
        }
    }
}

fn parse_rule(s: &str) -> Result<InclusionRule> {
    match s.to_lowercase().as_str() {
        "any" | "overlap" => Ok(InclusionRule::AnyOverlap),
        "center" | "centre" => Ok(InclusionRule::CellCenter),
        _ => anyhow::bail!("Unknown rule: {}. Use any or center.", s),
    }
}

fn parse_summary(s: &str) -> Result<Summary> {
    match s.to_lowercase().as_str() {
        "sum" => Ok(Summary::Sum),
        "mean" | "avg" => Ok(Summary::Mean),
        "weight" => Ok(Summary::Weight),
        "count" => Ok(Summary::Count),
        "min" => Ok(Summary::Min),
        "max" => Ok(Summary::Max),
        _ => anyhow::bail!("Unknown stat: {}. Use sum, mean, weight, count, min or max.", s),
    }
}

fn parse_layout(s: &str, seed: u64) -> Result<SeedLayout> {
    match s.to_lowercase().as_str() {
        "grid" => Ok(SeedLayout::Grid),
        "jittered" | "jitter" => Ok(SeedLayout::Jittered { seed, amount: 0.5 }),
        "kmeans" | "k-means" => Ok(SeedLayout::kmeans(seed)),
        _ => anyhow::bail!("Unknown layout: {}. Use grid, jittered, or kmeans.", s),
    }
}

fn zone_target(zones: Option<usize>, area: Option<f64>, area_km2: Option<f64>) -> ZoneTarget {
    match (zones, area, area_km2) {
        (Some(n), _, _) => ZoneTarget::Count(n),
        (None, Some(a), _) => ZoneTarget::AreaPerZone(a),
        (None, None, Some(a)) => ZoneTarget::AreaPerZoneKm2(a),
        (None, None, None) => ZoneTarget::default(),
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Clip ─────────────────────────────────────────────────────
        Commands::Clip {
            raster,
            shapes,
            attr,
            weighted,
            rule,
            stat,
            round,
            center,
            full,
            output,
        } => {
            let params = ClipParams {
                mode: if weighted {
                    ClipMode::Weighted
                } else {
                    ClipMode::Unweighted
                },
                rule: parse_rule(&rule)?,
                with_center: center,
            };
            let summary = parse_summary(&stat)?;
            let grid = read_raster(&raster)?;
            let layer = read_shapes_geojson(&shapes, &attr)
                .with_context(|| format!("Failed to read shapes {}", shapes.display()))?;

            let start = Instant::now();
            let pb = spinner("Clipping...");
            let report = clip_shapes(&grid, layer.input, &NoReprojection, &params)
                .context("Clipping failed")?;
            pb.finish_and_clear();
            report_rejected(&report.rejected);

            let values: serde_json::Map<String, Value> = report
                .zones
                .iter()
                .map(|(name, stats)| {
                    let value = if full {
                        serde_json::to_value(stats).unwrap_or(Value::Null)
                    } else {
                        let reported = stats.summarize(summary, round);
                        match stats.center {
                            Some((x, y)) if center => json!({ "value": reported, "x": x, "y": y }),
                            _ => json!(reported),
                        }
                    };
                    (name.clone(), value)
                })
                .collect();
            write_json(&Value::Object(values), output.as_deref())?;

            info!(
                "Clipped {} shapes in {:.2?}",
                report.zones.len(),
                start.elapsed()
            );
        }

        // ── Subdivide ────────────────────────────────────────────────
        Commands::Subdivide {
            shapes,
            output,
            attr,
            zones,
            area,
            area_km2,
            layout,
            seed,
            limit,
            max_zones,
            centers,
        } => {
            let params = SubdivideParams {
                target: zone_target(zones, area, area_km2),
                seeds: parse_layout(&layout, seed)?,
                max_zones,
                limit,
            };
            let (parents, attributes) = read_shapes(&shapes, &attr)?;

            let start = Instant::now();
            let pb = spinner("Subdividing...");
            let report = subdivide_collection(&parents, &params);
            pb.finish_and_clear();
            report_rejected(&report.failures);

            let zone_attributes = inherit_attributes(&report, &attributes);
            write_shapes_geojson(&output, &report.zones, &attr, &zone_attributes)
                .context("Failed to write zones")?;
            if let Some(path) = &centers {
                write_points_geojson(path, &report.seeds, &attr, report.zones.crs())
                    .context("Failed to write centers")?;
                println!("Centers saved to: {}", path.display());
            }
            println!("{} zones from {} shapes", report.zones.len(), parents.len());
            done("Zones", &output, start.elapsed());
        }

        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { shapes, attr, json } => {
            let (collection, _) = read_shapes(&shapes, &attr)?;
            let summaries: Vec<ShapeSummary> = collection.iter().map(ShapeSummary::of).collect();

            if json {
                write_json(&serde_json::to_value(&summaries)?, None)?;
                return Ok(());
            }

            println!("File: {}", shapes.display());
            if let Some(crs) = collection.crs() {
                println!("CRS: {}", crs);
            }
            println!("Shapes: {}", collection.len());
            for s in &summaries {
                println!("\n{}", s.name);
                println!("  Parts: {}", s.parts);
                println!("  Area: {:.6} ({:.2} km²)", s.area, s.area_km2);
                println!("  Perimeter: {:.6}", s.perimeter);
                if let Some((x, y)) = s.center {
                    println!("  Center: ({:.6}, {:.6})", x, y);
                }
                println!(
                    "  Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                    s.bbox.0, s.bbox.1, s.bbox.2, s.bbox.3
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parsers() {
        assert_eq!(parse_rule("center").unwrap(), InclusionRule::CellCenter);
        assert_eq!(parse_summary("MEAN").unwrap(), Summary::Mean);
        assert_eq!(parse_summary("max").unwrap(), Summary::Max);
        assert!(parse_summary("median").is_err());
        assert_eq!(
            parse_layout("kmeans", 9).unwrap(),
            SeedLayout::KMeans {
                seed: 9,
                samples_per_zone: 250,
                max_iterations: 300
            }
        );
        assert!(parse_layout("hex", 0).is_err());
    }

    #[test]
    fn test_zone_target_precedence() {
        assert_eq!(zone_target(Some(3), None, None), ZoneTarget::Count(3));
        assert_eq!(zone_target(None, Some(5.0), None), ZoneTarget::AreaPerZone(5.0));
        assert_eq!(zone_target(None, None, None), ZoneTarget::AreaPerZoneKm2(100.0));
    }

    #[test]
    fn test_zones_inherit_parent_attributes() {
        let layer = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"DOTNAME": "P", "POP": 1200},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[4,0],[4,2],[0,2],[0,0]]]}}
            ]
        }"#;
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("parents.geojson");
        let output = dir.path().join("zones.geojson");
        std::fs::write(&input, layer).unwrap();

        let (parents, attributes) = read_shapes(&input, DEFAULT_NAME_ATTR).unwrap();
        let params = SubdivideParams {
            target: ZoneTarget::Count(2),
            ..Default::default()
        };
        let report = subdivide_collection(&parents, &params);
        let zone_attributes = inherit_attributes(&report, &attributes);
        write_shapes_geojson(&output, &report.zones, DEFAULT_NAME_ATTR, &zone_attributes).unwrap();

        let back = read_shapes_geojson(&output, DEFAULT_NAME_ATTR).unwrap();
        assert_eq!(back.properties.len(), 2);
        for (name, props) in &back.properties {
            assert!(name.starts_with("P:A000"));
            assert_eq!(props["POP"], json!(1200));
            assert_eq!(props["DOTNAME"], json!(name));
        }
    }

    #[test]
    fn test_write_json_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&json!({ "AFRO:A": 3.0 }), Some(&path)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("AFRO:A"));
    }
}
