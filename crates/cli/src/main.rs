//! ForestWatch CLI - district deforestation checks from the terminal

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use geo::{BoundingRect, Geometry};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

use forestwatch_cloud::{StacCatalog, StacSceneSource, StacSourceConfig};
use forestwatch_colormap::{ColormapParams, raster_to_rgba};
use forestwatch_core::io::{write_geotiff, write_rgba_geotiff};
use forestwatch_core::vector::{AttributeValue, Feature, FeatureCollection};
use forestwatch_core::{CRS, GeoTransform, Raster, SceneSource};
use forestwatch_monitor::{
    AnalysisConfig, AnalysisOutcome, DistrictRegistry, LocalCatalog, MonitorSession, RasterBaseline,
    ReportEntry, ReportLevel, ReportReceiver, TreeCoverSource, UniformBaseline, report_channel,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "forestwatch")]
#[command(author, version, about = "Deforestation monitoring for administrative districts", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// GeoJSON FeatureCollection of named district polygons (default: built-in districts)
    #[arg(long, global = true)]
    districts: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the known districts
    Districts,
    /// Run one deforestation check
    Analyze {
        /// District name, e.g. "Kurnool District"
        #[arg(short, long)]
        district: String,
        /// Look-back period in days
        #[arg(short = 'n', long)]
        days: String,
        #[command(flatten)]
        sources: SourceArgs,
        /// Directory for GeoTIFF, GeoJSON and preview output
        #[arg(short, long)]
        export: Option<PathBuf>,
        /// Width in pixels of the exported preview
        #[arg(long, default_value = "1024")]
        preview_width: usize,
    },
    /// Read `district|days` lines from stdin and run each check in the background
    Interactive {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Imagery catalog: pc (Planetary Computer), es (Earth Search), a STAC URL or a local catalog directory
    #[arg(short, long, default_value = "pc")]
    catalog: String,
    #[command(flatten)]
    baseline: BaselineArgs,
    /// TOML analysis configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the NDVI threshold
    #[arg(long, allow_hyphen_values = true)]
    ndvi_threshold: Option<f64>,
    /// Override the forest tree-cover threshold (percent)
    #[arg(long)]
    tree_cover_threshold: Option<f64>,
    /// Override the analysis ground sampling distance (metres)
    #[arg(long)]
    gsd: Option<f64>,
    /// Override the pixel budget
    #[arg(long)]
    max_pixels: Option<u64>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct BaselineArgs {
    /// Percent tree-cover baseline GeoTIFF (e.g. Hansen treecover2000)
    #[arg(long)]
    tree_cover: Option<PathBuf>,
    /// Use the same tree cover percentage everywhere
    #[arg(long)]
    uniform_tree_cover: Option<f64>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")
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

fn load_registry(path: Option<&Path>) -> Result<DistrictRegistry> {
    let Some(path) = path else {
        return Ok(DistrictRegistry::builtin());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read districts from {}", path.display()))?;
    DistrictRegistry::from_geojson(&text).context("Failed to load districts")
}

fn load_config(args: &SourceArgs) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(v) = args.ndvi_threshold {
        config.ndvi_threshold = v;
    }
    if let Some(v) = args.tree_cover_threshold {
        config.tree_cover_threshold = v;
    }
    if let Some(v) = args.gsd {
        config.ground_sampling_distance = v;
    }
    if let Some(v) = args.max_pixels {
        config.max_pixels = v;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Where scenes come from
#[derive(Debug, PartialEq)]
enum ImagerySource {
    Stac(StacCatalog),
    Local(PathBuf),
}

/// Catalog shorthands and http(s) URLs go to STAC; anything else is a local catalog directory
fn resolve_catalog(arg: &str) -> ImagerySource {
    match StacCatalog::from_str_or_url(arg) {
        StacCatalog::Custom(url) => {
            let lower = url.to_ascii_lowercase();
            if lower.starts_with("http://") || lower.starts_with("https://") {
                ImagerySource::Stac(StacCatalog::Custom(url))
            } else {
                ImagerySource::Local(PathBuf::from(url))
            }
        }
        catalog => ImagerySource::Stac(catalog),
    }
}

fn open_source(catalog: &str, config: &AnalysisConfig) -> Result<Box<dyn SceneSource>> {
    match resolve_catalog(catalog) {
        ImagerySource::Stac(stac) => {
            let source = StacSceneSource::new(stac, StacSourceConfig::from(&config.catalog))
                .context("Failed to create STAC client")?;
            Ok(Box::new(source))
        }
        ImagerySource::Local(dir) => {
            let local = LocalCatalog::open(&dir)
                .with_context(|| format!("Failed to open local catalog {}", dir.display()))?;
            Ok(Box::new(local))
        }
    }
}

fn open_baseline(args: &BaselineArgs) -> Result<Box<dyn TreeCoverSource>> {
    match (&args.tree_cover, args.uniform_tree_cover) {
        (Some(path), _) => {
            let pb = spinner("Reading tree cover baseline...");
            let baseline = RasterBaseline::from_path(path)
                .with_context(|| format!("Failed to read tree cover from {}", path.display()))?;
            pb.finish_and_clear();
            let (rows, cols) = baseline.raster().shape();
            info!("Tree cover baseline: {} x {}", cols, rows);
            Ok(Box::new(baseline))
        }
        (None, Some(percent)) => {
            if !(0.0..=100.0).contains(&percent) {
                bail!("Uniform tree cover must be between 0 and 100, got {percent}");
            }
            Ok(Box::new(UniformBaseline::new(percent)))
        }
        (None, None) => bail!("Either --tree-cover or --uniform-tree-cover is required"),
    }
}

fn build_session(registry: DistrictRegistry, args: &SourceArgs) -> Result<(MonitorSession, ReportReceiver)> {
    let config = load_config(args)?;
    let source = open_source(&args.catalog, &config)?;
    let baseline = open_baseline(&args.baseline)?;
    info!(
        "Imagery: {} ({}), baseline: {}",
        args.catalog,
        source.name(),
        baseline.name()
    );
    let (tx, rx) = report_channel();
    Ok((MonitorSession::new(registry, source, baseline, config, tx), rx))
}

fn print_entry(entry: &ReportEntry) {
    match entry.level {
        ReportLevel::Info => println!("{entry}"),
        ReportLevel::Warning => eprintln!("warning: {entry}"),
        ReportLevel::Error => eprintln!("error: {entry}"),
    }
}

/// Parse an interactive `district|days` line; an empty district means none was selected
fn parse_request(line: &str) -> (Option<String>, String) {
    let (district, days) = line.split_once('|').unwrap_or((line, ""));
    let district = district.trim();
    let district = (!district.is_empty()).then(|| district.to_string());
    (district, days.to_string())
}

fn export(session: &MonitorSession, outcome: &AnalysisOutcome, dir: &Path, preview_width: usize) -> Result<()> {
    let pb = spinner("Writing outputs...");
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    write_geotiff(&outcome.composite, dir.join("ndvi_composite.tif")).context("Failed to write NDVI composite")?;
    write_ndvi_preview(&outcome.composite, &dir.join("ndvi_preview.tif"))?;
    write_geotiff(&outcome.classification, dir.join("deforestation.tif"))
        .context("Failed to write deforestation raster")?;
    write_geotiff(&outcome.forest_mask, dir.join("forest_mask.tif")).context("Failed to write forest mask")?;

    std::fs::write(
        dir.join("deforestation.geojson"),
        outcome.features.to_geojson().to_string(),
    )
    .context("Failed to write deforested areas")?;

    let district = session.registry().lookup(&outcome.district)?;
    let mut feature = Feature::new(Geometry::Polygon(district.boundary.clone()));
    feature.set_property("name", AttributeValue::String(district.name.clone()));
    let boundary: FeatureCollection = std::iter::once(feature).collect();
    std::fs::write(dir.join("boundary.geojson"), boundary.to_geojson().to_string())
        .context("Failed to write district boundary")?;

    write_preview(session, &dir.join("preview.tif"), preview_width)?;
    pb.finish_and_clear();
    println!("Outputs saved to: {}", dir.display());
    Ok(())
}

/// NDVI composite coloured brown to green, transparent where there is no data
fn write_ndvi_preview(composite: &Raster<f64>, path: &Path) -> Result<()> {
    let rgba = raster_to_rgba(composite, &ColormapParams::ndvi());
    let (rows, cols) = composite.shape();
    write_rgba_geotiff(&rgba, rows, cols, composite.transform(), composite.crs(), path)
        .context("Failed to write NDVI preview")
}

fn write_preview(session: &MonitorSession, path: &Path, width: usize) -> Result<()> {
    let display = session.display();
    let Some((min_x, min_y, max_x, max_y)) = display.bounds() else {
        return Ok(());
    };
    let (span_x, span_y) = (max_x - min_x, max_y - min_y);
    let width = width.max(1);
    let height = ((width as f64 * span_y / span_x).round() as usize).max(1);

    let canvas = display.render(width, height).context("Failed to render preview")?;
    let transform = GeoTransform::new(min_x, max_y, span_x / width as f64, -span_y / height as f64);
    write_rgba_geotiff(canvas.rgba(), height, width, &transform, Some(&CRS::wgs84()), path)
        .context("Failed to write preview")?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let registry = load_registry(cli.districts.as_deref())?;

    match cli.command {
        // ── Districts ────────────────────────────────────────────────
        Commands::Districts => {
            for district in registry.iter() {
                match district.boundary.bounding_rect() {
                    Some(r) => println!(
                        "{:<24} ({:.3}, {:.3}) - ({:.3}, {:.3})",
                        district.name,
                        r.min().x,
                        r.min().y,
                        r.max().x,
                        r.max().y
                    ),
                    None => println!("{}", district.name),
                }
            }
        }

        // ── Analyze ──────────────────────────────────────────────────
        Commands::Analyze {
            district,
            days,
            sources,
            export: export_dir,
            preview_width,
        } => {
            let (session, reports) = build_session(registry, &sources)?;

            let start = Instant::now();
            let pb = spinner(&format!("Checking deforestation in {district}..."));
            let result = session.check_deforestation(Some(&district), &days);
            pb.finish_and_clear();

            for entry in reports.try_iter() {
                print_entry(&entry);
            }
            let outcome = result
                .with_context(|| format!("Deforestation check for {district} failed"))?
                .context("Check was superseded by a newer request")?;
            println!(
                "  Scenes: {}, analysis grid: {} x {}",
                outcome.scene_count, outcome.grid.cols, outcome.grid.rows
            );
            println!("  Processing time: {:.2?}", start.elapsed());

            if let Some(dir) = export_dir {
                export(&session, &outcome, &dir, preview_width)?;
            }
        }

        // ── Interactive ──────────────────────────────────────────────
        Commands::Interactive { sources } => {
            let (session, reports) = build_session(registry, &sources)?;
            let session = Arc::new(session);

            println!("Districts: {}", session.registry().names().collect::<Vec<_>>().join(", "));
            println!("Enter checks as `district|days`, one per line (Ctrl-D to quit)");

            let printer = std::thread::spawn(move || {
                for entry in reports.iter() {
                    print_entry(&entry);
                }
            });

            let mut workers = Vec::new();
            for line in std::io::stdin().lock().lines() {
                let line = line.context("Failed to read stdin")?;
                if line.trim().is_empty() {
                    continue;
                }
                let (district, days) = parse_request(&line);
                let session = Arc::clone(&session);
                workers.push(std::thread::spawn(move || {
                    // Failures already went to the report channel
                    if let Err(e) = session.check_deforestation(district.as_deref(), &days) {
                        debug!("check failed: {e}");
                    }
                }));
            }

            for worker in workers {
                if worker.join().is_err() {
                    eprintln!("error: a check panicked");
                }
            }
            // Dropping the last session closes the report channel
            drop(session);
            if printer.join().is_err() {
                bail!("Report printer panicked");
            }
        }
    }

    Ok(())
}
