//! Humedal CLI - staged wetland delineation from annual land-cover grids

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geo_types::LineString;
use humedal_core::io::read_grid;
use humedal_core::{FileStore, Raster};
use humedal_pipeline::{AnnualGrid, Pipeline, WetlandConfig};

#[derive(Parser)]
#[command(name = "humedal")]
#[command(author, version, about = "Wetland delineation from annual land-cover grids", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full delineation pipeline from a JSON configuration
    Run {
        /// Run configuration file
        config: PathBuf,
    },
    /// Show information about a grid file
    Info {
        /// Input grid file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run { config } => run(&config),
        Commands::Info { input } => info_command(&input),
    }
}

fn run(config_path: &Path) -> Result<()> {
    let start = Instant::now();

    let config: WetlandConfig = serde_json::from_slice(
        &fs::read(config_path)
            .with_context(|| format!("cannot read configuration {}", config_path.display()))?,
    )
    .context("cannot parse run configuration")?;

    let years = load_annual_grids(&config.input_dir)?;
    info!(years = years.len(), dir = %config.input_dir.display(), "loaded annual grids");

    let rivers = load_river_network(&config.river_network)?;
    info!(lines = rivers.len(), "loaded river network");

    // Output directories are siblings of the input collection.
    let store_root = config
        .input_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let store = FileStore::new(store_root);

    let pipeline = Pipeline::new(&config, &store)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message("running delineation stages");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let products = pipeline.run(&years, &rivers)?;

    spinner.finish_with_message("done");

    let wetland_pixels = products
        .unified_mask
        .data()
        .iter()
        .filter(|&&v| v == 1)
        .count();

    println!("Completed in {:.1?}", start.elapsed());
    println!("  wetland pixels:          {}", wetland_pixels);
    println!("  unified polygons:        {}", products.unified_polygons.len());
    println!("  differentiated polygons: {}", products.differentiated_polygons.len());
    println!("  outputs under:           {}", store.root().display());

    Ok(())
}

/// Load one categorical grid per .tif file in the input directory, tagged by
/// file stem, in name order
fn load_annual_grids(dir: &Path) -> Result<Vec<AnnualGrid>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("cannot read input directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "tif"))
        .collect();
    paths.sort();

    if paths.is_empty() {
        bail!("no .tif grids found in {}", dir.display());
    }

    let mut years = Vec::with_capacity(paths.len());
    for path in paths {
        let classes: Raster<i32> = read_grid(&path)
            .with_context(|| format!("cannot read annual grid {}", path.display()))?;
        let tag = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        years.push(AnnualGrid { tag, classes });
    }

    Ok(years)
}

/// Load the river line network (JSON array of line strings)
fn load_river_network(path: &Path) -> Result<Vec<LineString<f64>>> {
    let bytes = fs::read(path)
        .with_context(|| format!("cannot read river network {}", path.display()))?;
    serde_json::from_slice(&bytes).context("cannot parse river network")
}

fn info_command(input: &Path) -> Result<()> {
    let grid: Raster<f64> = read_grid(input)?;
    let (rows, cols) = grid.shape();
    let (min_x, min_y, max_x, max_y) = grid.bounds();

    println!("{}", input.display());
    println!("  size:      {} rows x {} cols", rows, cols);
    println!("  cell size: {}", grid.cell_size());
    println!("  bounds:    ({}, {}) - ({}, {})", min_x, min_y, max_x, max_y);
    println!(
        "  crs:       {}",
        grid.crs()
            .map(|c| c.identifier())
            .unwrap_or_else(|| "unknown".to_string())
    );

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut valid = 0usize;
    for &v in grid.data().iter() {
        if grid.is_nodata(v) {
            continue;
        }
        min = min.min(v);
        max = max.max(v);
        valid += 1;
    }

    if valid > 0 {
        println!("  values:    {} .. {} ({} valid cells)", min, max, valid);
    } else {
        println!("  values:    all nodata");
    }

    Ok(())
}
