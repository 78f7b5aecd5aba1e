//! Batch region resolution.
//!
//! Reads a JSON array of records, resolves each record's coordinate against
//! the boundary tiles and writes the enriched records back out.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use regionfill::batch::{BatchResolver, CoordSystem};
use regionfill::{ResolveConfig, SpatialResolver, TileStore};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Diagnostics beyond this many are only counted in the log.
const MAX_LOGGED_DIAGNOSTICS: usize = 20;

#[derive(Parser, Debug)]
#[command(name = "resolve")]
#[command(about = "Fill administrative regions into coordinate records")]
struct Args {
    /// TOML file with resolve options; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root directory of the boundary tiles
    #[arg(long)]
    tile_root: Option<PathBuf>,

    /// JSON array of input records
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where the enriched records are written
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Exact adcode seeding every record without its own code
    #[arg(long, conflicts_with = "include_pattern")]
    include_code: Option<String>,

    /// Regex narrowing tile files and features (advisory)
    #[arg(long)]
    include_pattern: Option<String>,

    /// Add the center point of every resolved region
    #[arg(long)]
    center_point: bool,

    /// Record field holding "lng,lat" or [lng, lat]
    #[arg(long)]
    latlng_field: Option<String>,

    /// wgs84, gcj02, bd09 or web_mercator
    #[arg(long)]
    latlng_type: Option<CoordSystem>,

    #[arg(long)]
    province_code_field: Option<String>,

    #[arg(long)]
    city_code_field: Option<String>,

    #[arg(long)]
    county_code_field: Option<String>,

    #[arg(long)]
    town_code_field: Option<String>,

    #[arg(long)]
    village_code_field: Option<String>,

    /// Records resolved at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-record timeout in seconds, 0 to disable
    #[arg(long)]
    record_timeout_secs: Option<u64>,

    /// Re-read tiles for every lookup instead of caching them
    #[arg(long)]
    no_cache: bool,
}

impl Args {
    fn overrides(&self) -> ResolveConfig {
        ResolveConfig {
            tile_root: self.tile_root.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
            include_code: self.include_code.clone(),
            include_pattern: self.include_pattern.clone(),
            center_point: self.center_point.then_some(true),
            latlng_field: self.latlng_field.clone(),
            latlng_type: self.latlng_type,
            province_code_field: self.province_code_field.clone(),
            city_code_field: self.city_code_field.clone(),
            county_code_field: self.county_code_field.clone(),
            town_code_field: self.town_code_field.clone(),
            village_code_field: self.village_code_field.clone(),
            concurrency: self.concurrency,
            record_timeout_secs: self.record_timeout_secs,
            cache_tiles: self.no_cache.then_some(false),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let base = match &args.config {
        Some(path) => ResolveConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ResolveConfig::default(),
    };
    let mut config = base.merge(args.overrides());
    // Command-line code overrides a file pattern and vice versa.
    if args.include_code.is_some() {
        config.include_pattern = None;
    } else if args.include_pattern.is_some() {
        config.include_code = None;
    }

    let tile_root = ResolveConfig::require_path("tile_root", &config.tile_root)?;
    let input = ResolveConfig::require_path("input", &config.input)?;
    let output = ResolveConfig::require_path("output", &config.output)?;
    let options = config.batch_options()?;

    info!("Regionfill Resolve");
    info!("Tiles: {}", tile_root.display());
    info!("Input: {}", input.display());

    let store = Arc::new(TileStore::new(config.cache_tiles()));
    let resolver = SpatialResolver::new(&tile_root, store.clone())
        .context("Cannot resolve without a tile root")?;
    let batch = BatchResolver::new(Arc::new(resolver), options);

    let content = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let mut records: Vec<Value> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array", input.display()))?;

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    let summary = batch.run(&mut records, |_| pb.inc(1)).await;
    pb.finish_with_message("Resolution complete");

    write_atomically(&output, &records)?;

    info!("=== Resolve Complete ===");
    info!("Records: {}", summary.total);
    info!("Resolved: {}", summary.resolved);
    info!("Skipped: {}", summary.skipped);
    info!("Timed out: {}", summary.timed_out);
    for (level, count) in &summary.deepest {
        info!("  down to {}: {}", level, count);
    }
    info!("Tiles cached: {}", store.cached());

    for outcome in summary.diagnostics.iter().take(MAX_LOGGED_DIAGNOSTICS) {
        warn!("{}", serde_json::to_string(outcome)?);
    }
    if summary.diagnostics.len() > MAX_LOGGED_DIAGNOSTICS {
        warn!(
            "... and {} more unresolved records",
            summary.diagnostics.len() - MAX_LOGGED_DIAGNOSTICS
        );
    }
    info!("Output: {}", output.display());

    Ok(())
}

/// Write to a temp file next to `path`, then rename over it.
fn write_atomically(path: &Path, records: &[Value]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    serde_json::to_writer(&mut file, records)?;
    file.flush()?;
    file.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
