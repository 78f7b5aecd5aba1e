//! Tile builder.
//!
//! Splits a GeoJSON FeatureCollection of region boundaries into tiles, or
//! merges a directory of tiles back into GeoJSON.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::Parser;
use geojson::GeoJson;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use regionfill::tile::{merge_tiles, FilePrefix, TileBuilder, TileCollection, TileFeature};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// How features are assigned to tiles.
#[derive(Debug, Clone, PartialEq)]
enum GroupBy {
    /// Every feature goes into the tile named by the key
    Constant(String),
    /// First `n` adcode digits, zero-padded to a full parent code
    Prefix(usize),
    /// Value of a feature property
    Property(String),
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = s
            .split_once(':')
            .ok_or_else(|| format!("expected <kind>:<value>, got '{s}'"))?;
        match kind {
            "constant" if !arg.is_empty() => Ok(GroupBy::Constant(arg.to_string())),
            "prefix" => match arg.parse::<usize>() {
                Ok(n) if (1..=12).contains(&n) => Ok(GroupBy::Prefix(n)),
                _ => Err(format!("prefix length must be 1-12, got '{arg}'")),
            },
            "property" if !arg.is_empty() => Ok(GroupBy::Property(arg.to_string())),
            _ => Err(format!("unknown grouping '{s}'")),
        }
    }
}

impl GroupBy {
    fn key(&self, feature: &TileFeature) -> String {
        match self {
            GroupBy::Constant(key) => key.clone(),
            GroupBy::Prefix(n) => {
                let adcode = feature.adcode();
                let head: String = adcode.chars().take(*n).collect();
                let width = match n {
                    0..=6 => 6,
                    7..=9 => 9,
                    _ => 12,
                };
                format!("{:0<width$}", head)
            }
            GroupBy::Property(name) => feature.property(name).unwrap_or_default().to_string(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "split")]
#[command(about = "Split region boundaries into tiles, or merge tiles back into GeoJSON")]
struct Args {
    /// GeoJSON FeatureCollection to split
    #[arg(short, long, required_unless_present = "merge")]
    input: Option<PathBuf>,

    /// Directory the tiles are written to (usually <root>/<level>)
    #[arg(short, long, required_unless_present = "merge")]
    output_dir: Option<PathBuf>,

    /// constant:<key>, prefix:<n> or property:<name>
    #[arg(short, long, default_value = "prefix:2")]
    group_by: GroupBy,

    /// Literal prefix for every tile file name
    #[arg(long)]
    prefix: Option<String>,

    /// Merge every tile under this directory instead of splitting
    #[arg(long, conflicts_with = "input")]
    merge: Option<PathBuf>,

    /// GeoJSON output for --merge (stdout when omitted)
    #[arg(long, requires = "merge")]
    merge_output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    if let Some(dir) = &args.merge {
        return merge(dir, args.merge_output.as_ref()).await;
    }

    let (Some(input), Some(output_dir)) = (&args.input, &args.output_dir) else {
        bail!("--input and --output-dir are required when splitting");
    };

    info!("Regionfill Split");
    info!("Input: {}", input.display());

    let content = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let geojson: GeoJson = content
        .parse()
        .with_context(|| format!("Failed to parse GeoJSON from {}", input.display()))?;
    let collection = TileCollection::from_geojson(geojson)?;

    let group_by = args.group_by.clone();
    let mut builder = TileBuilder::new(output_dir, move |f: &TileFeature| group_by.key(f));
    if let Some(prefix) = &args.prefix {
        builder = builder.with_prefix(FilePrefix::Literal(prefix.clone()));
    }

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let written = builder
        .split_with_progress(collection, |tile, groups| {
            pb.set_length(groups as u64);
            pb.set_message(tile.key.clone());
            pb.inc(1);
        })
        .await?;
    pb.finish_with_message("Split complete");

    let features: usize = written.iter().map(|t| t.features).sum();
    info!(
        "Wrote {} features into {} tiles under {}",
        features,
        written.len(),
        builder.output_dir().display()
    );

    Ok(())
}

async fn merge(dir: &Path, output: Option<&PathBuf>) -> Result<()> {
    info!("Merging tiles under {}", dir.display());
    let merged = merge_tiles(dir).await?;
    let json = serde_json::to_string(&GeoJson::FeatureCollection(merged.to_geojson()))?;

    match output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} features to {}", merged.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
