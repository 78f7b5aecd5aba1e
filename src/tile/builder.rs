//! Splitting a feature collection into tiles.

use std::path::{Path, PathBuf};

use geojson::GeoJson;
use hashbrown::HashMap;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::codec::{read_tile, write_tile, TileCollection, TileFeature, TILE_EXTENSION};
use crate::error::{Error, Result};

/// How a group key becomes a file stem.
#[derive(Default)]
pub enum FilePrefix {
    /// `<key>`
    #[default]
    None,
    /// `<prefix><key>`
    Literal(String),
    /// Whatever the function returns for the key
    Custom(Box<dyn Fn(&str) -> String + Send + Sync>),
}

impl FilePrefix {
    pub fn stem(&self, key: &str) -> String {
        match self {
            FilePrefix::None => key.to_string(),
            FilePrefix::Literal(prefix) => format!("{prefix}{key}"),
            FilePrefix::Custom(f) => f(key),
        }
    }
}

/// A tile written by [`TileBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenTile {
    pub key: String,
    pub path: PathBuf,
    pub features: usize,
}

/// Groups features with a classifier and writes one tile per group.
pub struct TileBuilder<F> {
    output_dir: PathBuf,
    classify: F,
    prefix: FilePrefix,
}

impl<F> TileBuilder<F>
where
    F: Fn(&TileFeature) -> String,
{
    pub fn new(output_dir: impl Into<PathBuf>, classify: F) -> Self {
        Self {
            output_dir: output_dir.into(),
            classify,
            prefix: FilePrefix::None,
        }
    }

    pub fn with_prefix(mut self, prefix: FilePrefix) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the tile for a group key.
    pub fn tile_path(&self, key: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.prefix.stem(key), TILE_EXTENSION))
    }

    /// Group features by classifier result, in first-seen key order.
    pub fn group(&self, collection: TileCollection) -> Vec<(String, TileCollection)> {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<(String, TileCollection)> = Vec::new();

        for feature in collection.features {
            let key = (self.classify)(&feature);
            let pos = *positions.entry(key.clone()).or_insert_with(|| {
                groups.push((key, TileCollection::default()));
                groups.len() - 1
            });
            groups[pos].1.features.push(feature);
        }

        groups
    }

    /// Split parsed GeoJSON. Anything but a FeatureCollection is rejected
    /// before the output directory is touched.
    pub async fn split_geojson(&self, geojson: GeoJson) -> Result<Vec<WrittenTile>> {
        let collection = TileCollection::from_geojson(geojson)?;
        self.split(collection).await
    }

    pub async fn split(&self, collection: TileCollection) -> Result<Vec<WrittenTile>> {
        self.split_with_progress(collection, |_, _| {}).await
    }

    /// Split and write, calling `progress` with each written tile and the
    /// total number of tiles.
    pub async fn split_with_progress<P>(
        &self,
        collection: TileCollection,
        progress: P,
    ) -> Result<Vec<WrittenTile>>
    where
        P: Fn(&WrittenTile, usize),
    {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| Error::io(&self.output_dir, e))?;

        let total = collection.len();
        let groups = self.group(collection);
        let tiles = groups.len();
        info!("Split {} features into {} groups", total, tiles);

        let mut written = Vec::with_capacity(groups.len());
        for (key, group) in groups {
            let path = self.tile_path(&key);
            write_tile(&path, &group).await?;
            debug!("Wrote {} features to {}", group.len(), path.display());

            let tile = WrittenTile {
                key,
                path,
                features: group.len(),
            };
            progress(&tile, tiles);
            written.push(tile);
        }

        Ok(written)
    }
}

/// Concatenate every tile under `dir` (recursively, in path order) into one
/// collection.
pub async fn merge_tiles(dir: &Path) -> Result<TileCollection> {
    if !dir.is_dir() {
        return Err(Error::MissingTileRoot(dir.to_path_buf()));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            Error::io(path, e.into())
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(TILE_EXTENSION) {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    let mut merged = TileCollection::default();
    for path in &paths {
        let tile = read_tile(path).await?;
        merged.features.extend(tile.features);
    }

    info!(
        "Merged {} tiles into {} features",
        paths.len(),
        merged.len()
    );
    Ok(merged)
}
