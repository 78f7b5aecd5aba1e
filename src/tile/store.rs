//! Tile loading with an optional read-through cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use geo::Point;
use tokio::sync::OnceCell;
use tracing::debug;

use super::codec::{read_tile, TileCollection, TileFeature};
use crate::error::Result;
use crate::pip::FeatureIndex;

/// A decoded tile together with its spatial index.
pub struct LoadedTile {
    path: PathBuf,
    collection: TileCollection,
    index: FeatureIndex,
}

impl LoadedTile {
    pub fn new(path: impl Into<PathBuf>, collection: TileCollection) -> Self {
        let index = FeatureIndex::build(&collection.features);
        Self {
            path: path.into(),
            collection,
            index,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn features(&self) -> &[TileFeature] {
        &self.collection.features
    }

    /// Every feature whose `adcode` property equals `adcode`.
    pub fn find_by_adcode<'a>(&'a self, adcode: &'a str) -> impl Iterator<Item = &'a TileFeature> {
        self.features().iter().filter(move |f| f.adcode() == adcode)
    }

    /// First feature, in tile order, that passes `allowed` and covers `point`.
    pub fn first_covering<F>(&self, point: Point<f64>, allowed: F) -> Option<&TileFeature>
    where
        F: Fn(&TileFeature) -> bool,
    {
        self.index
            .first_covering(self.features(), point, allowed)
            .map(|i| &self.features()[i])
    }
}

type Slot = Arc<OnceCell<Arc<LoadedTile>>>;

/// Loads tiles by path.
///
/// With caching on, each path is decoded at most once and shared read-only
/// between concurrent resolutions. Failed loads are not cached.
#[derive(Default)]
pub struct TileStore {
    cache: Option<DashMap<PathBuf, Slot>>,
}

impl TileStore {
    pub fn new(cache: bool) -> Self {
        Self {
            cache: cache.then(DashMap::new),
        }
    }

    /// A store that decodes every tile on every load.
    pub fn uncached() -> Self {
        Self::new(false)
    }

    pub async fn load(&self, path: &Path) -> Result<Arc<LoadedTile>> {
        let Some(cache) = &self.cache else {
            return load_fresh(path).await;
        };

        // Clone the slot out so no map guard is held across the await.
        let slot: Slot = cache.entry(path.to_path_buf()).or_default().clone();
        let tile = slot.get_or_try_init(|| load_fresh(path)).await?;
        Ok(Arc::clone(tile))
    }

    /// Number of tiles held in the cache.
    pub fn cached(&self) -> usize {
        self.cache
            .as_ref()
            .map(|c| c.iter().filter(|e| e.value().initialized()).count())
            .unwrap_or(0)
    }
}

async fn load_fresh(path: &Path) -> Result<Arc<LoadedTile>> {
    let collection = read_tile(path).await?;
    debug!(
        "Loaded tile {} with {} features",
        path.display(),
        collection.len()
    );
    Ok(Arc::new(LoadedTile::new(path, collection)))
}
