//! Level-by-level region resolution for a single point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use geo::Point;
use regex::Regex;
use tracing::{debug, warn};

use super::geometry::center_point;
use crate::adcode::decompose;
use crate::error::{Error, Result};
use crate::models::{AdminLevel, RegionInfo, ResolvedChain};
use crate::tile::{LoadedTile, Selector, TileFeature, TileLocator, TileStore};

/// Per-resolution knobs.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Attach the region centroid to every resolved level
    pub center_point: bool,
    /// Advisory filter on tile file names and feature adcodes. Ignored at
    /// any step where it would leave nothing to search.
    pub pattern: Option<Regex>,
}

/// Resolves the administrative chain of a point against a tile directory.
pub struct SpatialResolver {
    locator: TileLocator,
    store: Arc<TileStore>,
}

impl SpatialResolver {
    /// Create a resolver over `root`. Fails if the directory does not exist.
    pub fn new(root: impl Into<PathBuf>, store: Arc<TileStore>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::MissingTileRoot(root));
        }
        Ok(Self {
            locator: TileLocator::new(root),
            store,
        })
    }

    pub fn root(&self) -> &Path {
        self.locator.root()
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    /// Resolve as much of the chain as the code alone allows, by exact
    /// adcode match.
    ///
    /// A level only resolves when exactly one tile sits under its parent's
    /// code and that tile holds exactly one feature with the level's code.
    /// The first level that fails stops the walk.
    pub async fn resolve_code(&self, adcode: &str, with_center: bool) -> ResolvedChain {
        let levels = decompose(adcode);
        let mut chain = ResolvedChain::with_country();

        for (&level, code) in levels.iter() {
            let Some(parent) = level.parent() else {
                continue;
            };
            let Some(parent_code) = levels.get(&parent) else {
                break;
            };

            let files = match self
                .locator
                .find(level, &Selector::Code(parent_code.clone()))
                .await
            {
                Ok(files) => files,
                Err(e) => {
                    warn!("Failed to list {} tiles: {}", level, e);
                    break;
                }
            };
            if files.len() != 1 {
                debug!(
                    "{} tiles under {} for {} {}, falling back to geometry",
                    files.len(),
                    parent_code,
                    level,
                    code
                );
                break;
            }

            let tile = match self.store.load(&files[0]).await {
                Ok(tile) => tile,
                Err(e) => {
                    warn!("Skipping tile: {}", e);
                    break;
                }
            };

            let mut matches = tile.find_by_adcode(code);
            let (Some(feature), None) = (matches.next(), matches.next()) else {
                debug!("No unique feature {} in {}", code, tile.path().display());
                break;
            };

            chain.set(level, region_info(feature, with_center));
        }

        chain
    }

    /// Resolve the chain for `point`.
    ///
    /// `known` is an adcode carried by the record; when present its exact
    /// matches replace `seed`. Remaining levels are found by containment,
    /// top-down, stopping at the first level with no covering region.
    pub async fn resolve(
        &self,
        point: Point<f64>,
        known: Option<&str>,
        seed: Option<&ResolvedChain>,
        options: &ResolveOptions,
    ) -> ResolvedChain {
        let mut chain = match known {
            Some(code) => self.resolve_code(code, options.center_point).await,
            None => seed.cloned().unwrap_or_else(ResolvedChain::with_country),
        };
        if chain.country.is_none() {
            chain = ResolvedChain::with_country();
        }

        for &level in AdminLevel::tiled() {
            if chain.get(level).is_some() {
                continue;
            }
            let Some(parent) = level.parent().and_then(|p| chain.get(p)) else {
                break;
            };
            let parent_code = canonical_parent_code(level, &parent.adcode);

            match self.locate(level, &parent_code, point, options).await {
                Some(info) => {
                    chain.set(level, info);
                }
                None => {
                    debug!(
                        "No {} region covers ({}, {}) under {}",
                        level,
                        point.x(),
                        point.y(),
                        parent_code
                    );
                    break;
                }
            }
        }

        chain
    }

    /// Find the region at `level` covering `point` among tiles filed under
    /// `parent_code`.
    async fn locate(
        &self,
        level: AdminLevel,
        parent_code: &str,
        point: Point<f64>,
        options: &ResolveOptions,
    ) -> Option<RegionInfo> {
        let mut files = match self
            .locator
            .find(level, &Selector::Code(parent_code.to_string()))
            .await
        {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list {} tiles: {}", level, e);
                return None;
            }
        };

        if let Some(re) = &options.pattern {
            let narrowed: Vec<PathBuf> = files
                .iter()
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| re.is_match(n))
                })
                .cloned()
                .collect();
            if !narrowed.is_empty() {
                files = narrowed;
            }
        }

        for file in &files {
            let tile = match self.store.load(file).await {
                Ok(tile) => tile,
                Err(e) => {
                    warn!("Skipping tile: {}", e);
                    continue;
                }
            };

            if let Some(feature) = first_covering(&tile, point, options.pattern.as_ref()) {
                return Some(region_info(feature, options.center_point));
            }
        }

        None
    }
}

/// Containment search within one tile, honouring the pattern only when it
/// matches at least one feature adcode in the tile.
fn first_covering<'a>(
    tile: &'a LoadedTile,
    point: Point<f64>,
    pattern: Option<&Regex>,
) -> Option<&'a TileFeature> {
    let narrow = pattern.filter(|re| tile.features().iter().any(|f| re.is_match(f.adcode())));
    match narrow {
        Some(re) => tile.first_covering(point, |f| re.is_match(f.adcode())),
        None => tile.first_covering(point, |_| true),
    }
}

fn canonical_parent_code(level: AdminLevel, adcode: &str) -> String {
    level
        .parent()
        .and_then(|p| decompose(adcode).remove(&p))
        .unwrap_or_else(|| adcode.to_string())
}

fn region_info(feature: &TileFeature, with_center: bool) -> RegionInfo {
    RegionInfo {
        name: feature.name().to_string(),
        adcode: feature.adcode().to_string(),
        center_point: if with_center {
            center_point(&feature.geometry)
        } else {
            None
        },
    }
}
