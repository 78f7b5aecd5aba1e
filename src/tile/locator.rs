//! Candidate tile discovery.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use super::codec::TILE_EXTENSION;
use crate::error::{Error, Result};
use crate::models::AdminLevel;

/// How tile files are picked out of a level directory.
#[derive(Debug, Clone)]
pub enum Selector {
    /// File names starting with this parent adcode
    Code(String),
    /// File names matching this pattern anywhere
    Pattern(Regex),
}

impl Selector {
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            Selector::Code(code) => file_name.starts_with(code.as_str()),
            Selector::Pattern(re) => re.is_match(file_name),
        }
    }
}

/// Finds tile files under `<root>/<level>/`.
#[derive(Debug, Clone)]
pub struct TileLocator {
    root: PathBuf,
}

impl TileLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn level_dir(&self, level: AdminLevel) -> PathBuf {
        self.root.join(level.field_name())
    }

    /// List tile files for `level` accepted by `selector`, sorted by name.
    ///
    /// A missing level directory yields an empty list: there is simply no
    /// data for that level.
    pub async fn find(&self, level: AdminLevel, selector: &Selector) -> Result<Vec<PathBuf>> {
        let dir = self.level_dir(level);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            debug!("No tile directory for {} at {}", level, dir.display());
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| Error::io(&dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TILE_EXTENSION) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if selector.matches(file_name) {
                files.push(path);
            }
        }

        files.sort();
        debug!(
            "{} tile candidates for {} with {:?}",
            files.len(),
            level,
            selector
        );
        Ok(files)
    }
}
