//! Error types shared by the tile and resolver modules.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The tile root directory handed to the resolver does not exist.
    #[error("tile root directory not found: {0}")]
    MissingTileRoot(PathBuf),

    #[error("input must be a FeatureCollection, got {0}")]
    NotFeatureCollection(&'static str),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not a tile file")]
    BadTileHeader { path: PathBuf },

    #[error("unsupported tile version {version} in {path}")]
    UnsupportedTileVersion { path: PathBuf, version: u8 },

    #[error("failed to decode tile {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("failed to encode tile: {0}")]
    Encode(#[from] bincode::Error),

    #[error("feature {index} has no usable geometry: {reason}")]
    Geometry { index: usize, reason: String },

    #[error("invalid coordinate value: {0}")]
    InvalidCoordinate(String),

    #[error("invalid include pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
