//! Regionfill - administrative region resolution from offline boundary tiles
//!
//! This library provides shared types and modules for the resolve and split binaries.

pub mod adcode;
pub mod batch;
pub mod config;
pub mod error;
pub mod models;
pub mod pip;
pub mod tile;

pub use batch::{BatchOptions, BatchResolver, BatchSummary, IncludeCode, RecordOutcome};
pub use config::ResolveConfig;
pub use error::{Error, Result};
pub use models::{AdminLevel, RegionInfo, ResolvedChain};
pub use pip::{ResolveOptions, SpatialResolver};
pub use tile::{TileBuilder, TileCollection, TileFeature, TileStore};
