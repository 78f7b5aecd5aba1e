//! On-disk tiles: one binary feature collection per file, filed under
//! `<root>/<level>/<parent adcode>*.tile`.

mod builder;
mod codec;
mod locator;
mod store;

pub use builder::{merge_tiles, FilePrefix, TileBuilder, WrittenTile};
pub use codec::{
    decode, encode, read_tile, write_tile, TileCollection, TileFeature, TILE_EXTENSION,
};
pub use locator::{Selector, TileLocator};
pub use store::{LoadedTile, TileStore};
