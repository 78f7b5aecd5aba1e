//! Point-in-Polygon (PIP) region resolution.
//!
//! Walks the administrative levels top-down, loading the tiles filed under
//! each resolved parent and testing containment against their features.

mod geometry;
mod index;
mod resolver;

pub use geometry::{center_point, covers};
pub use index::FeatureIndex;
pub use resolver::{ResolveOptions, SpatialResolver};
