//! Spatial index over the features of one tile.

use geo::{BoundingRect, Point};
use rstar::{RTree, RTreeObject, AABB};

use super::geometry::covers;
use crate::tile::TileFeature;

/// Wrapper for R-tree indexing of a feature's bounding box
#[derive(Debug, Clone)]
struct IndexedFeature {
    /// Position of the feature in its tile
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree of feature envelopes, keyed by feature position
pub struct FeatureIndex {
    tree: RTree<IndexedFeature>,
}

impl FeatureIndex {
    /// Build the index. Features without a bounding box are left out and can
    /// never match a point.
    pub fn build(features: &[TileFeature]) -> Self {
        let indexed: Vec<IndexedFeature> = features
            .iter()
            .enumerate()
            .filter_map(|(index, feature)| {
                let rect = feature.geometry.bounding_rect()?;
                Some(IndexedFeature {
                    index,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    /// Position of the first feature (in tile order) accepted by `allowed`
    /// whose polygon covers `point`.
    pub fn first_covering<F>(
        &self,
        features: &[TileFeature],
        point: Point<f64>,
        allowed: F,
    ) -> Option<usize>
    where
        F: Fn(&TileFeature) -> bool,
    {
        let query_envelope = AABB::from_point([point.x(), point.y()]);

        // Envelope hits come back in tree order, so take the lowest position
        // to keep tile order.
        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .map(|entry| entry.index)
            .filter(|i| allowed(&features[*i]))
            .filter(|i| covers(&features[*i].geometry, point))
            .min()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    fn rect_feature(adcode: &str, min: (f64, f64), max: (f64, f64)) -> TileFeature {
        TileFeature::new(
            adcode,
            adcode,
            polygon![
                (x: min.0, y: min.1),
                (x: max.0, y: min.1),
                (x: max.0, y: max.1),
                (x: min.0, y: max.1),
                (x: min.0, y: min.1),
            ],
        )
    }

    #[test]
    fn test_first_covering_keeps_tile_order() {
        let features = vec![
            rect_feature("a", (5.0, 5.0), (6.0, 6.0)),
            rect_feature("b", (0.0, 0.0), (10.0, 10.0)),
            rect_feature("c", (0.0, 0.0), (2.0, 2.0)),
        ];
        let index = FeatureIndex::build(&features);
        assert_eq!(index.len(), 3);

        assert_eq!(index.first_covering(&features, Point::new(1.0, 1.0), |_| true), Some(1));
        assert_eq!(index.first_covering(&features, Point::new(5.5, 5.5), |_| true), Some(0));
        assert_eq!(
            index.first_covering(&features, Point::new(1.0, 1.0), |f| f.adcode() == "c"),
            Some(2)
        );
        assert_eq!(index.first_covering(&features, Point::new(20.0, 1.0), |_| true), None);
    }

    #[test]
    fn test_empty_index() {
        let index = FeatureIndex::build(&[]);
        assert!(index.is_empty());
        assert_eq!(index.first_covering(&[], Point::new(0.0, 0.0), |_| true), None);
    }
}
