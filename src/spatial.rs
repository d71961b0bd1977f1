//! Nearest-point lookup over Voronoi vertex positions
//!
//! The convex-hull cell construction gets its hull vertices back as bare
//! coordinates (possibly reordered and rounded to `f32`). This index maps each
//! one back to the id of the Voronoi vertex it came from.

use glam::Vec3;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;

/// KD-tree over a set of positions, answering "which input is closest"
///
/// Items are the caller's ids, so a tree built over a subset of vertices still
/// reports global vertex indices.
#[derive(Clone)]
pub struct SpatialIndex {
    tree: ImmutableKdTree<f32, usize, 3, 32>,
    ids: Vec<usize>,
}

impl SpatialIndex {
    /// Build an index whose item `i` is `positions[i]`
    pub fn new(positions: &[Vec3]) -> Self {
        Self::with_ids(positions, (0..positions.len()).collect())
    }

    /// Build an index reporting `ids[i]` for `positions[i]`
    ///
    /// # Example
    ///
    /// ```
    /// use voronoi_isosurface::SpatialIndex;
    /// use glam::Vec3;
    ///
    /// let positions = vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)];
    /// let index = SpatialIndex::with_ids(&positions, vec![17, 42]);
    /// assert_eq!(index.find_nearest(Vec3::new(1.8, 0.1, 0.0)), 42);
    /// ```
    pub fn with_ids(positions: &[Vec3], ids: Vec<usize>) -> Self {
        let points: Vec<[f32; 3]> = positions.iter().map(|p| [p.x, p.y, p.z]).collect();
        Self {
            tree: ImmutableKdTree::new_from_slice(&points),
            ids,
        }
    }

    /// Id of the position nearest to `query`
    pub fn find_nearest(&self, query: Vec3) -> usize {
        let result = self
            .tree
            .nearest_one::<SquaredEuclidean>(&[query.x, query.y, query.z]);
        self.ids[result.item as usize]
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
