//! A k-d tree over embedded points with caller-supplied exact distances.
//!
//! Points are stored in an embedding space where Euclidean distance is a
//! lower bound on the true metric (e.g. chord length versus great-circle
//! distance). The tree gathers a superset of candidates by embedded distance
//! and ranks them with the exact distance supplied by the caller, so results
//! are exact for any metric that dominates the embedding.

use std::collections::HashMap;
use std::fmt;

use kiddo::{KdTree as PointTree, SquaredEuclidean};

/// Largest embedding the tree accepts: a 3-D chord plus altitude, pressure
/// and time.
pub const MAX_DIMS: usize = 6;

/// Householder vectors applied to every embedded point. Both reflections are
/// orthogonal, so Euclidean distances are unchanged, but points sharing one
/// input coordinate (a grid row, a common time) no longer share a value on
/// any tree axis.
const REFLECTIONS: [[f64; MAX_DIMS]; 2] = [
    [0.813_5, -0.331_2, 0.271_8, 0.141_4, -0.223_6, 0.301_0],
    [-0.173_2, 0.447_2, 0.618_0, -0.264_6, 0.331_7, -0.458_3],
];

/// Slack on search radii, relative to the radius plus the query's distance
/// from the origin, for rounding in the embedding and the reflections.
const RADIUS_SLACK: f64 = 1e-9;

/// Static k-d tree over a fixed set of point ids.
///
/// Ids with bit-identical embeddings share one tree entry.
pub struct KdTree {
    dims: usize,
    tree: PointTree<f64, MAX_DIMS>,
    groups: Vec<Vec<usize>>,
    len: usize,
}

impl fmt::Debug for KdTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KdTree")
            .field("dims", &self.dims)
            .field("len", &self.len)
            .field("positions", &self.groups.len())
            .finish()
    }
}

impl KdTree {
    /// Build over `embedded` (flat, `dims` values per point). Only ids in
    /// `visible` take part; ids are positions in the embedded array.
    pub fn build(dims: usize, embedded: &[f64], visible: &[usize]) -> Self {
        debug_assert!(dims <= MAX_DIMS);
        let mut tree: PointTree<f64, MAX_DIMS> = PointTree::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut by_position: HashMap<[u64; MAX_DIMS], usize> = HashMap::new();

        let mut ids = visible.to_vec();
        ids.sort_unstable();
        ids.dedup();
        for &id in &ids {
            let position = mix(&embedded[id * dims..(id + 1) * dims]);
            let key = position.map(f64::to_bits);
            match by_position.get(&key) {
                Some(&group) => groups[group].push(id),
                None => {
                    let group = groups.len();
                    by_position.insert(key, group);
                    groups.push(vec![id]);
                    tree.add(&position, group as u64);
                }
            }
        }

        Self {
            dims,
            tree,
            groups,
            len: ids.len(),
        }
    }

    /// Number of visible points.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Groups whose embedded position lies within `radius` of `position`.
    fn groups_within(&self, position: &[f64; MAX_DIMS], radius: f64) -> Vec<usize> {
        if radius.is_infinite() {
            return (0..self.groups.len()).collect();
        }
        let magnitude = position.iter().map(|v| v * v).sum::<f64>().sqrt();
        let padded = radius + RADIUS_SLACK * (radius.abs() + magnitude + 1.0);
        self.tree
            .within::<SquaredEuclidean>(position, padded * padded)
            .into_iter()
            .map(|neighbour| neighbour.item as usize)
            .collect()
    }

    /// Closest visible id under `distance`; ties go to the lower id.
    ///
    /// `distance(id)` must never be smaller than the embedded Euclidean
    /// distance between `query` and point `id`.
    pub fn nearest<F>(&self, query: &[f64], distance: F) -> Option<(usize, f64)>
    where
        F: Fn(usize) -> f64,
    {
        if self.groups.is_empty() {
            return None;
        }
        let position = mix(query);
        let closest = self.tree.nearest_one::<SquaredEuclidean>(&position);

        // Any point beating the closest embedded position's exact distance
        // must also lie within that distance in the embedding.
        let bound = self.groups[closest.item as usize]
            .iter()
            .map(|&id| distance(id))
            .filter(|d| !d.is_nan())
            .fold(f64::INFINITY, f64::min);

        let mut groups = self.groups_within(&position, bound);
        groups.push(closest.item as usize);

        let mut best: Option<(usize, f64)> = None;
        for group in groups {
            for &id in &self.groups[group] {
                let d = distance(id);
                if d.is_nan() {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((best_id, best_d)) => d < best_d || (d == best_d && id < best_id),
                };
                if better {
                    best = Some((id, d));
                }
            }
        }
        best
    }

    /// All visible ids within embedded distance `radius` of `query` for
    /// which `accept(id)` holds, in ascending id order.
    pub fn within<F>(&self, query: &[f64], radius: f64, mut accept: F) -> Vec<usize>
    where
        F: FnMut(usize) -> bool,
    {
        if self.groups.is_empty() || radius.is_nan() {
            return Vec::new();
        }
        let mut found: Vec<usize> = self
            .groups_within(&mix(query), radius)
            .into_iter()
            .flat_map(|group| self.groups[group].iter().copied())
            .filter(|&id| accept(id))
            .collect();
        found.sort_unstable();
        found
    }
}

/// Pad `point` to `MAX_DIMS` and apply the fixed reflections.
fn mix(point: &[f64]) -> [f64; MAX_DIMS] {
    let mut out = [0.0; MAX_DIMS];
    for (o, v) in out.iter_mut().zip(point) {
        *o = *v;
    }
    for v in &REFLECTIONS {
        let norm: f64 = v.iter().map(|c| c * c).sum();
        let k = 2.0 * v.iter().zip(&out).map(|(a, b)| a * b).sum::<f64>() / norm;
        for (o, c) in out.iter_mut().zip(v) {
            *o -= k * c;
        }
    }
    // -0.0 and 0.0 must land in the same group.
    out.map(|v| v + 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_tree(values: &[f64]) -> KdTree {
        let ids: Vec<usize> = (0..values.len()).collect();
        KdTree::build(1, values, &ids)
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let values: Vec<f64> = (0..200).map(|i| ((i * 37) % 101) as f64 * 0.5).collect();
        let tree = line_tree(&values);
        for q in [-3.0, 0.0, 7.3, 25.1, 60.0] {
            let (id, d) = tree.nearest(&[q], |id| (values[id] - q).abs()).unwrap();
            let brute = values
                .iter()
                .enumerate()
                .map(|(i, v)| (i, (v - q).abs()))
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
                .unwrap();
            assert_eq!((id, d), brute);
        }
    }

    #[test]
    fn test_nearest_ranks_by_exact_distance() {
        // Embedded closest is id 0, but its exact distance is larger.
        let values = [0.0, 1.0, 3.0];
        let exact = [5.0, 1.5, 3.0];
        let tree = line_tree(&values);
        assert_eq!(tree.nearest(&[0.0], |id| exact[id]), Some((1, 1.5)));
    }

    #[test]
    fn test_nearest_tie_goes_to_lower_id() {
        let tree = line_tree(&[1.0, -1.0, 1.0, -1.0]);
        let (id, _) = tree.nearest(&[0.0], |_| 1.0).unwrap();
        assert_eq!(id, 0);
    }

    #[test]
    fn test_within_sorted_and_filtered() {
        let values = [5.0, 1.0, 3.0, 2.0, 10.0];
        let tree = line_tree(&values);
        let found = tree.within(&[2.0], 1.5, |id| (values[id] - 2.0).abs() <= 1.5);
        assert_eq!(found, vec![1, 2, 3]);
    }

    #[test]
    fn test_invisible_points_never_returned() {
        let values = [0.0, 0.1, 0.2];
        let tree = KdTree::build(1, &values, &[0, 2]);
        assert_eq!(tree.len(), 2);
        let (id, _) = tree.nearest(&[0.1], |id| (values[id] - 0.1).abs()).unwrap();
        assert_eq!(id, 0);
        assert_eq!(tree.within(&[0.1], 1.0, |_| true), vec![0, 2]);
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(2, &[], &[]);
        assert!(tree.is_empty());
        assert!(tree.nearest(&[0.0, 0.0], |_| 0.0).is_none());
        assert!(tree.within(&[0.0, 0.0], 10.0, |_| true).is_empty());
    }

    #[test]
    fn test_identical_points_share_one_position() {
        let tree = line_tree(&[2.0; 500]);
        assert_eq!(tree.len(), 500);
        assert_eq!(tree.within(&[2.0], 0.0, |_| true).len(), 500);
        assert_eq!(tree.nearest(&[7.0], |_| 5.0), Some((0, 5.0)));
    }

    #[test]
    fn test_many_points_sharing_one_coordinate() {
        // A single grid row: every point has the same second coordinate.
        let embedded: Vec<f64> = (0..400).flat_map(|i| [i as f64, 3.0]).collect();
        let ids: Vec<usize> = (0..400).collect();
        let tree = KdTree::build(2, &embedded, &ids);
        let exact = |id: usize| ((id as f64 - 123.2).powi(2) + 0.25).sqrt();
        assert_eq!(tree.nearest(&[123.2, 3.5], exact).unwrap().0, 123);
        let found = tree.within(&[200.0, 3.0], 2.0, |_| true);
        assert_eq!(found, vec![198, 199, 200, 201, 202]);
    }

    #[test]
    fn test_zero_dimensional_tree_returns_everything() {
        let ids: Vec<usize> = (0..40).collect();
        let tree = KdTree::build(0, &[], &ids);
        assert_eq!(tree.within(&[], 1.0, |_| true), ids);
    }
}
