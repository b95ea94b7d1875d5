//! Multi-dimensional separation search: haversine horizontally, absolute
//! differences along altitude, pressure and time, each scaled to a common unit.

use cis_common::{Axis, HyperPoint};

use super::haversine::embed_lat_lon;
use super::kdtree::KdTree;
use crate::kernel::NearestMetric;

/// Per-dimension separations. A `None` removes that dimension from both the
/// index and the distance. A zero separation demands an exact match.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Separation {
    pub horizontal_km: Option<f64>,
    pub altitude: Option<f64>,
    pub pressure: Option<f64>,
    pub time_days: Option<f64>,
}

impl Separation {
    fn vertical_dims(&self) -> impl Iterator<Item = (Axis, f64)> + '_ {
        [
            (Axis::Z, self.altitude),
            (Axis::P, self.pressure),
            (Axis::T, self.time_days),
        ]
        .into_iter()
        .filter_map(|(axis, sep)| sep.map(|s| (axis, s)))
    }

    /// Number of independent components in the scaled space.
    pub fn component_count(&self) -> usize {
        usize::from(self.horizontal_km.is_some()) + self.vertical_dims().count()
    }

    /// Axes a point must carry to be indexed.
    pub fn required_axes(&self) -> Vec<Axis> {
        let mut axes = Vec::new();
        if self.horizontal_km.is_some() {
            axes.extend([Axis::Y, Axis::X]);
        }
        axes.extend(self.vertical_dims().map(|(axis, _)| axis));
        axes
    }

    /// Scaled distance per component, or `None` if either point lacks one.
    fn scaled_components(&self, a: &HyperPoint, b: &HyperPoint) -> Option<Vec<f64>> {
        let mut out = Vec::with_capacity(4);
        if let Some(h) = self.horizontal_km {
            out.push(scale_distance(a.haversine_km(b)?, h));
        }
        for (axis, sep) in self.vertical_dims() {
            out.push(scale_distance(a.axis_distance(b, axis)?, sep));
        }
        Some(out)
    }

    fn embed(&self, p: &HyperPoint) -> Option<Vec<f64>> {
        let mut out = Vec::with_capacity(6);
        if let Some(h) = self.horizontal_km {
            let e = embed_lat_lon(p.lat?, p.lon?);
            out.extend(e.iter().map(|v| v * embed_scale(h)));
        }
        for (axis, sep) in self.vertical_dims() {
            out.push(p.get(axis)? * embed_scale(sep));
        }
        if out.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(out)
    }

    fn embedded_dims(&self) -> usize {
        3 * usize::from(self.horizontal_km.is_some()) + self.vertical_dims().count()
    }
}

fn scale_distance(distance: f64, separation: f64) -> f64 {
    if separation > 0.0 {
        distance / separation
    } else if distance == 0.0 {
        0.0
    } else {
        f64::INFINITY
    }
}

/// Zero separations keep unit scale: matching points contribute nothing
/// in that dimension, so pruning stays a superset.
fn embed_scale(separation: f64) -> f64 {
    if separation > 0.0 {
        1.0 / separation
    } else {
        1.0
    }
}

/// Index over points scaled so that every separation maps to one unit.
#[derive(Debug)]
pub struct ScaledIndex {
    tree: KdTree,
    points: Vec<HyperPoint>,
    separation: Separation,
}

impl ScaledIndex {
    /// Points without a valid value and points missing a required coordinate
    /// are not indexed.
    pub fn build(points: &[HyperPoint], separation: Separation) -> Self {
        let dims = separation.embedded_dims();
        let mut embedded = Vec::with_capacity(points.len() * dims);
        let mut visible = Vec::new();
        for (i, p) in points.iter().enumerate() {
            match separation.embed(p) {
                Some(e) => {
                    embedded.extend(e);
                    if p.valid_value().is_some() {
                        visible.push(i);
                    }
                }
                None => embedded.extend(std::iter::repeat(0.0).take(dims)),
            }
        }
        tracing::debug!(
            points = points.len(),
            visible = visible.len(),
            dims,
            "building scaled separation index"
        );
        metrics::counter!("index_builds_total").increment(1);
        Self {
            tree: KdTree::build(dims, &embedded, &visible),
            points: points.to_vec(),
            separation,
        }
    }

    pub fn separation(&self) -> &Separation {
        &self.separation
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn scaled_distance(&self, query: &HyperPoint, id: usize) -> f64 {
        self.separation
            .scaled_components(query, &self.points[id])
            .map(|c| c.iter().map(|v| v * v).sum::<f64>().sqrt())
            .unwrap_or(f64::NAN)
    }

    /// Closest point in scaled distance; ties go to the lower index.
    pub fn nearest(&self, query: &HyperPoint) -> Option<(usize, f64)> {
        let embedded = self.separation.embed(query)?;
        self.tree
            .nearest(&embedded, |id| self.scaled_distance(query, id))
    }

    /// The closest point, provided it lies within every separation.
    pub fn nearest_within(&self, query: &HyperPoint) -> Option<usize> {
        self.nearest(query)
            .map(|(id, _)| id)
            .filter(|&id| within_separation(&self.separation, query, &self.points[id]))
    }

    /// Whether the scaled distance orders candidates exactly as `metric`
    /// does, so the nearest in one is the nearest in the other.
    pub fn ranks_like(&self, metric: NearestMetric) -> bool {
        let sep = &self.separation;
        if sep.component_count() != 1 {
            return false;
        }
        match metric {
            NearestMetric::Horizontal => sep.horizontal_km.is_some(),
            NearestMetric::Along(Axis::Z) => sep.altitude.is_some(),
            NearestMetric::Along(Axis::P) => sep.pressure.is_some(),
            NearestMetric::Along(Axis::T) => sep.time_days.is_some(),
            NearestMetric::Along(_) | NearestMetric::Full => false,
        }
    }

    /// Every point within each separation (inclusive) of `query`, in
    /// ascending index order.
    pub fn within(&self, query: &HyperPoint) -> Vec<usize> {
        let Some(embedded) = self.separation.embed(query) else {
            return Vec::new();
        };
        let radius = (self.separation.component_count() as f64).sqrt();
        self.tree.within(&embedded, radius, |id| {
            self.separation
                .scaled_components(query, &self.points[id])
                .is_some_and(|c| c.iter().all(|&v| v <= 1.0))
        })
    }
}

/// Does `candidate` lie within every separation of `sample`?
pub fn within_separation(separation: &Separation, sample: &HyperPoint, candidate: &HyperPoint) -> bool {
    separation
        .scaled_components(sample, candidate)
        .is_some_and(|c| c.iter().all(|&v| v <= 1.0))
}
