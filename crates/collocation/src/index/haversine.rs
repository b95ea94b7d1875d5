//! Great-circle nearest-neighbour and radius search over (lat, lon) points.

use cis_common::{haversine, HyperPoint, EARTH_RADIUS_KM};

use super::kdtree::KdTree;

/// Position on a sphere of radius `EARTH_RADIUS_KM`, in km.
///
/// Chord length between two embedded points never exceeds their
/// great-circle distance, which makes it a valid pruning bound.
pub fn embed_lat_lon(lat: f64, lon: f64) -> [f64; 3] {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    [
        EARTH_RADIUS_KM * lat.cos() * lon.cos(),
        EARTH_RADIUS_KM * lat.cos() * lon.sin(),
        EARTH_RADIUS_KM * lat.sin(),
    ]
}

/// Spatial index answering "nearest" and "within r km" by haversine distance.
///
/// Points without a valid value, and points without a finite latitude and
/// longitude, are never returned. Results refer to positions in the slice the index was
/// built from.
#[derive(Debug)]
pub struct HaversineIndex {
    tree: KdTree,
    lat_lon: Vec<(f64, f64)>,
}

impl HaversineIndex {
    pub fn build(points: &[HyperPoint]) -> Self {
        let mut embedded = Vec::with_capacity(points.len() * 3);
        let mut lat_lon = Vec::with_capacity(points.len());
        let mut visible = Vec::new();
        for (i, p) in points.iter().enumerate() {
            let (lat, lon) = match (p.lat, p.lon) {
                (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => (lat, lon),
                _ => (f64::NAN, f64::NAN),
            };
            if p.valid_value().is_some() && lat.is_finite() {
                visible.push(i);
            }
            let e = if lat.is_finite() { embed_lat_lon(lat, lon) } else { [0.0; 3] };
            embedded.extend_from_slice(&e);
            lat_lon.push((lat, lon));
        }
        tracing::debug!(points = points.len(), visible = visible.len(), "building haversine index");
        metrics::counter!("index_builds_total").increment(1);
        Self {
            tree: KdTree::build(3, &embedded, &visible),
            lat_lon,
        }
    }

    /// Number of searchable points.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Closest point and its distance in km; ties go to the lower index.
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<(usize, f64)> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        let query = embed_lat_lon(lat, lon);
        self.tree.nearest(&query, |id| {
            let (plat, plon) = self.lat_lon[id];
            haversine(lat, lon, plat, plon)
        })
    }

    /// Every point within `radius_km` (inclusive), in ascending index order.
    pub fn within(&self, lat: f64, lon: f64, radius_km: f64) -> Vec<usize> {
        if !lat.is_finite() || !lon.is_finite() || radius_km.is_nan() {
            return Vec::new();
        }
        let query = embed_lat_lon(lat, lon);
        self.tree.within(&query, radius_km, |id| {
            let (plat, plon) = self.lat_lon[id];
            haversine(lat, lon, plat, plon) <= radius_km
        })
    }
}
