//! HyperPoint: one sample in (lat, lon, alt, pres, time) space plus a value.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::coord::Axis;

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres between two (lat, lon) pairs in degrees.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// A point with up to five coordinates, an optional value and a mask flag.
///
/// Unset coordinate slots are `None`, which is distinct from zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HyperPoint {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
    pub pres: Option<f64>,
    pub time: Option<f64>,
    pub val: Option<f64>,
    pub masked: bool,
}

impl HyperPoint {
    /// A horizontal point.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
            ..Default::default()
        }
    }

    pub fn with_alt(mut self, alt: f64) -> Self {
        self.alt = Some(alt);
        self
    }

    pub fn with_pres(mut self, pres: f64) -> Self {
        self.pres = Some(pres);
        self
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_val(mut self, val: f64) -> Self {
        self.val = Some(val);
        self
    }

    pub fn with_mask(mut self, masked: bool) -> Self {
        self.masked = masked;
        self
    }

    /// Coordinate for an axis role.
    pub fn get(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::X => self.lon,
            Axis::Y => self.lat,
            Axis::Z => self.alt,
            Axis::P => self.pres,
            Axis::T => self.time,
        }
    }

    pub fn set(&mut self, axis: Axis, value: Option<f64>) {
        let slot = match axis {
            Axis::X => &mut self.lon,
            Axis::Y => &mut self.lat,
            Axis::Z => &mut self.alt,
            Axis::P => &mut self.pres,
            Axis::T => &mut self.time,
        };
        *slot = value;
    }

    /// The value if present and not masked.
    pub fn valid_value(&self) -> Option<f64> {
        if self.masked {
            None
        } else {
            self.val.filter(|v| !v.is_nan())
        }
    }

    /// Great-circle distance in km, if both points carry lat and lon.
    pub fn haversine_km(&self, other: &HyperPoint) -> Option<f64> {
        match (self.lat, self.lon, other.lat, other.lon) {
            (Some(lat1), Some(lon1), Some(lat2), Some(lon2)) => {
                Some(haversine(lat1, lon1, lat2, lon2))
            }
            _ => None,
        }
    }

    /// Absolute difference along one axis, if both points carry it.
    pub fn axis_distance(&self, other: &HyperPoint, axis: Axis) -> Option<f64> {
        match (self.get(axis), other.get(axis)) {
            (Some(a), Some(b)) => Some((a - b).abs()),
            _ => None,
        }
    }

    /// Compare coordinate tuples (lat, lon, alt, pres, time); unset sorts first.
    pub fn cmp_coords(&self, other: &HyperPoint) -> Ordering {
        let slots = |p: &HyperPoint| [p.lat, p.lon, p.alt, p.pres, p.time];
        slots(self)
            .iter()
            .zip(slots(other).iter())
            .map(|(a, b)| cmp_option(*a, *b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

fn cmp_option(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.total_cmp(&y),
    }
}

impl PartialEq for HyperPoint {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HyperPoint {}

impl PartialOrd for HyperPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HyperPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_coords(other)
            .then_with(|| cmp_option(self.val, other.val))
            .then_with(|| self.masked.cmp(&other.masked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // London to Paris ≈ 344 km
        let d = haversine(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((d - 343.5).abs() < 2.0, "got {}", d);
    }

    #[test]
    fn test_haversine_same_point() {
        assert_eq!(haversine(35.2, -97.5, 35.2, -97.5), 0.0);
    }

    #[test]
    fn test_haversine_crosses_dateline() {
        let d1 = haversine(0.0, 179.5, 0.0, -179.5);
        let d2 = haversine(0.0, 0.0, 0.0, 1.0);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn test_unset_differs_from_zero() {
        let a = HyperPoint::new(0.0, 0.0);
        let b = HyperPoint::new(0.0, 0.0).with_alt(0.0);
        assert_ne!(a, b);
        assert!(a < b);
        assert_eq!(a.axis_distance(&b, Axis::Z), None);
    }

    #[test]
    fn test_total_order_is_by_coordinates() {
        let mut points = vec![
            HyperPoint::new(1.0, 0.0),
            HyperPoint::new(0.0, 5.0),
            HyperPoint::new(0.0, 1.0).with_time(2.0),
            HyperPoint::new(0.0, 1.0).with_time(1.0),
        ];
        points.sort();
        assert_eq!(points[0].lon, Some(1.0));
        assert_eq!(points[0].time, Some(1.0));
        assert_eq!(points[2].lon, Some(5.0));
        assert_eq!(points[3].lat, Some(1.0));
    }

    #[test]
    fn test_valid_value_respects_mask() {
        let p = HyperPoint::new(0.0, 0.0).with_val(3.0);
        assert_eq!(p.valid_value(), Some(3.0));
        assert_eq!(p.with_mask(true).valid_value(), None);
        assert_eq!(HyperPoint::new(0.0, 0.0).with_val(f64::NAN).valid_value(), None);
    }
}
