//! Synthetic dataset generators.
//!
//! These generators create predictable, verifiable datasets so collocation
//! and aggregation results can be checked by hand.

use cis_common::time::{PartialDateTime, STD_CALENDAR, STD_TIME_UNITS};
use cis_common::{Axis, Bound, Coord, GriddedData, MaskedArray, Metadata, UngriddedData};

/// A latitude coordinate in degrees north.
pub fn lat_coord(values: Vec<f64>) -> Coord {
    Coord::new(
        values,
        Metadata::new("latitude")
            .with_standard_name("latitude")
            .with_units("degrees_north"),
        Some(Axis::Y),
    )
}

/// A longitude coordinate in degrees east.
pub fn lon_coord(values: Vec<f64>) -> Coord {
    Coord::new(
        values,
        Metadata::new("longitude")
            .with_standard_name("longitude")
            .with_units("degrees_east"),
        Some(Axis::X),
    )
}

/// An altitude coordinate in metres.
pub fn alt_coord(values: Vec<f64>) -> Coord {
    Coord::new(
        values,
        Metadata::new("altitude").with_standard_name("altitude").with_units("m"),
        Some(Axis::Z),
    )
}

/// A pressure coordinate in hPa.
pub fn pres_coord(values: Vec<f64>) -> Coord {
    Coord::new(
        values,
        Metadata::new("air_pressure")
            .with_standard_name("air_pressure")
            .with_units("hPa"),
        Some(Axis::P),
    )
}

/// A time coordinate in days since the standard epoch.
pub fn time_coord(values: Vec<f64>) -> Coord {
    let mut metadata = Metadata::new("time").with_standard_name("time").with_units(STD_TIME_UNITS);
    metadata.calendar = Some(STD_CALENDAR.to_string());
    Coord::new(values, metadata, Some(Axis::T))
}

/// Days since the standard epoch for a date-time string such as
/// `2010-01-01T00:10`.
///
/// # Panics
///
/// Panics on an unparsable date-time; intended for test fixtures only.
pub fn days(datetime: &str) -> f64 {
    PartialDateTime::parse(datetime)
        .and_then(|p| p.to_days(Bound::Lower))
        .unwrap_or_else(|e| panic!("bad fixture date-time '{}': {}", datetime, e))
}

/// A latitude × longitude grid whose value at each cell is `f(lat, lon)`.
///
/// # Example
///
/// ```
/// use test_utils::regular_grid;
///
/// let grid = regular_grid("t", &[0.0, 1.0], &[0.0, 10.0, 20.0], |lat, lon| lat + lon);
/// assert_eq!(grid.shape(), &[2, 3]);
/// assert_eq!(grid.data().get(&[1, 2]), Some(21.0));
/// ```
pub fn regular_grid<F>(name: &str, lats: &[f64], lons: &[f64], f: F) -> GriddedData
where
    F: Fn(f64, f64) -> f64,
{
    let mut values = Vec::with_capacity(lats.len() * lons.len());
    for &lat in lats {
        for &lon in lons {
            values.push(f(lat, lon));
        }
    }
    let data = MaskedArray::from_vec(&[lats.len(), lons.len()], values, None)
        .unwrap_or_else(|e| panic!("generator produced a bad array: {}", e));
    GriddedData::new(
        data,
        Metadata::new(name).with_units("1"),
        vec![lat_coord(lats.to_vec()), lon_coord(lons.to_vec())],
    )
    .unwrap_or_else(|e| panic!("generator produced a bad grid: {}", e))
}

/// A grid holding `a·lon + b·lat + c`, exact under linear interpolation.
pub fn linear_gridded_field(lats: &[f64], lons: &[f64], a: f64, b: f64, c: f64) -> GriddedData {
    regular_grid("linear_field", lats, lons, |lat, lon| a * lon + b * lat + c)
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Scattered points `(lat, lon, value)`; `None` values are masked.
pub fn ungridded_points(name: &str, points: &[(f64, f64, Option<f64>)]) -> UngriddedData {
    let lats = points.iter().map(|p| p.0).collect();
    let lons = points.iter().map(|p| p.1).collect();
    let values: Vec<Option<f64>> = points.iter().map(|p| p.2).collect();
    let data = MaskedArray::from_options(&[points.len()], &values, -999.0)
        .unwrap_or_else(|e| panic!("generator produced a bad array: {}", e));
    UngriddedData::new(
        data,
        Metadata::new(name).with_units("1").with_missing_value(-999.0),
        vec![lat_coord(lats), lon_coord(lons)],
    )
    .unwrap_or_else(|e| panic!("generator produced bad points: {}", e))
}

/// A straight aircraft track of `n` points climbing from `alt0` at 1 m/s,
/// one point per minute from `start` (days), with value equal to the index.
pub fn aircraft_track(n: usize, from: (f64, f64), to: (f64, f64), alt0: f64, start: f64) -> UngriddedData {
    let lats = linspace(from.0, to.0, n);
    let lons = linspace(from.1, to.1, n);
    let alts = (0..n).map(|i| alt0 + 60.0 * i as f64).collect();
    let times = (0..n).map(|i| start + i as f64 / 1440.0).collect();
    let values = (0..n).map(|i| i as f64).collect();
    let data = MaskedArray::from_vec(&[n], values, None)
        .unwrap_or_else(|e| panic!("generator produced a bad array: {}", e));
    UngriddedData::new(
        data,
        Metadata::new("track_index").with_units("1"),
        vec![lat_coord(lats), lon_coord(lons), alt_coord(alts), time_coord(times)],
    )
    .unwrap_or_else(|e| panic!("generator produced a bad track: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_field_values() {
        let grid = linear_gridded_field(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0], 2.0, 1.0, 0.0);
        // data[i, j] = i + 2j
        assert_eq!(grid.data().get(&[1, 2]), Some(5.0));
        assert_eq!(grid.data().get(&[2, 0]), Some(2.0));
    }

    #[test]
    fn test_linspace_endpoints() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
        assert!(linspace(3.0, 4.0, 0).is_empty());
    }

    #[test]
    fn test_ungridded_points_mask() {
        let points = ungridded_points("v", &[(0.0, 0.0, Some(1.0)), (1.0, 1.0, None)]);
        assert_eq!(points.len(), 2);
        assert_eq!(points.data().count_valid(), 1);
    }

    #[test]
    fn test_aircraft_track_axes() {
        let track = aircraft_track(3, (0.0, 0.0), (1.0, 2.0), 1000.0, days("2010-01-01"));
        assert_eq!(track.coord(Axis::Z).unwrap().values(), &[1000.0, 1060.0, 1120.0]);
        assert_eq!(track.coord(Axis::X).unwrap().values(), &[0.0, 1.0, 2.0]);
        let t = track.coord(Axis::T).unwrap().values();
        assert!((t[2] - t[0] - 2.0 / 1440.0).abs() < 1e-9);
    }
}
