//! Fixtures for the end-to-end collocation and aggregation scenarios.
//!
//! Each module builds the inputs of one scenario and exposes its expected
//! outputs alongside.

use cis_common::{GriddedData, MaskedArray, Metadata, UngriddedData, EARTH_RADIUS_KM};

use crate::generators::{days, lat_coord, lon_coord, time_coord, ungridded_points};

/// Kilometres per degree of longitude at the equator.
pub fn km_per_degree() -> f64 {
    EARTH_RADIUS_KM * std::f64::consts::PI / 180.0
}

/// A coordinate-only grid over the given latitude and longitude cells.
pub fn sample_grid(lats: Vec<f64>, lat_bounds: Vec<[f64; 2]>, lons: Vec<f64>, lon_bounds: Vec<[f64; 2]>) -> GriddedData {
    let shape = [lats.len(), lons.len()];
    let lat = lat_coord(lats)
        .with_bounds(lat_bounds)
        .unwrap_or_else(|e| panic!("bad fixture bounds: {}", e));
    let lon = lon_coord(lons)
        .with_bounds(lon_bounds)
        .unwrap_or_else(|e| panic!("bad fixture bounds: {}", e));
    let len = shape.iter().product();
    let data = MaskedArray::from_vec(&shape, vec![0.0; len], None)
        .unwrap_or_else(|e| panic!("bad fixture array: {}", e));
    GriddedData::new(data, Metadata::new("sample"), vec![lat, lon])
        .unwrap_or_else(|e| panic!("bad fixture grid: {}", e))
}

/// Ungridded → gridded binned mean.
pub mod s1 {
    use super::*;

    pub fn source() -> UngriddedData {
        ungridded_points(
            "s1_source",
            &[
                (0.25, 0.25, Some(1.0)),
                (0.75, 0.25, Some(2.0)),
                (0.25, 0.75, Some(3.0)),
                (0.75, 0.75, Some(4.0)),
            ],
        )
    }

    /// Two latitude cells [0, 0.5), [0.5, 1] by two longitude cells.
    pub fn sample() -> GriddedData {
        let centres = vec![0.25, 0.75];
        let bounds = vec![[0.0, 0.5], [0.5, 1.0]];
        sample_grid(centres.clone(), bounds.clone(), centres, bounds)
    }

    /// Expected means, indexed `[lat][lon]`.
    pub const EXPECTED: [[f64; 2]; 2] = [[1.0, 3.0], [2.0, 4.0]];
}

/// Separation-constrained mean with a miss.
///
/// Longitudes are placed at kilometre distances along the equator so the
/// 10 km separation selects exactly the first two source points.
pub mod s2 {
    use super::*;

    pub const H_SEP_KM: f64 = 10.0;

    pub fn source() -> UngriddedData {
        let k = km_per_degree();
        ungridded_points(
            "s2_source",
            &[
                (0.0, 0.0, Some(10.0)),
                (0.0, 5.0 / k, Some(20.0)),
                (0.0, 100.0 / k, Some(30.0)),
            ],
        )
    }

    /// Sample points 2 km and 50 km east of the origin.
    pub fn sample() -> UngriddedData {
        let k = km_per_degree();
        ungridded_points("s2_sample", &[(0.0, 2.0 / k, Some(0.0)), (0.0, 50.0 / k, Some(0.0))])
    }

    pub const EXPECTED: [Option<f64>; 2] = [Some(15.0), None];
}

/// Linear interpolation of `data[i, j] = i + 2j` on a 3 × 3 grid.
pub mod s3 {
    use super::*;
    use crate::generators::linear_gridded_field;

    /// Latitude index `i`, longitude index `j`, both equal to the coordinate.
    pub fn source() -> GriddedData {
        linear_gridded_field(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0], 2.0, 1.0, 0.0)
    }

    pub fn sample() -> UngriddedData {
        ungridded_points("s3_sample", &[(0.5, 0.5, Some(0.0)), (1.5, 1.25, Some(0.0))])
    }

    pub const EXPECTED: [f64; 2] = [1.5, 4.0];
}

/// Linear interpolation outside the source grid.
pub mod s4 {
    use super::*;

    pub fn sample() -> UngriddedData {
        ungridded_points("s4_sample", &[(-0.1, 1.0, Some(0.0))])
    }

    pub const EXPECTED_EXTRAPOLATED: f64 = 1.9;
}

/// Moments over an empty source.
pub mod s5 {
    use super::*;

    pub fn source() -> UngriddedData {
        ungridded_points("s5_source", &[])
    }

    pub fn sample() -> UngriddedData {
        ungridded_points("s5_sample", &[(12.0, 34.0, Some(1.0))])
    }
}

/// Temporal aggregation of six ten-minute points into half-hour bins.
pub mod s6 {
    use super::*;

    pub const GRID: &str = "t=[2010-01-01T00:00,2010-01-01T01:00,PT30M]";

    pub fn source() -> UngriddedData {
        let times: Vec<f64> = (0..6)
            .map(|i| days(&format!("2010-01-01T00:{:02}", i * 10)))
            .collect();
        let n = times.len();
        let data = MaskedArray::from_vec(&[n], (1..=6).map(f64::from).collect(), None)
            .unwrap_or_else(|e| panic!("bad fixture array: {}", e));
        UngriddedData::new(
            data,
            Metadata::new("s6_source").with_units("1"),
            vec![lat_coord(vec![0.0; n]), lon_coord(vec![0.0; n]), time_coord(times)],
        )
        .unwrap_or_else(|e| panic!("bad fixture points: {}", e))
    }

    pub const EXPECTED: [f64; 2] = [2.0, 5.0];

    /// Expected time bounds of the two output bins.
    pub fn expected_bounds() -> [[f64; 2]; 2] {
        let t0 = days("2010-01-01T00:00");
        let t1 = days("2010-01-01T00:30");
        let t2 = days("2010-01-01T01:00");
        [[t0, t1], [t1, t2]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s2_distances() {
        let source = s2::source();
        let lons = source.coords()[1].values();
        assert!((lons[1] * km_per_degree() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_s1_grid_shape() {
        let grid = s1::sample();
        assert_eq!(grid.shape(), &[2, 2]);
        assert!(grid.dim_coords().iter().all(|c| c.has_bounds()));
    }

    #[test]
    fn test_s6_times_increase() {
        let source = s6::source();
        let t = source.coords()[2].values();
        assert!(t.windows(2).all(|w| w[1] > w[0]));
    }
}
