//! End-to-end collocation and aggregation scenarios.

use cis_common::{
    fix_longitude_range, Axis, CommonData, DataList, Dataset, ErrorKind, GriddedData, HyperPoint, MaskedArray,
    Metadata, UngriddedData,
};
use collocation::index::GridCellBinIndex;
use collocation::{Aggregator, CollocationConfig, CollocationOptions, Collocator, GridSpec, PluginSpec, Registry};
use test_utils::fixtures::{s1, s2, s3, s4, s5, s6};
use test_utils::{
    aircraft_track, assert_close, days, lat_coord, linear_gridded_field, lon_coord,
    time_coord, ungridded_points,
};

fn collocate(sample: impl Into<Dataset>, source: impl Into<Dataset>, options: &CollocationOptions) -> cis_common::Result<DataList> {
    let registry = Registry::default();
    let config = CollocationConfig::default();
    Collocator::new(&registry, &config).collocate(&sample.into(), &source.into(), options)
}

fn options(constraint: Option<&str>, kernel: Option<&str>) -> CollocationOptions {
    CollocationOptions {
        constraint: constraint.map(|c| PluginSpec::parse(c).unwrap()),
        kernel: kernel.map(|k| PluginSpec::parse(k).unwrap()),
        ..Default::default()
    }
}

fn values(data: &Dataset) -> Vec<Option<f64>> {
    data.masked_data().iter().collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn s1_ungridded_onto_gridded_binned_mean() {
    let out = collocate(s1::sample(), s1::source(), &options(Some("bin"), Some("mean"))).unwrap();
    assert_eq!(out.len(), 1);
    let result = out.first().unwrap().as_gridded().unwrap();
    for (i, row) in s1::EXPECTED.iter().enumerate() {
        for (j, expected) in row.iter().enumerate() {
            assert_eq!(result.data().get(&[i, j]), Some(*expected), "cell [{i}, {j}]");
        }
    }
}

#[test]
fn s1_default_constraint_is_bin_with_moments() {
    let out = collocate(s1::sample(), s1::source(), &CollocationOptions::default()).unwrap();
    assert_eq!(out.names(), vec!["s1_source", "s1_source_std_dev", "s1_source_num_points"]);
    let counts = out.iter().nth(2).unwrap().as_gridded().unwrap();
    assert_eq!(counts.data().get(&[1, 1]), Some(1.0));
}

#[test]
fn s2_separation_mean_with_miss() {
    let constraint = format!("separation[h_sep={}]", s2::H_SEP_KM);
    let out = collocate(s2::sample(), s2::source(), &options(Some(&constraint), Some("mean"))).unwrap();
    let result = values(out.first().unwrap());
    for (got, expected) in result.iter().zip(s2::EXPECTED) {
        assert_close!(*got, expected, 1e-9);
    }
}

#[test]
fn s2_box_collocator_name_expands_to_separation() {
    let out = collocate(
        s2::sample(),
        s2::source(),
        &CollocationOptions {
            collocator: Some(PluginSpec::parse("box[h_sep=10km]").unwrap()),
            kernel: Some(PluginSpec::new("mean")),
            ..Default::default()
        },
    )
    .unwrap();
    assert_close!(values(out.first().unwrap())[0], Some(15.0), 1e-9);
    assert!(out.first().unwrap().metadata().history.contains("collocator: box"));
}

#[test]
fn s3_gridded_onto_ungridded_linear() {
    let out = collocate(s3::sample(), s3::source(), &CollocationOptions::default()).unwrap();
    let result = values(out.first().unwrap());
    for (got, expected) in result.iter().zip(s3::EXPECTED) {
        assert_close!(got.unwrap(), expected, 1e-12);
    }
}

#[test]
fn s4_out_of_range_is_masked_unless_extrapolating() {
    let err = collocate(s4::sample(), s3::source(), &options(None, Some("linear"))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyResult);

    let out = collocate(s4::sample(), s3::source(), &options(None, Some("linear[extrapolate=true]"))).unwrap();
    assert_close!(values(out.first().unwrap())[0].unwrap(), s4::EXPECTED_EXTRAPOLATED, 1e-12);
}

#[test]
fn s5_moments_over_empty_source() {
    let out = collocate(s5::sample(), s5::source(), &options(Some("separation[h_sep=100]"), Some("moments"))).unwrap();
    let columns: Vec<Vec<Option<f64>>> = out.iter().map(values).collect();
    assert_eq!(columns, vec![vec![None], vec![None], vec![Some(0.0)]]);
}

#[test]
fn s6_temporal_aggregation() {
    let registry = Registry::default();
    let config = CollocationConfig::default();
    let data = Dataset::from(s6::source());
    let out = Aggregator::new(&registry, &config)
        .aggregate(&data, &GridSpec::parse(s6::GRID).unwrap(), Some(&PluginSpec::new("mean")))
        .unwrap();
    let result = out.first().unwrap().as_gridded().unwrap();
    assert_eq!(result.shape(), &[2]);
    for (i, expected) in s6::EXPECTED.iter().enumerate() {
        assert_close!(result.data().get(&[i]).unwrap(), *expected, 1e-12);
    }
    let time = &result.dim_coords()[0];
    assert_eq!(time.axis, Some(Axis::T));
    for (got, expected) in time.bounds().unwrap().iter().zip(s6::expected_bounds()) {
        assert_close!(got[0], expected[0], 1e-9);
        assert_close!(got[1], expected[1], 1e-9);
    }
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn output_coordinates_equal_sample_coordinates() {
    let sample = s1::sample();
    let out = collocate(sample.clone(), s1::source(), &options(None, Some("mean"))).unwrap();
    for item in &out {
        let grid = item.as_gridded().unwrap();
        assert_eq!(grid.dim_coords(), sample.dim_coords());
        assert_eq!(grid.aux_coords(), sample.aux_coords());
    }

    let track = aircraft_track(5, (0.2, 0.2), (0.8, 0.8), 100.0, days("2010-01-01"));
    let out = collocate(track.clone(), s3::source(), &CollocationOptions::default()).unwrap();
    let result = out.first().unwrap().as_ungridded().unwrap();
    assert_eq!(result.coords(), track.coords());
}

#[test]
fn masked_sample_points_stay_masked() {
    let sample = ungridded_points("sample", &[(0.5, 0.5, None), (1.0, 1.0, Some(0.0))]);
    let flagged = CollocationOptions {
        missing_data_for_missing_sample: Some(true),
        ..Default::default()
    };
    let out = collocate(sample.clone(), s3::source(), &flagged).unwrap();
    assert_eq!(values(out.first().unwrap()), vec![None, Some(3.0)]);

    let out = collocate(sample, s3::source(), &CollocationOptions::default()).unwrap();
    assert_eq!(values(out.first().unwrap()), vec![Some(1.5), Some(3.0)]);
}

#[test]
fn nearest_with_zero_separation_reproduces_source() {
    let source = ungridded_points(
        "obs",
        &[
            (10.0, 20.0, Some(1.5)),
            (-30.0, 150.0, Some(-2.0)),
            (45.0, -170.0, None),
            (0.0, 0.0, Some(7.25)),
        ],
    );
    let out = collocate(source.clone(), source.clone(), &options(Some("separation[h_sep=0]"), Some("nearest"))).unwrap();
    let result = out.first().unwrap();
    assert_eq!(values(result), source.data().iter().collect::<Vec<_>>());
    assert_eq!(result.as_ungridded().unwrap().coords(), source.coords());
}

#[test]
fn linear_interpolation_is_exact_on_linear_fields() {
    let lats: Vec<f64> = (0..7).map(|i| -30.0 + 10.0 * i as f64).collect();
    let lons: Vec<f64> = (0..9).map(|i| 5.0 * i as f64).collect();
    let source = linear_gridded_field(&lats, &lons, 0.3, -1.7, 4.0);
    let points: Vec<(f64, f64, Option<f64>)> = (0..25)
        .map(|k| {
            let lat = -30.0 + 60.0 * ((k * 7) % 25) as f64 / 24.0;
            let lon = 40.0 * ((k * 11) % 25) as f64 / 24.0;
            (lat, lon, Some(0.0))
        })
        .collect();
    let sample = ungridded_points("sample", &points);
    let out = collocate(sample, source, &options(None, Some("linear"))).unwrap();
    for ((lat, lon, _), got) in points.iter().zip(values(out.first().unwrap())) {
        assert_close!(got.unwrap(), 0.3 * lon - 1.7 * lat + 4.0, 1e-9);
    }
}

#[test]
fn moments_are_consistent() {
    let source = ungridded_points(
        "obs",
        &[(0.1, 0.1, Some(3.0)), (0.2, 0.1, Some(-1.0)), (0.6, 0.6, Some(8.0)), (0.9, 0.9, None)],
    );
    let out = collocate(s1::sample(), source, &options(Some("bin"), Some("moments"))).unwrap();
    let columns: Vec<Vec<Option<f64>>> = out.iter().map(values).collect();
    let (mean, std_dev, count) = (&columns[0], &columns[1], &columns[2]);

    assert!(count.iter().all(|c| c.unwrap() >= 0.0));
    assert_eq!(mean[0], Some(1.0));
    assert!(mean[0].unwrap() >= -1.0 && mean[0].unwrap() <= 3.0);
    assert_close!(std_dev[0].unwrap(), 8.0_f64.sqrt(), 1e-12);
    // single contributor: std-dev masked
    assert_eq!((mean[3], std_dev[3], count[3]), (Some(8.0), None, Some(1.0)));
    // empty cells
    assert_eq!((mean[1], std_dev[1], count[1]), (None, None, Some(0.0)));
}

#[test]
fn bin_index_partitions_points() {
    let sample = s1::sample();
    let points: Vec<HyperPoint> = (0..40)
        .map(|i| HyperPoint::new(-0.2 + 0.035 * i as f64, 1.3 - 0.04 * i as f64).with_val(i as f64))
        .collect();
    let target: Vec<_> = sample.dim_coords().iter().collect();
    let index = GridCellBinIndex::build(&points, &target).unwrap();

    let mut seen: Vec<usize> = index.cells().flat_map(|c| c.points.to_vec()).collect();
    seen.extend_from_slice(index.dropped());
    seen.sort_unstable();
    assert_eq!(seen, (0..points.len()).collect::<Vec<_>>());
}

#[test]
fn longitude_rotation_round_trips() {
    let original = vec![-179.5, -90.0, 0.0, 45.25, 179.0];
    let mut coord = test_utils::lon_coord(original.clone());
    coord.set_longitude_range(0.0);
    assert!(coord.values().iter().all(|v| (0.0..360.0).contains(v)));
    coord.set_longitude_range(-180.0);
    assert_eq!(coord.values(), original.as_slice());

    for v in original {
        let rotated = fix_longitude_range(fix_longitude_range(v, 0.0), -180.0);
        assert_close!((rotated - v).rem_euclid(360.0), 0.0, 1e-9);
    }
}

#[test]
fn single_cell_mean_aggregation_equals_data_mean() {
    let track = aircraft_track(30, (-40.0, -100.0), (60.0, 120.0), 0.0, days("2010-06-01"));
    let expected = track.data().compressed().iter().sum::<f64>() / track.len() as f64;
    let registry = Registry::default();
    let config = CollocationConfig::default();
    let out = Aggregator::new(&registry, &config)
        .aggregate(
            &Dataset::from(track),
            &GridSpec::parse("x=[-180,180,360],y=[-90,90,180]").unwrap(),
            Some(&PluginSpec::new("mean")),
        )
        .unwrap();
    let result = out.first().unwrap().as_gridded().unwrap();
    assert_eq!(result.len(), 1);
    assert_close!(result.data().get(&[0, 0]).unwrap(), expected, 1e-9);
}

#[test]
fn history_is_append_only() {
    let mut source = s1::source();
    source.metadata.history = "2009-01-01T00:00:00Z Read from aircraft.nc".to_string();
    let out = collocate(s1::sample(), source.clone(), &options(None, Some("mean"))).unwrap();
    let history = &out.first().unwrap().metadata().history;
    assert!(history.starts_with(&source.metadata.history));
    assert!(history.len() > source.metadata.history.len());
    assert!(history.contains("Collocated"));
}

// ============================================================================
// Further behaviour
// ============================================================================

#[test]
fn gridded_onto_gridded_nearest() {
    let source = linear_gridded_field(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0], 2.0, 1.0, 0.0);
    let sample: GriddedData = test_utils::regular_grid("target", &[0.4, 1.6], &[0.6, 2.0], |_, _| 0.0);
    let out = collocate(sample, source, &options(None, Some("nearest"))).unwrap();
    let result = out.first().unwrap().as_gridded().unwrap();
    // nearest lat indices 0, 2; lon indices 1, 2
    assert_eq!(result.data().get(&[0, 0]), Some(2.0));
    assert_eq!(result.data().get(&[1, 1]), Some(6.0));
}

#[test]
fn aircraft_track_with_altitude_and_time_separation() {
    let start = days("2010-01-01T12:00");
    let source = aircraft_track(20, (0.0, 0.0), (0.19, 0.0), 1000.0, start);
    let sample = aircraft_track(1, (0.05, 0.0), (0.05, 0.0), 1300.0, start + 5.0 / 1440.0);
    let out = collocate(
        sample,
        source,
        &options(Some("separation[h_sep=50km,a_sep=100m,t_sep=PT2M]"), Some("count")),
    )
    .unwrap();
    // Points 4, 5, 6 are within 2 minutes; altitudes 1240, 1300, 1360.
    assert_eq!(values(out.first().unwrap()), vec![Some(3.0)]);
}

#[test]
fn nearest_horizontal_without_constraint_matches_exhaustive_search() {
    // Rows of 72 points share a latitude; a few values are masked.
    let mut points = Vec::new();
    for lat in (-60..=60).step_by(5) {
        for lon in (-180..180).step_by(5) {
            let value = (points.len() % 17 != 3).then_some(points.len() as f64);
            points.push((lat as f64, lon as f64, value));
        }
    }
    let source = ungridded_points("grid_obs", &points);
    let queries = [(0.0, 0.0), (12.4, 177.6), (-58.0, -179.9), (33.3, 7.7), (61.0, 2.4), (5.0, 179.99)];
    let sample = ungridded_points(
        "sites",
        &queries.iter().map(|&(lat, lon)| (lat, lon, Some(0.0))).collect::<Vec<_>>(),
    );

    let out = collocate(sample.clone(), source.clone(), &options(Some("dummy"), Some("nearest_horizontal"))).unwrap();

    let source_points = source.hyper_points();
    let expected: Vec<Option<f64>> = sample
        .hyper_points()
        .iter()
        .map(|q| {
            source_points
                .iter()
                .filter_map(|p| Some((q.haversine_km(p)?, p.valid_value()?)))
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, v)| v)
        })
        .collect();
    assert_eq!(values(out.first().unwrap()), expected);
    // (0, 0) is index 36 on the equator row.
    assert_eq!(expected[0], Some((12 * 72 + 36) as f64));
}

#[test]
fn nearest_time_within_time_separation() {
    let start = days("2010-01-01T00:00");
    let source = aircraft_track(200, (0.0, 0.0), (1.0, 1.0), 1000.0, start);
    // Samples 0.4 minutes after source points 10..13, then one a day early.
    let mut sample_times: Vec<f64> = (10..14).map(|i| start + (i as f64 + 0.4) / 1440.0).collect();
    sample_times.push(start - 1.0);
    let sample = UngriddedData::new(
        MaskedArray::from_vec(&[5], vec![0.0; 5], None).unwrap(),
        Metadata::new("sample"),
        vec![
            lat_coord(vec![50.0; 5]),
            lon_coord(vec![50.0; 5]),
            time_coord(sample_times),
        ],
    )
    .unwrap();

    let routed = collocate(
        sample.clone(),
        source.clone(),
        &options(Some("separation[t_sep=PT3M]"), Some("nearest_time")),
    )
    .unwrap();
    assert_eq!(
        values(routed.first().unwrap()),
        vec![Some(10.0), Some(11.0), Some(12.0), Some(13.0), None]
    );

    // A horizontal separation wider than the Earth leaves the candidate set
    // unchanged but needs the full scan.
    let scanned = collocate(
        sample,
        source,
        &options(Some("separation[t_sep=PT3M,h_sep=30000km]"), Some("nearest_time")),
    )
    .unwrap();
    assert_eq!(values(scanned.first().unwrap()), values(routed.first().unwrap()));
}

#[test]
fn incompatible_options_are_rejected() {
    let err = collocate(s3::sample(), s3::source(), &options(Some("separation[h_sep=1]"), None)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOptions);

    let err = collocate(s2::sample(), s2::source(), &options(None, Some("magic"))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOptions);

    let err = collocate(s2::sample(), s2::source(), &options(Some("separation[t_sep=1]"), None)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CoordinateNotFound);
}

#[test]
fn var_name_renames_outputs() {
    let out = collocate(
        s1::sample(),
        s1::source(),
        &CollocationOptions {
            var_name: Some("aod".to_string()),
            kernel: Some(PluginSpec::new("moments")),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(out.names(), vec!["aod", "aod_std_dev", "aod_num_points"]);
    let count = out.iter().nth(2).unwrap();
    assert_eq!(count.metadata().units, "1");
}
