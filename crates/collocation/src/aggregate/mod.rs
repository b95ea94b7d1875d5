//! Aggregation onto regular grids and coordinate collapse.
//!
//! Ungridded data is binned onto a grid built from the explicit ranges of a
//! [`GridSpec`]. Gridded data is either collapsed along whole dimensions or,
//! when ranges are given, flattened to cell centres and re-binned.

mod collapse;
mod grid_spec;

use std::fmt;

use cis_common::masked::unravel_index;
use cis_common::{
    Axis, CisError, CommonData, Coord, DataList, Dataset, GriddedData, HistoryRecord, HyperPoint, MaskedArray,
    Metadata, Result, UngriddedData,
};

pub use grid_spec::{axis_metadata, AxisRange, AxisSpec, GridSpec};

use crate::collocator::{build_outputs, collocate_points, OutputTemplate};
use crate::config::CollocationConfig;
use crate::constraint::ConstraintIndex;
use crate::index::GridCellBinIndex;
use crate::kernel::PointKernel;
use crate::params::PluginSpec;
use crate::registry::Registry;

use collapse::{collapse, collapsed_coord, dims_of_axes};

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self
            .items()
            .iter()
            .map(|item| match item {
                AxisSpec::Collapse(axis) => axis.to_string(),
                AxisSpec::Range(r) => format!("{}=[{},{},{}]", r.axis, r.start, r.end, r.delta),
            })
            .collect();
        write!(f, "{}", items.join(","))
    }
}

/// Runs aggregations with a registry and configuration.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator<'a> {
    registry: &'a Registry,
    config: &'a CollocationConfig,
}

impl<'a> Aggregator<'a> {
    pub fn new(registry: &'a Registry, config: &'a CollocationConfig) -> Self {
        Self { registry, config }
    }

    fn point_kernel(&self, kernel: Option<&PluginSpec>) -> Result<Box<dyn PointKernel>> {
        let spec = kernel
            .cloned()
            .unwrap_or_else(|| PluginSpec::new(self.config.default_point_kernel.clone()));
        self.registry.kernel(&spec)?.into_point()
    }

    /// Aggregate `data` onto `grid` with a point kernel (default from
    /// configuration, `moments` unless overridden).
    pub fn aggregate(&self, data: &Dataset, grid: &GridSpec, kernel: Option<&PluginSpec>) -> Result<DataList> {
        let kernel = self.point_kernel(kernel)?;
        let (target, values, operation) = match data {
            Dataset::Ungridded(u) => {
                let target = ungridded_target(u, grid)?;
                let values = bin_onto(&u.hyper_points(), &target, kernel.as_ref())?;
                (target, values, "Aggregated")
            }
            Dataset::Gridded(g) => {
                let dims = dims_of_axes(g, &grid.axes())?;
                if grid.has_ranges() {
                    let target = regrid_target(g, grid)?;
                    let values = bin_onto(&g.hyper_points(), &target, kernel.as_ref())?;
                    (target, values, "Aggregated")
                } else {
                    let (target, values) = collapse(g, &dims, kernel.as_ref())?;
                    (target, values, "Collapsed")
                }
            }
        };
        self.finish(data, grid, kernel.as_ref(), target, values, operation)
    }

    /// Collapse `data` along every axis in `grid`; explicit ranges are rejected.
    pub fn collapse(&self, data: &Dataset, grid: &GridSpec, kernel: Option<&PluginSpec>) -> Result<DataList> {
        if grid.has_ranges() {
            return Err(CisError::invalid_options(format!(
                "collapse takes axis names only, not ranges ('{}')",
                grid
            )));
        }
        self.aggregate(data, grid, kernel)
    }

    fn finish(
        &self,
        data: &Dataset,
        grid: &GridSpec,
        kernel: &dyn PointKernel,
        target: GriddedData,
        values: Vec<Vec<Option<f64>>>,
        operation: &str,
    ) -> Result<DataList> {
        let record = HistoryRecord::new(operation)
            .field("grid", grid.to_string())
            .field("kernel", kernel.spec().to_string())
            .field("files", data.filenames().join(", "))
            .render();
        let cells = target.len();
        let sample = Dataset::from(target);
        let template = OutputTemplate::from_dataset(&sample)?;
        let outputs = build_outputs(&template, data, data.name(), kernel.output_suffixes(), values, &record)?;

        metrics::counter!("aggregation_cells_total").increment(cells as u64);
        tracing::info!(
            variable = data.name(),
            cells,
            valid = outputs.first().map(|d| d.count_valid()).unwrap_or(0),
            kernel = kernel.name(),
            grid = %grid,
            "aggregation complete"
        );
        Ok(outputs)
    }
}

/// A coordinate-only grid with the given dimension coordinates.
fn empty_grid(name: &str, fill: f64, coords: Vec<Coord>) -> Result<GriddedData> {
    let shape: Vec<usize> = coords.iter().map(Coord::len).collect();
    GriddedData::new(MaskedArray::fully_masked(&shape, fill), Metadata::new(name), coords)
}

/// Target grid for ungridded input: one dimension per explicit range, a
/// scalar coordinate for every other axis the data carries.
fn ungridded_target(data: &UngriddedData, grid: &GridSpec) -> Result<GriddedData> {
    for axis in grid.axes() {
        if data.coord(axis).is_none() {
            return Err(CisError::coordinate_not_found(format!(
                "'{}' has no {axis} coordinate to aggregate over",
                data.name()
            )));
        }
    }
    let ranges = grid.ranges();
    let coords = ranges
        .iter()
        .map(|r| r.to_coord(data.coord(r.axis).map(|c| &c.metadata)))
        .collect::<Result<Vec<_>>>()?;
    let mut target = empty_grid(data.name(), data.metadata.fill_value(), coords)?;

    for coord in data.coords() {
        let Some(axis) = coord.axis else { continue };
        if ranges.iter().any(|r| r.axis == axis) {
            continue;
        }
        let values = coord.values().iter().copied().filter(|v| !v.is_nan());
        let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if lo.is_finite() && hi.is_finite() {
            let mut metadata = coord.metadata.clone();
            if axis == Axis::T {
                metadata = axis_metadata(axis, Some(&metadata));
            }
            let scalar = Coord::scalar((lo + hi) / 2.0, metadata, Some(axis)).with_bounds(vec![[lo, hi]])?;
            target.add_aux_coord(scalar, Vec::new())?;
        }
    }
    Ok(target)
}

/// Target grid for re-binning gridded input: the explicit ranges replace
/// their dimensions, collapsed axes become scalar coordinates, and the rest
/// of the dimension coordinates are kept.
fn regrid_target(data: &GriddedData, grid: &GridSpec) -> Result<GriddedData> {
    let ranges = grid.ranges();
    let collapsed = grid.collapsed();
    let mut coords = Vec::new();
    let mut scalars = Vec::new();
    for coord in data.dim_coords() {
        let axis = coord.axis.ok_or_else(|| {
            CisError::coordinate_not_found(format!(
                "dimension '{}' of '{}' has no axis role and cannot be re-binned",
                coord.name(),
                data.name()
            ))
        })?;
        if let Some(range) = ranges.iter().find(|r| r.axis == axis) {
            coords.push(range.to_coord(Some(&coord.metadata))?);
        } else if collapsed.contains(&axis) {
            scalars.extend(collapsed_coord(coord)?);
        } else {
            let mut kept = coord.clone();
            if !kept.has_bounds() {
                let bounds = kept.guess_bounds();
                kept.set_bounds(Some(bounds))?;
            }
            coords.push(kept);
        }
    }
    let mut target = empty_grid(data.name(), data.metadata.fill_value(), coords)?;
    for aux in data.aux_coords().iter().filter(|a| a.dims.is_empty()) {
        target.add_aux_coord(aux.coord.clone(), Vec::new())?;
    }
    for scalar in scalars {
        target.add_aux_coord(scalar, Vec::new())?;
    }
    Ok(target)
}

/// Bin `points` onto the cells of `target` and reduce each cell with `kernel`.
fn bin_onto(points: &[HyperPoint], target: &GriddedData, kernel: &dyn PointKernel) -> Result<Vec<Vec<Option<f64>>>> {
    let dims: Vec<&Coord> = target.dim_coords().iter().collect();
    let index = GridCellBinIndex::build(points, &dims)?;
    if !index.dropped().is_empty() {
        tracing::debug!(dropped = index.dropped().len(), "points outside the aggregation grid");
    }
    let index = ConstraintIndex::Bin(index);
    let shape = target.shape().to_vec();
    let samples = (0..target.len()).map(|flat| {
        let cell = unravel_index(flat, &shape);
        (target.point_at(&cell), cell)
    });
    Ok(collocate_points(points, &index, kernel, samples, false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(values: &[(f64, f64, f64)]) -> Dataset {
        let lats = values.iter().map(|p| p.0).collect();
        let lons = values.iter().map(|p| p.1).collect();
        let data = values.iter().map(|p| p.2).collect();
        UngriddedData::new(
            MaskedArray::from_vec(&[values.len()], data, None).unwrap(),
            Metadata::new("v").with_missing_value(-1.0),
            vec![
                Coord::new(lats, Metadata::new("latitude"), Some(Axis::Y)),
                Coord::new(lons, Metadata::new("longitude"), Some(Axis::X)),
            ],
        )
        .unwrap()
        .into()
    }

    fn run(data: &Dataset, grid: &str, kernel: &str) -> Result<DataList> {
        let registry = Registry::default();
        let config = CollocationConfig::default();
        Aggregator::new(&registry, &config).aggregate(data, &GridSpec::parse(grid)?, Some(&PluginSpec::new(kernel)))
    }

    #[test]
    fn test_ungridded_binned_with_scalar_latitude() {
        let data = points(&[(1.0, 0.5, 1.0), (2.0, 1.5, 3.0), (3.0, 1.6, 5.0), (4.0, 5.0, 7.0)]);
        let out = run(&data, "x=[0,2,1]", "mean").unwrap();
        let result = out.first().unwrap().as_gridded().unwrap();
        assert_eq!(result.data().get(&[0]), Some(1.0));
        assert_eq!(result.data().get(&[1]), Some(4.0));
        let lat = result.aux_of_axis(Axis::Y).unwrap();
        assert_eq!(lat.coord.values(), &[2.5]);
        assert_eq!(lat.coord.bounds().unwrap(), &[[1.0, 4.0]]);
        assert!(result.metadata.history.contains("Aggregated"));
    }

    #[test]
    fn test_default_kernel_is_moments() {
        let data = points(&[(0.0, 0.0, 1.0), (0.0, 0.5, 3.0)]);
        let registry = Registry::default();
        let config = CollocationConfig::default();
        let out = Aggregator::new(&registry, &config)
            .aggregate(&data, &GridSpec::parse("x=[0,1,1]").unwrap(), None)
            .unwrap();
        assert_eq!(out.names(), vec!["v", "v_std_dev", "v_num_points"]);
    }

    #[test]
    fn test_missing_axis_is_reported() {
        let data = points(&[(0.0, 0.0, 1.0)]);
        let err = run(&data, "t=[0,1,1]", "mean").unwrap_err();
        assert_eq!(err.kind(), cis_common::ErrorKind::CoordinateNotFound);
    }

    #[test]
    fn test_linear_kernel_is_rejected() {
        let data = points(&[(0.0, 0.0, 1.0)]);
        let err = run(&data, "x=[0,1,1]", "linear").unwrap_err();
        assert_eq!(err.kind(), cis_common::ErrorKind::InvalidOptions);
    }

    #[test]
    fn test_collapse_rejects_ranges() {
        let data = points(&[(0.0, 0.0, 1.0)]);
        let registry = Registry::default();
        let config = CollocationConfig::default();
        let err = Aggregator::new(&registry, &config)
            .collapse(&data, &GridSpec::parse("x=[0,1,1]").unwrap(), None)
            .unwrap_err();
        assert_eq!(err.kind(), cis_common::ErrorKind::InvalidOptions);
    }

    #[test]
    fn test_gridded_rebin_and_collapse() {
        let grid = GriddedData::new(
            MaskedArray::from_vec(&[2, 4], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], None).unwrap(),
            Metadata::new("g"),
            vec![
                Coord::new(vec![0.0, 10.0], Metadata::new("latitude"), Some(Axis::Y)),
                Coord::new(vec![0.5, 1.5, 2.5, 3.5], Metadata::new("longitude"), Some(Axis::X)),
            ],
        )
        .unwrap();
        let data = Dataset::from(grid);

        let out = run(&data, "x=[0,4,2]", "mean").unwrap();
        let rebinned = out.first().unwrap().as_gridded().unwrap();
        assert_eq!(rebinned.shape(), &[2, 2]);
        assert_eq!(rebinned.data().get(&[0, 0]), Some(1.5));
        assert_eq!(rebinned.data().get(&[1, 1]), Some(7.5));

        let out = run(&data, "y", "sum").unwrap();
        let collapsed = out.first().unwrap().as_gridded().unwrap();
        assert_eq!(collapsed.shape(), &[4]);
        assert_eq!(collapsed.data().get(&[3]), Some(12.0));
        assert!(collapsed.metadata.history.contains("Collapsed"));
    }
}
