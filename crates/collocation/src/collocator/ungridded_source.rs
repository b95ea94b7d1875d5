//! Ungridded source: constraint, then a point kernel, per sample point.

use cis_common::masked::unravel_index;
use cis_common::{CommonData, Coord, GriddedData, HyperPoint, Result, UngriddedData};

use super::axes_of;
use crate::constraint::{Constraint, ConstraintIndex};
use crate::kernel::PointKernel;

/// Apply `kernel` at every sample, one output column per kernel suffix.
///
/// `cell` is the sample's grid index for the bin constraint and its flat
/// position otherwise.
pub(crate) fn collocate_points<I>(
    source: &[HyperPoint],
    index: &ConstraintIndex,
    kernel: &dyn PointKernel,
    samples: I,
    missing_data_for_missing_sample: bool,
) -> Vec<Vec<Option<f64>>>
where
    I: IntoIterator<Item = (HyperPoint, Vec<usize>)>,
{
    let outputs = kernel.output_suffixes().len();
    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); outputs];
    for (sample, cell) in samples {
        if missing_data_for_missing_sample && sample.masked {
            columns.iter_mut().for_each(|c| c.push(None));
            continue;
        }
        let candidates = index.candidates(&sample, &cell);
        let values = kernel.compute(&sample, candidates.view(source));
        for (column, value) in columns.iter_mut().zip(values) {
            column.push(value);
        }
    }
    columns
}

pub(crate) fn onto_gridded(
    source: &UngriddedData,
    sample: &GriddedData,
    constraint: &Constraint,
    kernel: &dyn PointKernel,
    missing_data_for_missing_sample: bool,
) -> Result<Vec<Vec<Option<f64>>>> {
    let points = source.hyper_points();
    let target: Vec<&Coord> = sample.dim_coords().iter().collect();
    let index = ConstraintIndex::build(
        constraint,
        &points,
        &axes_of(source.coords()),
        &axes_of(sample.all_coords()),
        Some(target.as_slice()),
        kernel.nearest_metric(),
    )?;

    let shape = sample.shape().to_vec();
    let samples = (0..sample.len()).map(|flat| {
        let cell = unravel_index(flat, &shape);
        (sample.point_at(&cell), cell)
    });
    Ok(collocate_points(&points, &index, kernel, samples, missing_data_for_missing_sample))
}

pub(crate) fn onto_ungridded(
    source: &UngriddedData,
    sample: &UngriddedData,
    constraint: &Constraint,
    kernel: &dyn PointKernel,
    missing_data_for_missing_sample: bool,
) -> Result<Vec<Vec<Option<f64>>>> {
    let points = source.hyper_points();
    let index = ConstraintIndex::build(
        constraint,
        &points,
        &axes_of(source.coords()),
        &axes_of(sample.coords()),
        None,
        kernel.nearest_metric(),
    )?;
    let samples = (0..sample.len()).map(|i| (sample.point_at(i), vec![i]));
    Ok(collocate_points(&points, &index, kernel, samples, missing_data_for_missing_sample))
}
