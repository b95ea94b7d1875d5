//! Coordinate collapse of gridded data along whole dimensions.

use cis_common::masked::{ravel_index, unravel_index};
use cis_common::{Axis, CisError, CommonData, Coord, GriddedData, HyperPoint, MaskedArray, Metadata, Result};

use crate::kernel::{Candidates, PointKernel};

/// A scalar coordinate spanning all of `coord`'s cells.
pub(crate) fn collapsed_coord(coord: &Coord) -> Result<Option<Coord>> {
    let bounds = coord.bounds_or_guess();
    let lo = bounds.iter().flat_map(|b| *b).filter(|v| !v.is_nan()).fold(f64::INFINITY, f64::min);
    let hi = bounds.iter().flat_map(|b| *b).filter(|v| !v.is_nan()).fold(f64::NEG_INFINITY, f64::max);
    if !(lo.is_finite() && hi.is_finite()) {
        return Ok(None);
    }
    Coord::scalar((lo + hi) / 2.0, coord.metadata.clone(), coord.axis)
        .with_bounds(vec![[lo, hi]])
        .map(Some)
}

/// Data dimension for each named axis; only dimension coordinates qualify.
pub(crate) fn dims_of_axes(source: &GriddedData, axes: &[Axis]) -> Result<Vec<usize>> {
    axes.iter()
        .map(|&axis| {
            source.dim_of_axis(axis).ok_or_else(|| {
                let reason = if source.aux_of_axis(axis).is_some() {
                    "is only an auxiliary coordinate and cannot be aggregated"
                } else {
                    "is not present"
                };
                CisError::coordinate_not_found(format!(
                    "{axis} axis of '{}' {} ({})",
                    source.name(),
                    reason,
                    describe_files(source.filenames())
                ))
            })
        })
        .collect()
}

fn describe_files(files: &[String]) -> String {
    if files.is_empty() {
        "in memory".to_string()
    } else {
        files.join(", ")
    }
}

/// Reduce `source` over every dimension in `dims` with `kernel`.
///
/// Returns a coordinate-only grid over the remaining dimensions, carrying a
/// scalar coordinate for each collapsed one, and one value column per
/// kernel output.
pub(crate) fn collapse(
    source: &GriddedData,
    dims: &[usize],
    kernel: &dyn PointKernel,
) -> Result<(GriddedData, Vec<Vec<Option<f64>>>)> {
    let kept: Vec<usize> = (0..source.ndim()).filter(|d| !dims.contains(d)).collect();
    let out_shape: Vec<usize> = kept.iter().map(|&d| source.shape()[d]).collect();
    let fill = source.metadata.fill_value();

    let kept_coords: Vec<Coord> = kept.iter().map(|&d| source.dim_coords()[d].clone()).collect();
    let mut target = GriddedData::new(
        MaskedArray::fully_masked(&out_shape, fill),
        Metadata::new(source.name()),
        kept_coords,
    )?;
    for aux in source.aux_coords() {
        if aux.dims.iter().all(|d| kept.contains(d)) {
            let remapped = aux
                .dims
                .iter()
                .filter_map(|d| kept.iter().position(|k| k == d))
                .collect();
            target.add_aux_coord(aux.coord.clone(), remapped)?;
        } else {
            tracing::debug!(coord = aux.coord.name(), "dropping auxiliary coordinate spanning a collapsed dimension");
        }
    }
    for &d in dims {
        if let Some(scalar) = collapsed_coord(&source.dim_coords()[d])? {
            target.add_aux_coord(scalar, Vec::new())?;
        }
    }

    let points = source.hyper_points();
    let out_len: usize = out_shape.iter().product();
    let mut groups: Vec<Vec<usize>> = vec![Vec::new(); out_len];
    for flat in 0..points.len() {
        let index = unravel_index(flat, source.shape());
        let out_index: Vec<usize> = kept.iter().map(|&d| index[d]).collect();
        groups[ravel_index(&out_index, &out_shape)].push(flat);
    }

    let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(out_len); kernel.output_suffixes().len()];
    for (flat, group) in groups.iter().enumerate() {
        let centre: HyperPoint = target.point_at(&unravel_index(flat, &out_shape));
        let values = kernel.compute(&centre, Candidates::subset(&points, group));
        for (column, value) in columns.iter_mut().zip(values) {
            column.push(value);
        }
    }
    Ok((target, columns))
}
