//! Gridded source: interpolation onto sample points or a sample grid.

use cis_common::masked::unravel_index;
use cis_common::{CommonData, GriddedData, Result, UngriddedData};

use super::axes_of;
use crate::kernel::gridded::{Bracket, DimLookup};
use crate::kernel::{GriddedInterpolator, GriddedKernel};

pub(crate) fn onto_ungridded(
    source: &GriddedData,
    sample: &UngriddedData,
    kernel: &GriddedKernel,
    missing_data_for_missing_sample: bool,
) -> Result<Vec<Vec<Option<f64>>>> {
    let interpolator = GriddedInterpolator::new(source, kernel, &axes_of(sample.coords()))?;
    let values = (0..sample.len())
        .map(|i| {
            let point = sample.point_at(i);
            if missing_data_for_missing_sample && point.masked {
                None
            } else {
                interpolator.value_at(&point)
            }
        })
        .collect();
    Ok(vec![values])
}

pub(crate) fn onto_gridded(
    source: &GriddedData,
    sample: &GriddedData,
    kernel: &GriddedKernel,
    missing_data_for_missing_sample: bool,
) -> Result<Vec<Vec<Option<f64>>>> {
    let interpolator = GriddedInterpolator::new(source, kernel, &axes_of(sample.all_coords()))?;
    let masked = |index: &[usize]| missing_data_for_missing_sample && sample.data().is_masked(index);
    let shape = sample.shape().to_vec();

    let values = match BracketTables::build(&interpolator, sample) {
        Some(tables) => (0..sample.len())
            .map(|flat| {
                let index = unravel_index(flat, &shape);
                if masked(&index) {
                    return None;
                }
                interpolator.combine(&tables.brackets(&index)?)
            })
            .collect(),
        None => (0..sample.len())
            .map(|flat| {
                let index = unravel_index(flat, &shape);
                if masked(&index) {
                    return None;
                }
                interpolator.value_at(&sample.point_at(&index))
            })
            .collect(),
    };
    Ok(vec![values])
}

/// Where a source dimension's bracket comes from on a sample grid.
#[derive(Debug)]
enum DimSource {
    /// Same bracket everywhere, or none if out of range.
    Constant(Option<Bracket>),
    /// One bracket per position along a sample dimension.
    Table { sample_dim: usize, brackets: Vec<Option<Bracket>> },
}

/// Brackets precomputed per sample dimension, so each output cell only
/// combines lookups. Only valid when every source dimension maps onto a
/// sample dimension coordinate or a scalar coordinate.
#[derive(Debug)]
struct BracketTables {
    dims: Vec<DimSource>,
}

impl BracketTables {
    fn build(interpolator: &GriddedInterpolator<'_>, sample: &GriddedData) -> Option<Self> {
        if interpolator.has_hybrid_vertical() || sample.aux_coords().iter().any(|a| !a.dims.is_empty()) {
            return None;
        }
        let mut dims = Vec::with_capacity(interpolator.lookups().len());
        for (dim, lookup) in interpolator.lookups().iter().enumerate() {
            let source = match lookup {
                DimLookup::Fixed(_) => DimSource::Constant(interpolator.dim_bracket(dim, None)),
                DimLookup::Axis(axis, _) => {
                    if let Some(aux) = sample.aux_of_axis(*axis) {
                        DimSource::Constant(interpolator.dim_bracket(dim, aux.coord.values().first().copied()))
                    } else {
                        let sample_dim = sample.dim_of_axis(*axis)?;
                        let brackets = sample.dim_coords()[sample_dim]
                            .values()
                            .iter()
                            .map(|&v| interpolator.dim_bracket(dim, Some(v)))
                            .collect();
                        DimSource::Table { sample_dim, brackets }
                    }
                }
                DimLookup::Hybrid => return None,
            };
            dims.push(source);
        }
        Some(Self { dims })
    }

    fn brackets(&self, index: &[usize]) -> Option<Vec<Bracket>> {
        self.dims
            .iter()
            .map(|d| match d {
                DimSource::Constant(b) => b.clone(),
                DimSource::Table { sample_dim, brackets } => brackets[index[*sample_dim]].clone(),
            })
            .collect()
    }
}
