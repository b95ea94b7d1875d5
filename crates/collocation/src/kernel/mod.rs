//! Kernels: reductions from eligible source points to output values.
//!
//! Point kernels work on candidate HyperPoints chosen by a constraint.
//! Gridded kernels interpolate a gridded source directly and take no
//! constraint.

pub mod gridded;
pub mod point;

use cis_common::{CisError, Result};

pub use gridded::{GriddedInterpolator, GriddedKernel, GriddedMethod};
pub use point::{
    Candidates, CountKernel, MaxKernel, MeanKernel, MinKernel, MomentsKernel, NearestKernel,
    NearestMetric, PointKernel, StdDevKernel, SumKernel,
};

use crate::params::PluginSpec;

/// A kernel resolved from the registry.
#[derive(Debug)]
pub enum Kernel {
    Point(Box<dyn PointKernel>),
    Gridded(GriddedKernel),
}

impl Kernel {
    pub fn name(&self) -> &str {
        match self {
            Kernel::Point(k) => k.name(),
            Kernel::Gridded(k) => k.name(),
        }
    }

    pub fn spec(&self) -> &PluginSpec {
        match self {
            Kernel::Point(k) => k.spec(),
            Kernel::Gridded(k) => k.spec(),
        }
    }

    /// Name suffixes of the output variables, one per output.
    pub fn output_suffixes(&self) -> &'static [&'static str] {
        match self {
            Kernel::Point(k) => k.output_suffixes(),
            Kernel::Gridded(_) => &[""],
        }
    }

    /// Kernel usable against a gridded source. `nearest` maps onto
    /// nearest-cell lookup.
    pub fn into_gridded(self) -> Result<GriddedKernel> {
        match self {
            Kernel::Gridded(k) => Ok(k),
            Kernel::Point(k) => match k.gridded_equivalent() {
                Some(method) => GriddedKernel::from_spec(method, k.spec()),
                None => Err(CisError::invalid_options(format!(
                    "kernel '{}' cannot be used with a gridded source; use 'linear' or 'nearest'",
                    k.name()
                ))),
            },
        }
    }

    /// Kernel usable against an ungridded source.
    pub fn into_point(self) -> Result<Box<dyn PointKernel>> {
        match self {
            Kernel::Point(k) => Ok(k),
            Kernel::Gridded(k) => Err(CisError::invalid_options(format!(
                "kernel '{}' requires a gridded source",
                k.name()
            ))),
        }
    }
}
