//! Explicit registry of kernels and constraints, keyed by name.

use std::collections::BTreeMap;

use cis_common::{Axis, CisError, Result};

use crate::constraint::Constraint;
use crate::kernel::{
    CountKernel, GriddedKernel, GriddedMethod, Kernel, MaxKernel, MeanKernel, MinKernel,
    MomentsKernel, NearestKernel, NearestMetric, StdDevKernel, SumKernel,
};
use crate::params::PluginSpec;

pub type KernelFactory = fn(&PluginSpec) -> Result<Kernel>;
pub type ConstraintFactory = fn(&PluginSpec) -> Result<Constraint>;

/// Name-to-factory tables for kernels and constraints.
#[derive(Debug, Clone)]
pub struct Registry {
    kernels: BTreeMap<String, KernelFactory>,
    constraints: BTreeMap<String, ConstraintFactory>,
}

impl Default for Registry {
    /// The built-in kernels and constraints.
    fn default() -> Self {
        let mut registry = Self::empty();

        registry.register_kernel("nearest", nearest);
        registry.register_kernel("nearest_horizontal", |spec| {
            point_nearest(spec, NearestMetric::Horizontal)
        });
        registry.register_kernel("nearest_altitude", |spec| {
            point_nearest(spec, NearestMetric::Along(Axis::Z))
        });
        registry.register_kernel("nearest_pressure", |spec| {
            point_nearest(spec, NearestMetric::Along(Axis::P))
        });
        registry.register_kernel("nearest_time", |spec| {
            point_nearest(spec, NearestMetric::Along(Axis::T))
        });
        registry.register_kernel("mean", |spec| Ok(Kernel::Point(Box::new(MeanKernel::new(spec)?))));
        registry.register_kernel("moments", |spec| Ok(Kernel::Point(Box::new(MomentsKernel::new(spec)?))));
        registry.register_kernel("max", |spec| Ok(Kernel::Point(Box::new(MaxKernel::new(spec)?))));
        registry.register_kernel("min", |spec| Ok(Kernel::Point(Box::new(MinKernel::new(spec)?))));
        registry.register_kernel("stddev", |spec| Ok(Kernel::Point(Box::new(StdDevKernel::new(spec)?))));
        registry.register_kernel("count", |spec| Ok(Kernel::Point(Box::new(CountKernel::new(spec)?))));
        registry.register_kernel("sum", |spec| Ok(Kernel::Point(Box::new(SumKernel::new(spec)?))));
        registry.register_kernel("linear", |spec| {
            Ok(Kernel::Gridded(GriddedKernel::from_spec(GriddedMethod::Linear, spec)?))
        });

        // Historical kernel names.
        registry.register_kernel("nn_horizontal", |spec| point_nearest(spec, NearestMetric::Horizontal));
        registry.register_kernel("nn_altitude", |spec| point_nearest(spec, NearestMetric::Along(Axis::Z)));
        registry.register_kernel("nn_pressure", |spec| point_nearest(spec, NearestMetric::Along(Axis::P)));
        registry.register_kernel("nn_time", |spec| point_nearest(spec, NearestMetric::Along(Axis::T)));
        registry.register_kernel("nn_gridded", |spec| {
            Ok(Kernel::Gridded(GriddedKernel::from_spec(GriddedMethod::Nearest, spec)?))
        });

        registry.register_constraint("separation", Constraint::separation);
        registry.register_constraint("sepconstraint", Constraint::separation);
        registry.register_constraint("bin", Constraint::bin);
        registry.register_constraint("dummy", Constraint::dummy);
        registry.register_constraint("none", Constraint::dummy);

        registry
    }
}

impl Registry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            kernels: BTreeMap::new(),
            constraints: BTreeMap::new(),
        }
    }

    /// Register (or replace) a kernel factory. Names are case-insensitive.
    pub fn register_kernel(&mut self, name: &str, factory: KernelFactory) {
        self.kernels.insert(name.to_lowercase(), factory);
    }

    /// Register (or replace) a constraint factory. Names are case-insensitive.
    pub fn register_constraint(&mut self, name: &str, factory: ConstraintFactory) {
        self.constraints.insert(name.to_lowercase(), factory);
    }

    pub fn kernel_names(&self) -> Vec<&str> {
        self.kernels.keys().map(String::as_str).collect()
    }

    pub fn constraint_names(&self) -> Vec<&str> {
        self.constraints.keys().map(String::as_str).collect()
    }

    /// Build the kernel named by `spec`.
    pub fn kernel(&self, spec: &PluginSpec) -> Result<Kernel> {
        let factory = self
            .kernels
            .get(&spec.name.to_lowercase())
            .ok_or_else(|| unknown("kernel", &spec.name, self.kernel_names()))?;
        factory(spec)
    }

    /// Build the constraint named by `spec`.
    pub fn constraint(&self, spec: &PluginSpec) -> Result<Constraint> {
        let factory = self
            .constraints
            .get(&spec.name.to_lowercase())
            .ok_or_else(|| unknown("constraint", &spec.name, self.constraint_names()))?;
        factory(spec)
    }
}

fn unknown(kind: &'static str, name: &str, available: Vec<&str>) -> CisError {
    CisError::UnknownPlugin {
        kind,
        name: name.to_string(),
        available: available.join(", "),
    }
}

/// `nearest` means nearest cell for a gridded source, which is the only
/// place interpolation flags make sense.
fn nearest(spec: &PluginSpec) -> Result<Kernel> {
    if spec.params.contains_key("extrapolate") || spec.params.contains_key("nn_vertical") {
        return Ok(Kernel::Gridded(GriddedKernel::from_spec(GriddedMethod::Nearest, spec)?));
    }
    point_nearest(spec, NearestMetric::Full)
}

fn point_nearest(spec: &PluginSpec, metric: NearestMetric) -> Result<Kernel> {
    Ok(Kernel::Point(Box::new(NearestKernel::new(spec, metric)?)))
}
