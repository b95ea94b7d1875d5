//! Collocation: resampling a source variable onto a sample's coordinates.
//!
//! The four shapes are dispatched on the (source, sample) variant pair.
//! Gridded sources are interpolated; ungridded sources go through a
//! constraint (separation, bin or none) and a point kernel.

mod gridded_source;
mod output;
mod ungridded_source;

use cis_common::{Axis, CisError, CommonData, Coord, DataList, Dataset, HistoryRecord, Result};

use crate::config::CollocationConfig;
use crate::constraint::Constraint;
use crate::kernel::Kernel;
use crate::params::PluginSpec;
use crate::registry::Registry;

pub(crate) use output::{build_outputs, OutputTemplate};
pub(crate) use ungridded_source::collocate_points;

/// Collocator names accepted in a samplegroup.
pub const COLLOCATOR_NAMES: [&str; 5] = ["bin", "box", "dummy", "lin", "nn"];

/// User choices for one collocation.
#[derive(Debug, Clone, Default)]
pub struct CollocationOptions {
    /// Named collocator (`box`, `bin`, `lin`, `nn`, `dummy`); its parameters
    /// go to the constraint or kernel it stands for.
    pub collocator: Option<PluginSpec>,
    /// Explicit constraint, overriding the collocator's.
    pub constraint: Option<PluginSpec>,
    /// Explicit kernel, overriding the collocator's.
    pub kernel: Option<PluginSpec>,
    /// Mask outputs at masked sample points. Defaults from configuration.
    pub missing_data_for_missing_sample: Option<bool>,
    /// Output variable name instead of the source name.
    pub var_name: Option<String>,
}

/// Resolved constraint and kernel for one (source, sample) shape.
#[derive(Debug)]
pub struct Plan {
    pub label: String,
    pub constraint: Constraint,
    pub kernel: Kernel,
    pub missing_data_for_missing_sample: bool,
}

/// Expand a collocator name into constraint and kernel specifications.
fn expand_collocator(spec: &PluginSpec) -> Result<(Option<PluginSpec>, Option<PluginSpec>)> {
    let with_params = |name: &str| PluginSpec {
        name: name.to_string(),
        params: spec.params.clone(),
    };
    match spec.name.as_str() {
        "box" => Ok((Some(with_params("separation")), None)),
        "bin" => Ok((Some(with_params("bin")), None)),
        "lin" => Ok((None, Some(with_params("linear")))),
        "nn" => Ok((None, Some(with_params("nearest")))),
        "dummy" => Ok((Some(with_params("dummy")), Some(PluginSpec::new("nearest")))),
        other => Err(CisError::UnknownPlugin {
            kind: "collocator",
            name: other.to_string(),
            available: COLLOCATOR_NAMES.join(", "),
        }),
    }
}

/// Runs collocations with a registry and configuration.
#[derive(Debug, Clone, Copy)]
pub struct Collocator<'a> {
    registry: &'a Registry,
    config: &'a CollocationConfig,
}

impl<'a> Collocator<'a> {
    pub fn new(registry: &'a Registry, config: &'a CollocationConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &CollocationConfig {
        self.config
    }

    /// Resolve the options for a source/sample shape pair, applying defaults
    /// and rejecting incompatible choices.
    pub fn plan(&self, source_gridded: bool, sample_gridded: bool, options: &CollocationOptions) -> Result<Plan> {
        let (mut constraint_spec, mut kernel_spec) = match &options.collocator {
            Some(spec) => expand_collocator(spec)?,
            None => (None, None),
        };
        if options.constraint.is_some() {
            constraint_spec = options.constraint.clone();
        }
        if options.kernel.is_some() {
            kernel_spec = options.kernel.clone();
        }

        let label = options
            .collocator
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| {
                format!(
                    "{}-{}",
                    if source_gridded { "gridded" } else { "ungridded" },
                    if sample_gridded { "gridded" } else { "ungridded" }
                )
            });

        let missing_data_for_missing_sample = options
            .missing_data_for_missing_sample
            .unwrap_or(self.config.default_missing_data_for_missing_sample);

        if source_gridded {
            let constraint = match &constraint_spec {
                Some(spec) => self.registry.constraint(spec)?,
                None => Constraint::dummy(&PluginSpec::new("none"))?,
            };
            if !constraint.is_dummy() {
                return Err(CisError::invalid_options(format!(
                    "constraint '{}' cannot be used with a gridded source",
                    constraint.name()
                )));
            }
            let kernel_spec =
                kernel_spec.unwrap_or_else(|| PluginSpec::new(self.config.default_gridded_kernel.clone()));
            let kernel = Kernel::Gridded(self.registry.kernel(&kernel_spec)?.into_gridded()?);
            return Ok(Plan {
                label,
                constraint,
                kernel,
                missing_data_for_missing_sample,
            });
        }

        let constraint_spec = constraint_spec.unwrap_or_else(|| {
            PluginSpec::new(if sample_gridded { "bin" } else { "separation" })
        });
        let constraint = self.registry.constraint(&constraint_spec)?;
        if !sample_gridded && matches!(constraint, Constraint::Bin { .. }) {
            return Err(CisError::invalid_options(
                "the bin constraint needs a gridded sample",
            ));
        }
        let kernel_spec =
            kernel_spec.unwrap_or_else(|| PluginSpec::new(self.config.default_point_kernel.clone()));
        let kernel = Kernel::Point(self.registry.kernel(&kernel_spec)?.into_point()?);
        Ok(Plan {
            label,
            constraint,
            kernel,
            missing_data_for_missing_sample,
        })
    }

    /// Collocate `source` onto the coordinates of `sample`.
    ///
    /// The result holds one variable per kernel output, on exactly the
    /// sample's coordinates. Fails with `EmptyResult` when no output point
    /// is valid.
    pub fn collocate(&self, sample: &Dataset, source: &Dataset, options: &CollocationOptions) -> Result<DataList> {
        let plan = self.plan(source.is_gridded(), sample.is_gridded(), options)?;
        tracing::debug!(
            source = source.name(),
            sample_kind = sample.kind_label(),
            source_kind = source.kind_label(),
            constraint = %plan.constraint.spec(),
            kernel = %plan.kernel.spec(),
            "dispatching collocation"
        );

        let values = self.values(sample, source, &plan)?;

        let record = HistoryRecord::new("Collocated onto sampling")
            .field("collocator", plan.label.clone())
            .field("constraint", plan.constraint.spec().to_string())
            .field("kernel", plan.kernel.spec().to_string())
            .field("source files", source.filenames().join(", "))
            .field("sample files", sample.filenames().join(", "))
            .render();
        let template = OutputTemplate::from_dataset(sample)?;
        let base_name = options.var_name.as_deref().unwrap_or(source.name());
        let outputs = build_outputs(&template, source, base_name, plan.kernel.output_suffixes(), values, &record)?;

        let total = sample.len();
        let masked = outputs.first().map(|d| total - d.count_valid()).unwrap_or(total);
        metrics::counter!("collocation_points_total").increment(total as u64);
        metrics::counter!("collocation_masked_points_total").increment(masked as u64);

        if outputs.iter().all(|d| d.count_valid() == 0) {
            return Err(CisError::EmptyResult(format!(
                "collocating '{}' from {} onto {} produced no valid points",
                source.name(),
                describe_files(source.filenames()),
                describe_files(sample.filenames())
            )));
        }

        tracing::info!(
            variable = source.name(),
            points = total,
            masked,
            outputs = outputs.len(),
            "collocation complete"
        );
        Ok(outputs)
    }

    /// Collocate every variable of `sources` onto `sample`.
    pub fn collocate_all(&self, sample: &Dataset, sources: &DataList, options: &CollocationOptions) -> Result<DataList> {
        let mut out = DataList::new();
        for source in sources {
            for item in self.collocate(sample, source, options)? {
                out.push(item)?;
            }
        }
        Ok(out)
    }

    /// Raw kernel outputs, one vector per output in sample order.
    fn values(&self, sample: &Dataset, source: &Dataset, plan: &Plan) -> Result<Vec<Vec<Option<f64>>>> {
        let missing = plan.missing_data_for_missing_sample;
        match (source, &plan.kernel) {
            (Dataset::Gridded(src), Kernel::Gridded(kernel)) => match sample {
                Dataset::Gridded(smp) => gridded_source::onto_gridded(src, smp, kernel, missing),
                Dataset::Ungridded(smp) => gridded_source::onto_ungridded(src, smp, kernel, missing),
            },
            (Dataset::Ungridded(src), Kernel::Point(kernel)) => match sample {
                Dataset::Gridded(smp) => {
                    ungridded_source::onto_gridded(src, smp, &plan.constraint, kernel.as_ref(), missing)
                }
                Dataset::Ungridded(smp) => {
                    ungridded_source::onto_ungridded(src, smp, &plan.constraint, kernel.as_ref(), missing)
                }
            },
            _ => Err(CisError::invalid_options(format!(
                "kernel '{}' cannot be used with a {} source",
                plan.kernel.name(),
                source.kind_label()
            ))),
        }
    }
}

/// Axis roles carried by a set of coordinates.
pub(crate) fn axes_of<'c>(coords: impl IntoIterator<Item = &'c Coord>) -> Vec<Axis> {
    let mut axes = Vec::new();
    for axis in coords.into_iter().filter_map(|c| c.axis) {
        if !axes.contains(&axis) {
            axes.push(axis);
        }
    }
    axes
}

fn describe_files(files: &[String]) -> String {
    if files.is_empty() {
        "<memory>".to_string()
    } else {
        files.join(", ")
    }
}
