//! Sub-command execution.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use cis_common::{CisError, CommonData, DataList, Dataset};
use collocation::{Aggregator, CollocationConfig, Collocator, GridSpec, PluginSpec, Registry, SubsetLimits};

use crate::cli::Command;
use crate::dataset_io::{read_document, read_variables, write_datalist};
use crate::groups::{DataGroup, SampleGroup};
use crate::overwrite::OverwritePolicy;

/// Build the configuration: environment first, then the YAML file if any.
pub fn load_config(path: Option<&Path>) -> Result<CollocationConfig> {
    let mut config = CollocationConfig::from_env();
    if let Some(path) = path {
        let yaml = std::fs::read_to_string(path)
            .map_err(CisError::from)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        config = config
            .merge_yaml(&yaml)
            .with_context(|| format!("parsing configuration {}", path.display()))?;
    }
    config.validate().map_err(CisError::invalid_options)?;
    Ok(config)
}

/// Everything a command needs besides its arguments.
pub struct Session {
    config: CollocationConfig,
    registry: Registry,
    overwrite: OverwritePolicy,
}

impl Session {
    pub fn new(config: CollocationConfig) -> Self {
        Self {
            config,
            registry: Registry::default(),
            overwrite: OverwritePolicy::from_env(),
        }
    }

    pub fn with_overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Run `command`, writing results to `output`.
    pub fn run(&self, command: &Command, output: &Path) -> Result<()> {
        if command.writes_output() {
            self.overwrite
                .check(output, &mut std::io::stdin().lock(), &mut std::io::stderr())?;
        }

        let result = match command {
            Command::Col { datagroup, samplegroup } => {
                self.collocate(&DataGroup::parse(datagroup)?, &SampleGroup::parse(samplegroup)?)?
            }
            Command::Aggregate { datagroup, grid, kernel } => {
                self.aggregate(&DataGroup::parse(datagroup)?, grid, kernel.as_deref(), false)?
            }
            Command::Collapse { datagroup, axes, kernel } => {
                self.aggregate(&DataGroup::parse(datagroup)?, axes, kernel.as_deref(), true)?
            }
            Command::Subset { datagroup, limits } => self.subset(&DataGroup::parse(datagroup)?, limits)?,
            Command::Info { file, variables } => {
                return self.info(file, variables, &mut std::io::stdout().lock());
            }
            Command::Version => {
                println!("cis {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
        };

        write_datalist(output, &result).with_context(|| format!("writing {}", output.display()))?;
        Ok(())
    }

    /// Collocate every variable of `data` onto the sample.
    pub fn collocate(&self, data: &DataGroup, sample: &SampleGroup) -> Result<DataList> {
        let sample_data = read_sample(sample)?;
        let sources = read_group(data)?;
        if data.name.is_some() && sources.len() > 1 {
            bail!(CisError::invalid_options("an output name can only be given for a single variable"));
        }

        let options = sample.options(data);
        let collocator = Collocator::new(&self.registry, &self.config);
        collocator
            .collocate_all(&sample_data, &sources, &options)
            .with_context(|| {
                format!(
                    "collocating {} onto {}",
                    data.variables.join(", "),
                    sample.filenames.join(", ")
                )
            })
    }

    /// Aggregate onto a grid specification, or collapse whole axes.
    pub fn aggregate(&self, data: &DataGroup, grid: &str, kernel: Option<&str>, collapse_only: bool) -> Result<DataList> {
        let grid = GridSpec::parse(grid)?;
        let kernel = kernel.map(PluginSpec::parse).transpose()?;
        let aggregator = Aggregator::new(&self.registry, &self.config);

        let mut out = DataList::new();
        for dataset in &read_group(data)? {
            let results = if collapse_only {
                aggregator.collapse(dataset, &grid, kernel.as_ref())
            } else {
                aggregator.aggregate(dataset, &grid, kernel.as_ref())
            };
            let results = results.with_context(|| format!("aggregating '{}' onto {}", dataset.name(), grid))?;
            for mut item in results {
                rename(&mut item, dataset.name(), data.name.as_deref());
                out.push(item)?;
            }
        }
        Ok(out)
    }

    pub fn subset(&self, data: &DataGroup, limits: &str) -> Result<DataList> {
        let limits = SubsetLimits::parse(limits)?;
        let mut out = DataList::new();
        for dataset in &read_group(data)? {
            let mut item = collocation::subset(dataset, &limits)
                .with_context(|| format!("subsetting '{}' to {}", dataset.name(), limits))?;
            rename(&mut item, dataset.name(), data.name.as_deref());
            out.push(item)?;
        }
        Ok(out)
    }

    /// Summarise the variables of `file` on `out`.
    pub fn info<W: Write>(&self, file: &str, variables: &[String], out: &mut W) -> Result<()> {
        let names: Vec<String> = if variables.is_empty() {
            read_document(Path::new(file))?
                .variables
                .iter()
                .map(|v| v.name().to_string())
                .collect()
        } else {
            variables.to_vec()
        };
        for dataset in &read_variables(&names, &[file.to_string()])? {
            describe(dataset, out)?;
        }
        Ok(())
    }
}

fn read_group(data: &DataGroup) -> Result<DataList> {
    if let Some(product) = &data.product {
        tracing::debug!(product = %product, "product recorded; JSON reader used");
    }
    read_variables(&data.variables, &data.filenames)
        .with_context(|| format!("reading {} from {}", data.variables.join(", "), data.filenames.join(", ")))
}

fn read_sample(sample: &SampleGroup) -> Result<Dataset> {
    let variable = match &sample.variable {
        Some(variable) => variable.clone(),
        None => {
            let Some(first) = sample.filenames.first() else {
                bail!(CisError::invalid_options("samplegroup names no files"));
            };
            let document = read_document(Path::new(first))?;
            match document.variables.first() {
                Some(v) => v.name().to_string(),
                None => bail!(CisError::InvalidInput(format!("{} holds no variables", first))),
            }
        }
    };
    let list = read_variables(&[variable.clone()], &sample.filenames)
        .with_context(|| format!("reading sample '{}' from {}", variable, sample.filenames.join(", ")))?;
    list.into_vec()
        .into_iter()
        .next()
        .ok_or_else(|| CisError::InvalidInput(format!("no sample variable '{}'", variable)).into())
}

/// Replace the source name prefix of an output name with `alias`.
fn rename(data: &mut Dataset, source: &str, alias: Option<&str>) {
    let Some(alias) = alias else { return };
    let metadata = data.metadata_mut();
    metadata.name = match metadata.name.strip_prefix(source) {
        Some(suffix) => format!("{}{}", alias, suffix),
        None => alias.to_string(),
    };
}

fn describe<W: Write>(data: &Dataset, out: &mut W) -> Result<()> {
    let metadata = data.metadata();
    writeln!(out, "{} ({})", metadata.display_name(), data.kind_label())?;
    writeln!(out, "  name:   {}", metadata.name)?;
    writeln!(out, "  units:  {}", metadata.units)?;
    writeln!(out, "  shape:  {:?}", data.shape())?;
    writeln!(out, "  valid:  {} of {}", data.count_valid(), data.len())?;
    writeln!(out, "  coordinates:")?;
    for coord in data.coords() {
        let axis = coord.axis.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string());
        match (coord.min(), coord.max()) {
            (Some(min), Some(max)) => {
                writeln!(out, "    {} [{}] {} .. {} {}", coord.name(), axis, min, max, coord.metadata.units)?
            }
            _ => writeln!(out, "    {} [{}] no valid values", coord.name(), axis)?,
        }
    }
    if !metadata.history.is_empty() {
        writeln!(out, "  history:")?;
        for line in metadata.history.lines() {
            writeln!(out, "    {}", line)?;
        }
    }
    Ok(())
}

/// Exit code for an error: that of the first [`CisError`] in its chain, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CisError>())
        .map(CisError::exit_code)
        .unwrap_or(1)
}
