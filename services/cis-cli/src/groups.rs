//! Datagroup and samplegroup arguments.
//!
//! A datagroup is `variables:filenames[:key=value,...]`, a samplegroup is
//! `filenames[:key=value,...]`. Lists are comma-separated; commas inside
//! square brackets belong to a plugin's parameter list.

use cis_common::{CisError, Result};
use collocation::config::parse_flag;
use collocation::params::split_top_level;
use collocation::{CollocationOptions, PluginSpec};

/// Variables to read from a set of files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataGroup {
    pub variables: Vec<String>,
    pub filenames: Vec<String>,
    /// Reader product name; recorded, no reader selection happens here.
    pub product: Option<String>,
    /// Output alias for the variable.
    pub name: Option<String>,
}

impl DataGroup {
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let variables = list(parts.next().unwrap_or_default());
        let filenames = list(parts.next().unwrap_or_default());
        if variables.is_empty() || filenames.is_empty() {
            return Err(CisError::invalid_options(format!(
                "datagroup '{}' is not of the form variables:filenames[:options]",
                s
            )));
        }

        let mut group = Self {
            variables,
            filenames,
            product: None,
            name: None,
        };
        for (key, value) in key_values(parts.next().unwrap_or_default())? {
            match key.as_str() {
                "product" => group.product = Some(value),
                "name" => group.name = Some(value),
                _ => {
                    return Err(CisError::invalid_options(format!(
                        "unknown datagroup option '{}' (expected product or name)",
                        key
                    )))
                }
            }
        }
        Ok(group)
    }
}

/// Sample files plus the collocation choices made for them.
#[derive(Debug, Clone, Default)]
pub struct SampleGroup {
    pub filenames: Vec<String>,
    /// Sample variable; its coordinates are used. The first variable of the
    /// first file when absent.
    pub variable: Option<String>,
    pub collocator: Option<PluginSpec>,
    pub constraint: Option<PluginSpec>,
    pub kernel: Option<PluginSpec>,
    pub missing_data_for_missing_sample: Option<bool>,
}

impl SampleGroup {
    pub fn parse(s: &str) -> Result<Self> {
        let (files, options) = match s.split_once(':') {
            Some((files, options)) => (files, options),
            None => (s, ""),
        };
        let filenames = list(files);
        if filenames.is_empty() {
            return Err(CisError::invalid_options(format!("samplegroup '{}' names no files", s)));
        }

        let mut group = Self {
            filenames,
            ..Default::default()
        };
        for (key, value) in key_values(options)? {
            match key.as_str() {
                "variable" => group.variable = Some(value),
                "collocator" => group.collocator = Some(PluginSpec::parse(&value)?),
                "constraint" => group.constraint = Some(PluginSpec::parse(&value)?),
                "kernel" => group.kernel = Some(PluginSpec::parse(&value)?),
                "missing_data_for_missing_sample" => {
                    group.missing_data_for_missing_sample = Some(parse_flag(&value))
                }
                _ => {
                    return Err(CisError::invalid_options(format!(
                        "unknown samplegroup option '{}' (expected variable, collocator, constraint, kernel or missing_data_for_missing_sample)",
                        key
                    )))
                }
            }
        }
        Ok(group)
    }

    /// Options for collocating `data` with this sample.
    pub fn options(&self, data: &DataGroup) -> CollocationOptions {
        CollocationOptions {
            collocator: self.collocator.clone(),
            constraint: self.constraint.clone(),
            kernel: self.kernel.clone(),
            missing_data_for_missing_sample: self.missing_data_for_missing_sample,
            var_name: data.name.clone(),
        }
    }
}

fn list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn key_values(s: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for item in split_top_level(s)?.into_iter().map(str::trim).filter(|i| !i.is_empty()) {
        let (key, value) = item.split_once('=').ok_or_else(|| {
            CisError::invalid_options(format!("option '{}' is not of the form key=value", item))
        })?;
        pairs.push((key.trim().to_lowercase(), value.trim().to_string()));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datagroup() {
        let group = DataGroup::parse("AOD550,AOD870:a.json,b.json:product=Aeronet,name=aod").unwrap();
        assert_eq!(group.variables, vec!["AOD550", "AOD870"]);
        assert_eq!(group.filenames, vec!["a.json", "b.json"]);
        assert_eq!(group.product.as_deref(), Some("Aeronet"));
        assert_eq!(group.name.as_deref(), Some("aod"));
    }

    #[test]
    fn test_datagroup_requires_files() {
        let err = DataGroup::parse("AOD550").unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(DataGroup::parse("AOD550:a.json:colour=red").is_err());
    }

    #[test]
    fn test_samplegroup_with_bracketed_parameters() {
        let group = SampleGroup::parse(
            "track.json:variable=alt,constraint=separation[h_sep=10km,t_sep=PT1H],kernel=nn_time,missing_data_for_missing_sample=true",
        )
        .unwrap();
        assert_eq!(group.filenames, vec!["track.json"]);
        assert_eq!(group.variable.as_deref(), Some("alt"));
        let constraint = group.constraint.unwrap();
        assert_eq!(constraint.name, "separation");
        assert_eq!(constraint.params["h_sep"], "10km");
        assert_eq!(constraint.params["t_sep"], "PT1H");
        assert_eq!(group.kernel, Some(PluginSpec::new("nn_time")));
        assert_eq!(group.missing_data_for_missing_sample, Some(true));
    }

    #[test]
    fn test_samplegroup_options_carry_alias() {
        let sample = SampleGroup::parse("grid.json:collocator=box[h_sep=5]").unwrap();
        let data = DataGroup::parse("rh:model.json:name=rh_col").unwrap();
        let options = sample.options(&data);
        assert_eq!(options.collocator.unwrap().params["h_sep"], "5");
        assert_eq!(options.var_name.as_deref(), Some("rh_col"));
    }

    #[test]
    fn test_samplegroup_rejects_unknown_key() {
        let err = SampleGroup::parse("grid.json:colour=red").unwrap_err();
        assert!(err.to_string().contains("colour"));
    }
}
