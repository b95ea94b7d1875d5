//! Runtime configuration for the collocation engine.

use cis_common::{CisError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for collocation and aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollocationConfig {
    /// Whether masked sample points produce masked output unless overridden.
    pub default_missing_data_for_missing_sample: bool,

    /// Kernel used for ungridded sources when none is named.
    pub default_point_kernel: String,

    /// Kernel used for gridded sources when none is named.
    pub default_gridded_kernel: String,
}

impl Default for CollocationConfig {
    fn default() -> Self {
        Self {
            default_missing_data_for_missing_sample: false,
            default_point_kernel: "moments".to_string(),
            default_gridded_kernel: "linear".to_string(),
        }
    }
}

impl CollocationConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CIS_MISSING_DATA_FOR_MISSING_SAMPLE") {
            config.default_missing_data_for_missing_sample = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("CIS_DEFAULT_KERNEL") {
            config.default_point_kernel = val.trim().to_lowercase();
        }

        if let Ok(val) = std::env::var("CIS_DEFAULT_GRIDDED_KERNEL") {
            config.default_gridded_kernel = val.trim().to_lowercase();
        }

        config
    }

    /// Apply overrides from a YAML document. Keys absent from the document
    /// keep their current value.
    pub fn merge_yaml(mut self, yaml: &str) -> Result<Self> {
        let overrides: ConfigOverrides = serde_yaml::from_str(yaml)
            .map_err(|e| CisError::InvalidInput(format!("invalid configuration file: {e}")))?;

        if let Some(flag) = overrides.default_missing_data_for_missing_sample {
            self.default_missing_data_for_missing_sample = flag;
        }
        if let Some(kernel) = overrides.default_point_kernel {
            self.default_point_kernel = kernel;
        }
        if let Some(kernel) = overrides.default_gridded_kernel {
            self.default_gridded_kernel = kernel;
        }
        Ok(self)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.default_point_kernel.is_empty() {
            return Err("default_point_kernel must not be empty".to_string());
        }

        if self.default_gridded_kernel.is_empty() {
            return Err("default_gridded_kernel must not be empty".to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigOverrides {
    default_missing_data_for_missing_sample: Option<bool>,
    default_point_kernel: Option<String>,
    default_gridded_kernel: Option<String>,
}

/// Interpret a boolean-ish flag: `true`, `1`, `yes` (any case).
pub fn parse_flag(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CollocationConfig::default();
        assert_eq!(config.default_point_kernel, "moments");
        assert_eq!(config.default_gridded_kernel, "linear");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_kernel() {
        let config = CollocationConfig {
            default_point_kernel: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_yaml_overrides_only_given_keys() {
        let config = CollocationConfig::default()
            .merge_yaml("default_missing_data_for_missing_sample: true\ndefault_point_kernel: mean\n")
            .unwrap();
        assert!(config.default_missing_data_for_missing_sample);
        assert_eq!(config.default_point_kernel, "mean");
        assert_eq!(config.default_gridded_kernel, "linear");
    }

    #[test]
    fn test_merge_yaml_rejects_unknown_keys() {
        let err = CollocationConfig::default()
            .merge_yaml("leaf: 3\n")
            .unwrap_err();
        assert_eq!(err.kind(), cis_common::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" 1 "));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
