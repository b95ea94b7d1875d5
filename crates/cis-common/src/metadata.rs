//! Variable and coordinate metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata carried by every coordinate and data variable.
///
/// Operations never drop metadata; they append to `history` instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Short (variable) name
    pub name: String,
    /// CF standard name, if known
    #[serde(default)]
    pub standard_name: Option<String>,
    /// Human readable name
    #[serde(default)]
    pub long_name: Option<String>,
    /// Units string; time uses the "<unit> since <date>" form
    #[serde(default)]
    pub units: String,
    /// Calendar for time units
    #[serde(default)]
    pub calendar: Option<String>,
    /// Fill/missing value written in place of masked points
    #[serde(default)]
    pub missing_value: Option<f64>,
    /// Newline-joined history records
    #[serde(default)]
    pub history: String,
    /// Free-form attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn with_standard_name(mut self, standard_name: impl Into<String>) -> Self {
        self.standard_name = Some(standard_name.into());
        self
    }

    pub fn with_long_name(mut self, long_name: impl Into<String>) -> Self {
        self.long_name = Some(long_name.into());
        self
    }

    pub fn with_missing_value(mut self, missing_value: f64) -> Self {
        self.missing_value = Some(missing_value);
        self
    }

    /// Append a record to the history. Existing history is kept as a prefix.
    pub fn append_history(&mut self, record: &str) {
        if self.history.is_empty() {
            self.history = record.to_string();
        } else {
            self.history.push('\n');
            self.history.push_str(record);
        }
    }

    /// Fill value used when writing masked points.
    pub fn fill_value(&self) -> f64 {
        self.missing_value.unwrap_or(crate::DEFAULT_FILL_VALUE)
    }

    /// Name used in user-facing messages: long name when present.
    pub fn display_name(&self) -> &str {
        self.long_name.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_is_append_only() {
        let mut md = Metadata::new("AOD550");
        md.append_history("first");
        md.append_history("second");
        assert_eq!(md.history, "first\nsecond");
        assert!(md.history.starts_with("first"));
    }

    #[test]
    fn test_fill_value_default() {
        let md = Metadata::new("x");
        assert_eq!(md.fill_value(), crate::DEFAULT_FILL_VALUE);
        let md = md.with_missing_value(-999.0);
        assert_eq!(md.fill_value(), -999.0);
    }
}
