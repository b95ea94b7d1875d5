//! Plugin specifications (`name[key=value,...]`) and typed parameter access.

use std::collections::BTreeMap;
use std::fmt;

use cis_common::history::describe_plugin;
use cis_common::time::parse_time_delta;
use cis_common::{CisError, Result};

/// A plugin name with its string parameters, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginSpec {
    pub name: String,
    pub params: BTreeMap<String, String>,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Parse `name` or `name[key=value,key=value]`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (name, rest) = match s.find('[') {
            Some(open) => {
                let Some(body) = s[open + 1..].strip_suffix(']') else {
                    return Err(CisError::invalid_options(format!(
                        "unterminated parameter list in '{s}'"
                    )));
                };
                (&s[..open], Some(body))
            }
            None => (s, None),
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(CisError::invalid_options(format!("missing plugin name in '{s}'")));
        }

        let mut spec = Self::new(name.to_lowercase());
        for item in rest.into_iter().flat_map(|body| body.split(',')) {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let Some((key, value)) = item.split_once('=') else {
                return Err(CisError::invalid_options(format!(
                    "parameter '{item}' of '{name}' is not of the form key=value"
                )));
            };
            spec.params
                .insert(key.trim().to_lowercase(), value.trim().to_string());
        }
        Ok(spec)
    }
}

impl fmt::Display for PluginSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", describe_plugin(&self.name, &self.params))
    }
}

/// Consumes parameters by name; anything left over is rejected by
/// [`Params::finish`].
#[derive(Debug)]
pub struct Params {
    context: String,
    remaining: BTreeMap<String, String>,
}

impl Params {
    pub fn new(context: impl Into<String>, params: &BTreeMap<String, String>) -> Self {
        Self {
            context: context.into(),
            remaining: params.clone(),
        }
    }

    pub fn take_str(&mut self, key: &str) -> Option<String> {
        self.remaining.remove(key)
    }

    pub fn take_f64(&mut self, key: &str) -> Result<Option<f64>> {
        self.take_str(key)
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| CisError::invalid_parameter(key, format!("'{v}' is not a number")))
            })
            .transpose()
    }

    pub fn take_bool(&mut self, key: &str) -> Result<Option<bool>> {
        self.take_str(key)
            .map(|v| match v.to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(CisError::invalid_parameter(key, format!("'{v}' is not a boolean"))),
            })
            .transpose()
    }

    /// A horizontal distance in km; accepts a `km` or `m` suffix.
    pub fn take_km(&mut self, key: &str) -> Result<Option<f64>> {
        self.take_str(key)
            .map(|v| parse_length(key, &v, 1.0, 1.0e-3, 1.0).and_then(|d| non_negative(key, d)))
            .transpose()
    }

    /// A vertical distance in metres; accepts a `m` or `km` suffix.
    pub fn take_metres(&mut self, key: &str) -> Result<Option<f64>> {
        self.take_str(key)
            .map(|v| parse_length(key, &v, 1.0e3, 1.0, 1.0).and_then(|d| non_negative(key, d)))
            .transpose()
    }

    /// A non-negative plain number.
    pub fn take_separation(&mut self, key: &str) -> Result<Option<f64>> {
        self.take_f64(key)?
            .map(|d| non_negative(key, d))
            .transpose()
    }

    /// A time separation in days: a number of days or an ISO 8601 duration.
    pub fn take_days(&mut self, key: &str) -> Result<Option<f64>> {
        self.take_str(key)
            .map(|v| {
                parse_time_delta(&v)
                    .map_err(|e| CisError::invalid_parameter(key, e.to_string()))
                    .and_then(|d| non_negative(key, d))
            })
            .transpose()
    }

    /// Fail if any parameter was not consumed.
    pub fn finish(self) -> Result<()> {
        match self.remaining.keys().next() {
            None => Ok(()),
            Some(key) => Err(CisError::invalid_parameter(
                key.clone(),
                format!("not a parameter of {}", self.context),
            )),
        }
    }
}

/// Convert a length to the caller's unit given the factors for `km`, `m`
/// and unsuffixed values.
fn parse_length(key: &str, value: &str, km_factor: f64, m_factor: f64, bare_factor: f64) -> Result<f64> {
    let v = value.trim().to_lowercase();
    let (number, factor) = if let Some(n) = v.strip_suffix("km") {
        (n, km_factor)
    } else if let Some(n) = v.strip_suffix('m') {
        (n, m_factor)
    } else {
        (v.as_str(), bare_factor)
    };
    number
        .trim()
        .parse::<f64>()
        .map(|n| n * factor)
        .map_err(|_| CisError::invalid_parameter(key, format!("'{value}' is not a distance")))
}

fn non_negative(key: &str, value: f64) -> Result<f64> {
    if value.is_nan() || value < 0.0 {
        return Err(CisError::invalid_parameter(key, "separation must be non-negative"));
    }
    Ok(value)
}

/// Split on commas that are not inside square brackets.
pub fn split_top_level(s: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut begin = 0;
    for (i, ch) in s.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    CisError::invalid_options(format!("unbalanced ']' in '{}'", s))
                })?
            }
            ',' if depth == 0 => {
                parts.push(&s[begin..i]);
                begin = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(CisError::invalid_options(format!("unbalanced '[' in '{}'", s)));
    }
    parts.push(&s[begin..]);
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plugin_spec() {
        let spec = PluginSpec::parse("SepConstraint[h_sep=10km, t_sep=P1D]").unwrap();
        assert_eq!(spec.name, "sepconstraint");
        assert_eq!(spec.params["h_sep"], "10km");
        assert_eq!(spec.params["t_sep"], "P1D");
        assert_eq!(spec.to_string(), "sepconstraint(h_sep=10km, t_sep=P1D)");
    }

    #[test]
    fn test_parse_bare_name() {
        let spec = PluginSpec::parse(" mean ").unwrap();
        assert_eq!(spec, PluginSpec::new("mean"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PluginSpec::parse("mean[").is_err());
        assert!(PluginSpec::parse("[a=1]").is_err());
        assert!(PluginSpec::parse("mean[a]").is_err());
    }

    #[test]
    fn test_distance_units() {
        let spec = PluginSpec::parse("box[h_sep=500m,a_sep=1km,v_sep=20]").unwrap();
        let mut params = Params::new("box", &spec.params);
        assert_eq!(params.take_km("h_sep").unwrap(), Some(0.5));
        assert_eq!(params.take_metres("a_sep").unwrap(), Some(1000.0));
        assert_eq!(params.take_metres("v_sep").unwrap(), Some(20.0));
        assert!(params.finish().is_ok());
    }

    #[test]
    fn test_days_accepts_duration() {
        let spec = PluginSpec::new("box").with_param("t_sep", "PT12H");
        let mut params = Params::new("box", &spec.params);
        assert_eq!(params.take_days("t_sep").unwrap(), Some(0.5));
    }

    #[test]
    fn test_negative_separation_rejected() {
        let spec = PluginSpec::new("box").with_param("h_sep", "-1");
        let mut params = Params::new("box", &spec.params);
        assert!(matches!(
            params.take_km("h_sep"),
            Err(CisError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let spec = PluginSpec::new("mean").with_param("radius", "3");
        let params = Params::new("kernel 'mean'", &spec.params);
        let err = params.finish().unwrap_err();
        assert!(err.to_string().contains("radius"));
    }

    #[test]
    fn test_split_top_level_respects_brackets() {
        assert_eq!(
            split_top_level("x=[0,1,2],y").unwrap(),
            vec!["x=[0,1,2]", "y"]
        );
    }
}
