//! History records appended to variables by every operation.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;

/// One history entry: a timestamped description of an operation.
///
/// Parameters are kept in a sorted map so that records are reproducible.
#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub fields: Vec<(String, String)>,
}

impl HistoryRecord {
    /// Start a record stamped with the current time.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.into(),
            fields: Vec::new(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Add a `key: value` line.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Add a plugin description such as `separation(h_sep=10, t_sep=1)`.
    pub fn plugin(self, key: &str, name: &str, params: &BTreeMap<String, String>) -> Self {
        self.field(key, describe_plugin(name, params))
    }

    /// Render as a single history string.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.operation
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("; {}: {}", key, value));
        }
        out
    }
}

/// `name(k1=v1, k2=v2)` with keys in sorted order, or just `name`.
pub fn describe_plugin(name: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return name.to_string();
    }
    let args: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}({})", name, args.join(", "))
}
