//! Alert structure understood by Prometheus Alertmanager.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// An alert as posted to Alertmanager's alerts endpoint.
///
/// # Example
///
/// ```
/// use shared::sink::PrometheusAlert;
///
/// let mut alert = PrometheusAlert::new("http://sg.localhost.localdomain");
/// alert.labels.insert("alertname".into(), "collectd_cpu".into());
/// alert.labels.insert("severity".into(), "critical".into());
/// alert.set_name();
///
/// assert_eq!(alert.labels["name"], "collectd_cpu");
/// assert_eq!(alert.annotations["description"], "collectd_cpu critical");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrometheusAlert {
    /// Identifying labels, kept sorted by key.
    pub labels: BTreeMap<String, String>,

    /// Informational annotations.
    pub annotations: BTreeMap<String, String>,

    /// Start of the alert, RFC 3339.
    #[serde(rename = "startsAt", default, skip_serializing_if = "String::is_empty")]
    pub starts_at: String,

    /// End of the alert, RFC 3339.
    #[serde(rename = "endsAt", default, skip_serializing_if = "String::is_empty")]
    pub ends_at: String,

    /// Link back to the entity that generated the alert.
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
}

impl PrometheusAlert {
    /// Creates an empty alert.
    #[must_use]
    pub fn new(generator_url: impl Into<String>) -> Self {
        Self {
            generator_url: generator_url.into(),
            ..Self::default()
        }
    }

    /// Generates the `name` label and the `description` annotation when the
    /// alert has no name yet.
    ///
    /// The name joins every label value except `severity` with `_`, the
    /// description joins every value with a space, both in key order.
    pub fn set_name(&mut self) {
        if self.labels.contains_key("name") {
            return;
        }

        let name = self
            .labels
            .iter()
            .filter(|(key, _)| key.as_str() != "severity")
            .map(|(_, value)| value.as_str())
            .collect::<Vec<_>>()
            .join("_");
        let description = self
            .labels
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");

        self.labels.insert("name".into(), name);
        self.annotations.insert("description".into(), description);
    }

    /// Fills an absent or empty `summary` annotation, from the `summary` label
    /// if present, otherwise from `sourceName`, `type` and `eventName`.
    pub fn set_summary(&mut self) {
        if self
            .annotations
            .get("summary")
            .is_some_and(|summary| !summary.is_empty())
        {
            return;
        }

        let summary = match self.labels.get("summary") {
            Some(label) if !label.is_empty() => label.clone(),
            _ => ["sourceName", "type", "eventName"]
                .iter()
                .filter_map(|key| self.labels.get(*key).map(String::as_str))
                .collect::<Vec<_>>()
                .join(" "),
        };
        self.annotations.insert("summary".into(), summary);
    }
}

/// Renders a JSON value as label or annotation text.
pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Copies a JSON object into a string map.
pub(crate) fn assimilate(target: &mut BTreeMap<String, String>, source: Option<&Value>) {
    if let Some(Value::Object(map)) = source {
        target.extend(map.iter().map(|(key, value)| (key.clone(), stringify(value))));
    }
}
