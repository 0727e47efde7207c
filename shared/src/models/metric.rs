//! Metric data model.
//!
//! Defines the canonical `Metric` published on the bus by handlers and sink
//! housekeeping tasks.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Type of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// A counter that only increases (e.g., messages received).
    Counter,
    /// A gauge that can go up or down (e.g., queue depth).
    Gauge,
    /// A sample with no declared semantics.
    Untyped,
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Gauge => write!(f, "gauge"),
            Self::Untyped => write!(f, "untyped"),
        }
    }
}

impl Default for MetricType {
    fn default() -> Self {
        Self::Untyped
    }
}

/// A metric sample.
///
/// Labels are kept as two parallel sequences so that the key order chosen by
/// the producer is preserved. Keys are unique and both sequences always have
/// the same length.
///
/// # Example
///
/// ```
/// use shared::models::{Metric, MetricType};
///
/// let metric = Metric::counter("sg_total_events_received", 42.0)
///     .with_label("source", "SG");
///
/// assert_eq!(metric.metric_type, MetricType::Counter);
/// assert_eq!(metric.label("source"), Some("SG"));
/// assert!(metric.validate_metric().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMetric")]
pub struct Metric {
    /// The name of the metric (e.g., "`sg_collectd_events_received`").
    pub name: String,

    /// Label keys, parallel to `label_values`.
    label_keys: Vec<String>,

    /// Label values, parallel to `label_keys`.
    label_values: Vec<String>,

    /// Seconds since the epoch; `0.0` means "now".
    pub timestamp: f64,

    /// The type of metric.
    pub metric_type: MetricType,

    /// Collection interval; zero for push-style samples.
    pub interval: Duration,

    /// The sample value.
    pub value: f64,
}

/// Unchecked wire form of a [`Metric`].
#[derive(Deserialize)]
struct RawMetric {
    name: String,
    #[serde(default)]
    label_keys: Vec<String>,
    #[serde(default)]
    label_values: Vec<String>,
    #[serde(default)]
    timestamp: f64,
    #[serde(default)]
    metric_type: MetricType,
    #[serde(default)]
    interval: Duration,
    value: f64,
}

impl TryFrom<RawMetric> for Metric {
    type Error = MetricValidationError;

    fn try_from(raw: RawMetric) -> Result<Self, Self::Error> {
        let metric = Self {
            name: raw.name,
            label_keys: raw.label_keys,
            label_values: raw.label_values,
            timestamp: raw.timestamp,
            metric_type: raw.metric_type,
            interval: raw.interval,
            value: raw.value,
        };
        metric.validate_metric()?;
        Ok(metric)
    }
}

/// Errors that can occur during metric validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricValidationError {
    /// The metric name is empty.
    #[error("Metric name cannot be empty")]
    EmptyName,

    /// Label keys and values have different lengths.
    #[error("Label keys ({keys}) and values ({values}) differ in length")]
    LabelLengthMismatch {
        /// Number of keys.
        keys: usize,
        /// Number of values.
        values: usize,
    },

    /// A label key occurs more than once.
    #[error("Duplicate label key: '{0}'")]
    DuplicateLabel(String),
}

impl Metric {
    /// Creates a new unlabelled metric stamped "now" with no interval.
    #[must_use]
    pub fn new(name: impl Into<String>, metric_type: MetricType, value: f64) -> Self {
        Self {
            name: name.into(),
            label_keys: Vec::new(),
            label_values: Vec::new(),
            timestamp: 0.0,
            metric_type,
            interval: Duration::ZERO,
            value,
        }
    }

    /// Creates a new counter metric.
    #[must_use]
    pub fn counter(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricType::Counter, value)
    }

    /// Creates a new gauge metric.
    #[must_use]
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricType::Gauge, value)
    }

    /// Builds a metric from parallel label sequences.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequences differ in length or a key repeats.
    pub fn with_labels(
        name: impl Into<String>,
        metric_type: MetricType,
        value: f64,
        label_keys: Vec<String>,
        label_values: Vec<String>,
    ) -> Result<Self, MetricValidationError> {
        let metric = Self {
            label_keys,
            label_values,
            ..Self::new(name, metric_type, value)
        };
        metric.validate_metric()?;
        Ok(metric)
    }

    /// Adds a label, replacing the value when the key already exists.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        let slot = self
            .label_keys
            .iter()
            .position(|k| *k == key)
            .and_then(|index| self.label_values.get_mut(index));
        match slot {
            Some(slot) => *slot = value,
            None => {
                self.label_keys.push(key);
                self.label_values.push(value);
            }
        }
        self
    }

    /// Sets the collection interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns the label keys in producer order.
    #[must_use]
    pub fn label_keys(&self) -> &[String] {
        &self.label_keys
    }

    /// Returns the label values, parallel to [`Metric::label_keys`].
    #[must_use]
    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Iterates over `(key, value)` label pairs.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.label_keys
            .iter()
            .zip(&self.label_values)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Looks up a label value by key.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Validates the metric.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is empty
    /// - Label keys and values differ in length
    /// - A label key is duplicated
    pub fn validate_metric(&self) -> Result<(), MetricValidationError> {
        if self.name.is_empty() {
            return Err(MetricValidationError::EmptyName);
        }

        if self.label_keys.len() != self.label_values.len() {
            return Err(MetricValidationError::LabelLengthMismatch {
                keys: self.label_keys.len(),
                values: self.label_values.len(),
            });
        }

        for (i, key) in self.label_keys.iter().enumerate() {
            if self.label_keys[..i].contains(key) {
                return Err(MetricValidationError::DuplicateLabel(key.clone()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_counter() {
        let metric = Metric::counter("sg_total_events_received", 100.0)
            .with_label("source", "SG")
            .with_label("plugin", "events");

        assert_eq!(metric.name, "sg_total_events_received");
        assert_eq!(metric.metric_type, MetricType::Counter);
        assert_eq!(metric.value, 100.0);
        assert_eq!(metric.label("source"), Some("SG"));
        assert_eq!(metric.label_keys(), ["source", "plugin"]);
        assert_eq!(metric.timestamp, 0.0);
        assert_eq!(metric.interval, Duration::ZERO);
    }

    #[test]
    fn test_with_label_replaces_existing_key() {
        let metric = Metric::gauge("queue_depth", 3.0)
            .with_label("sink", "a")
            .with_label("sink", "b");

        assert_eq!(metric.label_keys().len(), 1);
        assert_eq!(metric.label_values().len(), 1);
        assert_eq!(metric.label("sink"), Some("b"));
        assert!(metric.validate_metric().is_ok());
    }

    #[test]
    fn test_with_labels_rejects_length_mismatch() {
        let result = Metric::with_labels(
            "m",
            MetricType::Gauge,
            1.0,
            vec!["a".into(), "b".into()],
            vec!["1".into()],
        );
        assert_eq!(
            result,
            Err(MetricValidationError::LabelLengthMismatch { keys: 2, values: 1 })
        );
    }

    #[test]
    fn test_with_labels_rejects_duplicate_keys() {
        let result = Metric::with_labels(
            "m",
            MetricType::Gauge,
            1.0,
            vec!["a".into(), "a".into()],
            vec!["1".into(), "2".into()],
        );
        assert_eq!(result, Err(MetricValidationError::DuplicateLabel("a".into())));
    }

    #[test]
    fn test_metric_validation_empty_name() {
        let metric = Metric::counter("", 1.0);
        let result = metric.validate_metric();
        assert!(matches!(result, Err(MetricValidationError::EmptyName)));
    }

    #[test]
    fn test_metric_serialization() {
        let metric = Metric::counter("test_counter", 42.0).with_label("env", "production");

        let json = serde_json::to_string(&metric).unwrap();

        assert!(json.contains("\"name\":\"test_counter\""));
        assert!(json.contains("\"metric_type\":\"counter\""));
        assert!(json.contains("\"value\":42.0"));
        assert!(json.contains("\"label_keys\":[\"env\"]"));
    }

    #[test]
    fn test_metric_deserialization_is_validated() {
        let json = r#"{"name":"m","label_keys":["a","a","b"],"label_values":["1"],"value":1.0}"#;
        let err = serde_json::from_str::<Metric>(json).unwrap_err();
        assert!(err.to_string().contains("differ in length"));

        let json = r#"{"name":"m","label_keys":["a","a"],"label_values":["1","2"],"value":1.0}"#;
        let err = serde_json::from_str::<Metric>(json).unwrap_err();
        assert!(err.to_string().contains("Duplicate label key"));
    }

    #[test]
    fn test_metric_deserialization_defaults() {
        let metric: Metric =
            serde_json::from_str(r#"{"name":"m","label_keys":["a"],"label_values":["1"],"value":2.0}"#)
                .unwrap();

        assert_eq!(metric.metric_type, MetricType::Untyped);
        assert_eq!(metric.interval, Duration::ZERO);
        assert_eq!(metric.with_label("b", "x").label("b"), Some("x"));
    }

    #[test]
    fn test_metric_serialization_round_trips_labels() {
        let metric = Metric::gauge("queue_depth", 7.0)
            .with_label("sink", "alertmanager")
            .with_interval(Duration::from_secs(1));

        let json = serde_json::to_string(&metric).unwrap();
        let back: Metric = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metric);
    }

    #[test]
    fn test_metric_type_display() {
        assert_eq!(MetricType::Counter.to_string(), "counter");
        assert_eq!(MetricType::Gauge.to_string(), "gauge");
        assert_eq!(MetricType::Untyped.to_string(), "untyped");
    }
}
