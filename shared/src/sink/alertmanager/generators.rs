//! Per-source conversion of decoded messages into alerts.

use super::alert::{assimilate, stringify, PrometheusAlert};
use crate::models::{DataSource, EventSeverity};
use crate::pipeline::{ceilometer, collectd};
use chrono::{DateTime, NaiveDateTime, SecondsFormat};
use serde_json::Value;

/// Value of the `alertsource` label on every generated alert.
pub const ALERT_SOURCE: &str = "SmartGateway";

const NAIVE_LAYOUTS: [&str; 2] = ["%a %b %e %H:%M:%S %Y", "%Y-%m-%d %H:%M:%S%.f"];

/// Builds an alert from a decoded message.
pub type AlertGenerator = fn(generator_url: &str, message: &Value) -> PrometheusAlert;

/// Returns the generator for `source`, if alerts can be built from it.
#[must_use]
pub fn generator_for(source: DataSource) -> Option<AlertGenerator> {
    match source {
        DataSource::Collectd => Some(collectd_alert),
        DataSource::Ceilometer => Some(ceilometer_alert),
        DataSource::Generic => None,
    }
}

/// Normalizes a timestamp to RFC 3339. Returns an empty string when the
/// layout is not recognized.
#[must_use]
pub fn format_timestamp(ts: &str) -> String {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(ts) {
        return stamp.to_rfc3339_opts(SecondsFormat::Secs, true);
    }
    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(ts, layout).ok())
        .map(|stamp| stamp.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Maps a ceilometer notification priority to the canonical severity.
#[must_use]
pub fn ceilometer_severity(priority: &str) -> EventSeverity {
    match priority {
        "audit" | "info" | "sample" | "AUDIT" | "INFO" | "SAMPLE" => EventSeverity::Info,
        "warn" | "warning" | "WARN" | "WARNING" => EventSeverity::Warning,
        "critical" | "error" | "CRITICAL" | "ERROR" => EventSeverity::Critical,
        _ => EventSeverity::Unknown,
    }
}

fn finish(mut alert: PrometheusAlert) -> PrometheusAlert {
    alert.set_name();
    alert.set_summary();
    alert
        .labels
        .insert("alertsource".into(), ALERT_SOURCE.into());
    alert
}

fn text<'a>(message: &'a Value, key: &str) -> Option<&'a str> {
    message.get(key).and_then(Value::as_str)
}

/// Builds an alert from a decoded collectd message.
#[must_use]
pub fn collectd_alert(generator_url: &str, message: &Value) -> PrometheusAlert {
    let mut alert = PrometheusAlert::new(generator_url);
    assimilate(&mut alert.labels, message.get("labels"));
    assimilate(&mut alert.annotations, message.get("annotations"));

    if let Some(starts_at) = text(message, "startsAt") {
        alert.starts_at = format_timestamp(starts_at);
    }

    let severity = alert
        .labels
        .get("severity")
        .map_or(EventSeverity::Unknown, |value| collectd::severity(value));
    alert
        .labels
        .insert("severity".into(), severity.as_str().into());

    finish(alert)
}

/// Builds an alert from a decoded ceilometer message.
#[must_use]
pub fn ceilometer_alert(generator_url: &str, message: &Value) -> PrometheusAlert {
    let mut alert = PrometheusAlert::new(generator_url);

    let alertname = text(message, "event_type")
        .filter(|event_type| !event_type.is_empty())
        .map_or_else(
            || format!("{}generic", ceilometer::NAME_PREFIX),
            ceilometer::index_name,
        );
    alert.labels.insert("alertname".into(), alertname);

    for (field, label) in [
        ("message_id", "messageId"),
        ("publisher_id", "instance"),
        ("event_type", "type"),
    ] {
        if let Some(value) = message.get(field) {
            alert.labels.insert(label.into(), stringify(value));
        }
    }

    let severity = text(message, "priority").map_or(EventSeverity::Unknown, ceilometer_severity);
    alert
        .labels
        .insert("severity".into(), severity.as_str().into());

    if let Some(publisher) = text(message, "publisher_id") {
        alert
            .labels
            .insert("sourceName".into(), format!("ceilometer@{publisher}"));
    }

    assimilate(&mut alert.annotations, message.get("traits"));

    if let Some(timestamp) = text(message, "timestamp") {
        alert.starts_at = format_timestamp(timestamp);
    }

    finish(alert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_timestamp_layouts() {
        assert_eq!(format_timestamp("2021-01-01T00:00:00Z"), "2021-01-01T00:00:00Z");
        assert_eq!(
            format_timestamp("2021-01-01T00:00:00.123456789Z"),
            "2021-01-01T00:00:00Z"
        );
        assert_eq!(format_timestamp("Fri Jan  1 00:00:00 2021"), "2021-01-01T00:00:00Z");
        assert_eq!(
            format_timestamp("2020-09-14 16:12:58.000000"),
            "2020-09-14T16:12:58Z"
        );
        assert_eq!(format_timestamp("soon"), "");
    }

    #[test]
    fn test_ceilometer_severity_table() {
        assert_eq!(ceilometer_severity("SAMPLE"), EventSeverity::Info);
        assert_eq!(ceilometer_severity("warn"), EventSeverity::Warning);
        assert_eq!(ceilometer_severity("ERROR"), EventSeverity::Critical);
        assert_eq!(ceilometer_severity("Error"), EventSeverity::Unknown);
    }

    #[test]
    fn test_collectd_alert() {
        let message = json!({
            "index": "collectd_cpu",
            "labels": {"alertname": "collectd_cpu_value", "severity": "FAILURE", "instance": "node-1"},
            "annotations": {"summary": "cpu busy"},
            "startsAt": "2021-01-01 00:00:00.000000",
        });
        let alert = collectd_alert("http://gen", &message);

        assert_eq!(alert.labels["severity"], "critical");
        assert_eq!(alert.labels["alertsource"], "SmartGateway");
        assert_eq!(alert.labels["name"], "collectd_cpu_value_node-1");
        assert_eq!(alert.annotations["summary"], "cpu busy");
        assert_eq!(alert.starts_at, "2021-01-01T00:00:00Z");
        assert_eq!(alert.generator_url, "http://gen");
    }

    #[test]
    fn test_collectd_alert_without_severity() {
        let alert = collectd_alert("http://gen", &json!({"labels": {"alertname": "x"}}));
        assert_eq!(alert.labels["severity"], "unknown");
    }

    #[test]
    fn test_ceilometer_alert() {
        let message = json!({
            "event_type": "compute.instance-create.end",
            "message_id": "m-1",
            "publisher_id": "telemetry.publisher.controller-0",
            "priority": "SAMPLE",
            "timestamp": "2020-09-14T16:12:57.000000Z",
            "traits": {"size": 1.5, "host": "node-1"},
        });
        let alert = ceilometer_alert("http://gen", &message);

        assert_eq!(alert.labels["alertname"], "ceilometer_compute_instance_create");
        assert_eq!(alert.labels["messageId"], "m-1");
        assert_eq!(alert.labels["instance"], "telemetry.publisher.controller-0");
        assert_eq!(alert.labels["type"], "compute.instance-create.end");
        assert_eq!(alert.labels["severity"], "info");
        assert_eq!(
            alert.labels["sourceName"],
            "ceilometer@telemetry.publisher.controller-0"
        );
        assert_eq!(alert.annotations["size"], "1.5");
        assert_eq!(alert.annotations["host"], "node-1");
        assert_eq!(
            alert.annotations["summary"],
            "ceilometer@telemetry.publisher.controller-0 compute.instance-create.end"
        );
        assert_eq!(alert.starts_at, "2020-09-14T16:12:57Z");
    }

    #[test]
    fn test_ceilometer_alert_without_event_type() {
        let alert = ceilometer_alert("http://gen", &json!({}));
        assert_eq!(alert.labels["alertname"], "ceilometer_generic");
        assert_eq!(alert.labels["severity"], "unknown");
    }

    #[test]
    fn test_generator_lookup() {
        assert!(generator_for(DataSource::Collectd).is_some());
        assert!(generator_for(DataSource::Ceilometer).is_some());
        assert!(generator_for(DataSource::Generic).is_none());
    }
}
