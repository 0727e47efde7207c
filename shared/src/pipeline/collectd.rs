//! collectd alert notifications.
//!
//! A message is one object or an array of objects carrying `Labels`,
//! `Annotations` and `StartsAt`.

use super::sanitizer::sanitize_collectd;
use super::{Decoded, EntryError, PipelineError};
use crate::models::{Document, EventSeverity};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of every collectd index name.
pub const INDEX_PREFIX: &str = "collectd_";

/// Timestamp layouts accepted in `StartsAt`, tried in order after RFC 3339.
const NAIVE_LAYOUTS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%a %b %e %H:%M:%S %Y",
];

#[derive(Debug, Deserialize)]
struct AlertMessage {
    #[serde(default, alias = "Labels")]
    labels: Document,
    #[serde(default, alias = "Annotations")]
    annotations: Document,
    #[serde(default, rename = "startsAt", alias = "StartsAt")]
    starts_at: String,
}

/// A decoded collectd alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectdEvent {
    /// Canonical routing/index name, e.g. `collectd_cpu`.
    pub index: String,
    /// Severity derived from the `severity` label.
    pub severity: EventSeverity,
    /// `StartsAt` as seconds since the epoch, 0 when unparseable.
    pub time: i64,
    /// The original `StartsAt` text.
    #[serde(rename = "startsAt")]
    pub starts_at: String,
    /// Alert labels.
    pub labels: Document,
    /// Alert annotations.
    pub annotations: Document,
}

/// Maps a collectd notification severity to the canonical one.
#[must_use]
pub fn severity(value: &str) -> EventSeverity {
    match value {
        "OKAY" => EventSeverity::Info,
        "WARNING" => EventSeverity::Warning,
        "FAILURE" => EventSeverity::Critical,
        _ => EventSeverity::Unknown,
    }
}

/// Derives the index name from an `alertname` label.
///
/// The trailing `_<type>` segment is dropped when the last underscore sits past
/// the source prefix, and the result is prefixed with `collectd_` if needed.
#[must_use]
pub fn index_name(alertname: Option<&str>) -> String {
    let Some(value) = alertname else {
        return format!("{INDEX_PREFIX}generic");
    };

    let name = match value.rfind('_') {
        Some(index) if index > INDEX_PREFIX.len() => &value[..index],
        _ => value,
    };

    if name.starts_with(INDEX_PREFIX) {
        name.to_string()
    } else {
        format!("{INDEX_PREFIX}{name}")
    }
}

/// Converts a timestamp in any accepted layout to epoch seconds.
#[must_use]
pub fn epoch_from_format(ts: &str) -> i64 {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(ts) {
        return stamp.timestamp();
    }
    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(ts, layout).ok())
        .map_or(0, |stamp| stamp.and_utc().timestamp())
}

/// Builds the canonical event from one alert object.
///
/// # Errors
///
/// Returns [`PipelineError::Format`] if the object does not have the alert
/// shape.
pub fn parse_alert(value: Value) -> Result<CollectdEvent, PipelineError> {
    let message: AlertMessage = serde_json::from_value(value)
        .map_err(|e| PipelineError::Format(format!("invalid collectd alert: {e}")))?;

    let index = index_name(message.labels.get("alertname").and_then(Value::as_str));
    let severity = message
        .labels
        .get("severity")
        .and_then(Value::as_str)
        .map_or(EventSeverity::Unknown, severity);

    Ok(CollectdEvent {
        index,
        severity,
        time: epoch_from_format(&message.starts_at),
        starts_at: message.starts_at,
        labels: message.labels,
        annotations: message.annotations,
    })
}

/// Decodes a raw collectd message into one event document per alert.
///
/// # Errors
///
/// Returns an error if the message cannot be sanitized or is not JSON.
/// Individual malformed alerts are reported as entry errors instead.
pub fn decode(raw: &[u8]) -> Result<Decoded, PipelineError> {
    let sanitized = sanitize_collectd(raw)?;
    let alerts: Vec<Value> = serde_json::from_str(&sanitized)
        .map_err(|e| PipelineError::Decode(format!("invalid collectd message: {e}")))?;

    let mut decoded = Decoded::default();
    for alert in alerts {
        let context = alert.to_string();
        match parse_alert(alert).and_then(|event| {
            serde_json::to_value(event).map_err(|e| PipelineError::Format(e.to_string()))
        }) {
            Ok(message) => decoded.messages.push(message),
            Err(e) => decoded.entry_errors.push(EntryError::new(e.to_string(), context)),
        }
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scenario_failure_alert() {
        let raw = br#"{"Labels":{"severity":"FAILURE","alertname":"collectd_cpu_value"},"Annotations":{},"StartsAt":"2021-01-01T00:00:00Z"}"#;
        let decoded = decode(raw).unwrap();

        assert_eq!(decoded.messages.len(), 1);
        assert!(decoded.entry_errors.is_empty());

        let event: CollectdEvent = serde_json::from_value(decoded.messages[0].clone()).unwrap();
        assert_eq!(event.index, "collectd_cpu");
        assert_eq!(event.severity, EventSeverity::Critical);
        assert_eq!(event.time, 1_609_459_200);
    }

    #[test]
    fn test_array_of_alerts() {
        let raw = br#"[{"labels":{"alertname":"collectd_a_x"}},{"labels":{"alertname":"collectd_b_y"}}]"#;
        let decoded = decode(raw).unwrap();

        assert_eq!(decoded.messages.len(), 2);
        assert_eq!(decoded.messages[0]["index"], "collectd_a");
        assert_eq!(decoded.messages[1]["index"], "collectd_b");
    }

    #[test]
    fn test_malformed_alert_is_isolated() {
        let raw = br#"[{"labels":"oops"},{"labels":{"alertname":"collectd_ok_x"}}]"#;
        let decoded = decode(raw).unwrap();

        assert_eq!(decoded.messages.len(), 1);
        assert_eq!(decoded.entry_errors.len(), 1);
        assert!(decoded.entry_errors[0].context.contains("oops"));
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        let result = decode(b"{\"labels\":");
        assert!(matches!(result, Err(PipelineError::Decode(_))));
    }

    #[test]
    fn test_severity_table() {
        assert_eq!(severity("OKAY"), EventSeverity::Info);
        assert_eq!(severity("WARNING"), EventSeverity::Warning);
        assert_eq!(severity("FAILURE"), EventSeverity::Critical);
        assert_eq!(severity("okay"), EventSeverity::Unknown);
    }

    #[test]
    fn test_missing_or_non_string_severity_is_unknown() {
        let event = parse_alert(json!({"labels": {"alertname": "x"}})).unwrap();
        assert_eq!(event.severity, EventSeverity::Unknown);

        let event = parse_alert(json!({"labels": {"severity": 3}})).unwrap();
        assert_eq!(event.severity, EventSeverity::Unknown);
    }

    #[test]
    fn test_index_name_rules() {
        assert_eq!(index_name(Some("collectd_cpu_value")), "collectd_cpu");
        assert_eq!(index_name(Some("collectd_cpu")), "collectd_cpu");
        assert_eq!(index_name(Some("interface_if_octets_rx")), "collectd_interface_if_octets");
        assert_eq!(index_name(Some("cpu")), "collectd_cpu");
        assert_eq!(index_name(None), "collectd_generic");
    }

    #[test]
    fn test_epoch_from_format_layouts() {
        assert_eq!(epoch_from_format("2021-01-01T00:00:00Z"), 1_609_459_200);
        assert_eq!(epoch_from_format("2021-01-01T00:00:00.000000"), 1_609_459_200);
        assert_eq!(epoch_from_format("2021-01-01 00:00:00.000000"), 1_609_459_200);
        assert_eq!(epoch_from_format("Fri Jan  1 00:00:00 2021"), 1_609_459_200);
        assert_eq!(epoch_from_format("yesterday"), 0);
    }

    #[test]
    fn test_ves_payload_is_recovered() {
        let raw = br#"{"labels":{"alertname":"collectd_ves_x"},"ves":"{\"event\":{\"id\":\"1\"}}"}"#;
        let sanitized = sanitize_collectd(raw).unwrap();
        let parsed: Value = serde_json::from_str(&sanitized).unwrap();
        assert_eq!(parsed[0]["ves"]["event"]["id"], "1");

        let decoded = decode(raw).unwrap();
        assert_eq!(decoded.messages.len(), 1);
        assert_eq!(decoded.messages[0]["index"], "collectd_ves");
    }
}
