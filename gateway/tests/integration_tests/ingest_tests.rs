//! Integration tests for the ingestion endpoint.
//!
//! Tests cover:
//! - Collectd alerts reaching both sinks
//! - Ceilometer events with malformed traits
//! - Rejected messages and unknown handlers

use axum::http::StatusCode;
use serde_json::{json, Value};

use gateway::{handler_config_var, Config};

use super::common::{post_raw, test_gateway, test_gateway_with};

const COLLECTD_FAILURE: &str = r#"{"Labels":{"severity":"FAILURE","alertname":"collectd_cpu_value"},"Annotations":{"summary":"cpu busy"},"StartsAt":"2021-01-01T00:00:00Z"}"#;

fn ceilometer_request(traits: &Value) -> String {
    let oslo = json!({
        "event_type": "event",
        "publisher_id": "telemetry.publisher.controller-0",
        "priority": "SAMPLE",
        "timestamp": "2020-09-14 16:12:58.000000",
        "payload": [{
            "message_id": "084c0bca-0d19-40c0-a724-9916e4815845",
            "event_type": "compute.instance.create.end",
            "traits": traits,
        }]
    });
    json!({"request": {"oslo.version": "2.0", "oslo.message": oslo.to_string()}}).to_string()
}

#[tokio::test]
async fn test_collectd_alert_reaches_both_sinks() {
    let gateway = test_gateway(&["collectd-events"], false);
    let (cancel, tasks) = gateway.start_sinks();

    let (status, response) =
        post_raw(gateway.router(), "/v1/ingest/collectd-events", COLLECTD_FAILURE).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(response["handler"], "collectd-events");

    gateway.finish(cancel, tasks).await;

    let alerts = gateway.alerts.alerts().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].labels["alertname"], "collectd_cpu_value");
    assert_eq!(alerts[0].labels["severity"], "critical");
    assert_eq!(alerts[0].annotations["summary"], "cpu busy");
    assert_eq!(alerts[0].starts_at, "2021-01-01T00:00:00Z");

    let requests = gateway.indexer.requests().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].index, "collectd_cpu");
    assert!(!requests[0].bulk);
    let document: Value = serde_json::from_str(&requests[0].documents[0]).unwrap();
    assert_eq!(document["severity"], "critical");
}

#[tokio::test]
async fn test_detected_source_on_generic_handler() {
    let gateway = test_gateway(&["events"], false);
    let (cancel, tasks) = gateway.start_sinks();

    let (status, _) = post_raw(gateway.router(), "/v1/ingest/events", COLLECTD_FAILURE).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    gateway.finish(cancel, tasks).await;

    let requests = gateway.indexer.requests().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].index, "collectd_cpu");
}

#[tokio::test]
async fn test_strict_source_from_environment() {
    let var = handler_config_var("events");
    let config = Config::from_lookup(|key| {
        (key == var).then(|| r#"{"StrictSource":"generic"}"#.to_string())
    })
    .unwrap();
    let gateway = test_gateway_with(&config);
    let (cancel, tasks) = gateway.start_sinks();

    let (status, _) = post_raw(gateway.router(), "/v1/ingest/events", COLLECTD_FAILURE).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    gateway.finish(cancel, tasks).await;

    // Decoded as generic: indexed under the generic index, no alert generated.
    let requests = gateway.indexer.requests().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].index, "generic_generic");
    assert_eq!(gateway.alerts.post_count().unwrap(), 0);
}

#[tokio::test]
async fn test_ceilometer_malformed_trait_is_skipped() {
    let gateway = test_gateway(&["ceilometer-events"], true);
    let (cancel, tasks) = gateway.start_sinks();

    let body = ceilometer_request(&json!([["a", "b"], ["c", 1, "ok"]]));
    let (status, _) = post_raw(gateway.router(), "/v1/ingest/ceilometer-events", body).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    gateway.finish(cancel, tasks).await;

    let alerts = gateway.alerts.alerts().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].labels["alertname"], "ceilometer_compute_instance_create");
    assert_eq!(alerts[0].labels["severity"], "info");
    assert_eq!(alerts[0].annotations["c"], "ok");
    assert!(!alerts[0].annotations.contains_key("a"));

    let requests = gateway.indexer.requests().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].index, "ceilometer_compute_instance_create");
}

#[tokio::test]
async fn test_decode_failure_is_unprocessable() {
    let gateway = test_gateway(&["ceilometer-events"], true);
    let (cancel, tasks) = gateway.start_sinks();

    let (status, response) = post_raw(
        gateway.router(),
        "/v1/ingest/ceilometer-events",
        r#"{"request": 42}"#,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response["error"].is_string());
    assert!(response["message"].is_string());

    gateway.finish(cancel, tasks).await;

    // The reported error event is logged by the alert sink, never posted.
    assert_eq!(gateway.alerts.post_count().unwrap(), 0);
    assert!(gateway.indexer.requests().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_handler() {
    let gateway = test_gateway(&["events"], false);

    let (status, response) =
        post_raw(gateway.router(), "/v1/ingest/collectd-events", COLLECTD_FAILURE).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response["error"], "unknown_handler");
}
