//! Integration tests for the health check endpoint.

use axum::http::StatusCode;

use super::common::{get, test_gateway};

#[tokio::test]
async fn test_health_check() {
    let app = test_gateway(&["events"], false).router();

    let (status, response) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["handlers"], serde_json::json!(["events"]));
}

#[tokio::test]
async fn test_health_reports_every_configured_handler() {
    let app = test_gateway(&["events", "ceilometer-events", "collectd-events"], false).router();

    let (_, response) = get(app, "/health").await;
    assert_eq!(
        response["handlers"],
        serde_json::json!(["ceilometer-events", "collectd-events", "events"])
    );
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = test_gateway(&["events"], false).router();

    let (status, _) = get(app, "/api/v1/logs").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
