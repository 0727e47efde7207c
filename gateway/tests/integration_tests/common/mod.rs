//! Common test utilities and helpers for integration tests.
//!
//! This module provides the test gateway setup, with both sinks backed by
//! in-memory collaborators, and HTTP request helpers.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use gateway::{create_router, Config, Gateway};
use http_body_util::BodyExt;
use serde_json::Value;
use shared::sink::{
    AlertManagerSink, ElasticsearchSink, InMemoryAlertReceiver, InMemoryIndexer, Sink,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A gateway whose sinks write to in-memory collaborators.
pub struct TestGateway {
    pub gateway: Gateway,
    pub sinks: Vec<Arc<dyn Sink>>,
    pub alerts: InMemoryAlertReceiver,
    pub indexer: InMemoryIndexer,
}

/// Builds the sinks for a test gateway. `es_config` is the elasticsearch blob.
pub fn test_sinks(es_config: &str) -> (Vec<Arc<dyn Sink>>, InMemoryAlertReceiver, InMemoryIndexer) {
    let alerts = InMemoryAlertReceiver::new();
    let indexer = InMemoryIndexer::new();

    let alertmanager = AlertManagerSink::new(Arc::new(alerts.clone()));
    let mut elasticsearch = ElasticsearchSink::new(Arc::new(indexer.clone()));
    elasticsearch.configure(es_config.as_bytes()).unwrap();

    let sinks: Vec<Arc<dyn Sink>> = vec![Arc::new(alertmanager), Arc::new(elasticsearch)];
    (sinks, alerts, indexer)
}

/// Creates a test gateway running the given handlers.
pub fn test_gateway(handlers: &[&str], report_errors: bool) -> TestGateway {
    test_gateway_with(&Config {
        handlers: handlers.iter().map(ToString::to_string).collect(),
        report_errors,
        ..Config::default()
    })
}

/// Creates a test gateway from a full configuration.
pub fn test_gateway_with(config: &Config) -> TestGateway {
    let (sinks, alerts, indexer) = test_sinks("");
    let gateway = Gateway::build(config, sinks.clone()).unwrap();

    TestGateway {
        gateway,
        sinks,
        alerts,
        indexer,
    }
}

impl TestGateway {
    /// Returns a router over this gateway's state.
    pub fn router(&self) -> Router {
        create_router(self.gateway.state().clone())
    }

    /// Starts the sinks' background tasks.
    pub fn start_sinks(&self) -> (CancellationToken, Vec<JoinHandle<()>>) {
        let cancel = CancellationToken::new();
        let tasks = self
            .sinks
            .iter()
            .map(|sink| {
                let sink = Arc::clone(sink);
                let token = cancel.clone();
                tokio::spawn(async move { sink.run(token).await })
            })
            .collect();
        (cancel, tasks)
    }

    /// Drains the bus, then stops the sinks so everything reaches the collaborators.
    pub async fn finish(&self, cancel: CancellationToken, tasks: Vec<JoinHandle<()>>) {
        self.gateway.state().bus().shutdown().await;
        cancel.cancel();
        for task in tasks {
            task.await.unwrap();
        }
    }
}

/// Helper to POST a raw body.
///
/// Returns the response status code and parsed JSON response body.
pub async fn post_raw(app: Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(body.into())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a GET request.
///
/// Returns the response status code and parsed JSON response body.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}
