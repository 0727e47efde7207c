//! Integration tests for the served gateway and its ordered shutdown.

use gateway::{Config, Gateway};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use super::common::test_sinks;

#[tokio::test]
async fn test_shutdown_flushes_partial_batches() {
    let (sinks, alerts, indexer) = test_sinks(r#"{"BufferSize":10,"BulkIndex":true}"#);
    let gateway = Gateway::build(&Config::default(), sinks).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(gateway.serve(listener, shutdown.clone()));

    let client = reqwest::Client::new();
    for host in ["node-1", "node-2", "node-3"] {
        let response = assert_ok!(
            client
                .post(format!("http://{addr}/v1/ingest/events"))
                .body(format!(
                    r#"{{"labels":{{"alertname":"collectd_load_value","host":"{host}"}},"annotations":{{}}}}"#
                ))
                .send()
                .await
        );
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    }

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // Three documents stay below the buffer size and are flushed on shutdown.
    let requests = indexer.requests().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].index, "collectd_load");
    assert_eq!(requests[0].documents.len(), 3);
    assert!(requests[0].bulk);

    assert_eq!(alerts.alerts().unwrap().len(), 3);
}
