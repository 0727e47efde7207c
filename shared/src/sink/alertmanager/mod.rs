//! Alert-manager sink.
//!
//! Converts decoded events into Prometheus alerts and posts them to an
//! [`AlertReceiver`].

mod alert;
pub mod generators;

pub use alert::PrometheusAlert;

use super::{AlertReceiver, Sink, SinkQueue};
use crate::config::{parse_config, AlertManagerConfig, ConfigError};
use crate::models::{EventPayload, EventType};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Name of the alert-manager sink.
pub const SINK_NAME: &str = "alertmanager";

/// Sink reporting events as alerts.
pub struct AlertManagerSink {
    config: AlertManagerConfig,
    receiver: Arc<dyn AlertReceiver>,
    queue: SinkQueue<PrometheusAlert>,
}

impl AlertManagerSink {
    /// Creates a sink with default configuration posting to `receiver`.
    #[must_use]
    pub fn new(receiver: Arc<dyn AlertReceiver>) -> Self {
        Self {
            config: AlertManagerConfig::default(),
            receiver,
            queue: SinkQueue::default(),
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &AlertManagerConfig {
        &self.config
    }

    async fn post(&self, alert: PrometheusAlert) {
        match self.receiver.post(std::slice::from_ref(&alert)).await {
            Ok(()) => debug!(plugin = SINK_NAME, "alert reported"),
            Err(e) => error!(
                plugin = SINK_NAME,
                error = %e,
                alertname = alert.labels.get("alertname").map_or("", String::as_str),
                "failed to report alert to AlertManager"
            ),
        }
    }
}

impl std::fmt::Debug for AlertManagerSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertManagerSink")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Sink for AlertManagerSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    fn configure(&mut self, blob: &[u8]) -> Result<(), ConfigError> {
        self.config = parse_config(blob)?;
        Ok(())
    }

    async fn receive_event(&self, handler: &str, event_type: EventType, payload: &EventPayload) {
        match event_type {
            EventType::Error => {
                let details = payload
                    .as_document()
                    .and_then(|doc| doc.get("error"))
                    .map(ToString::to_string)
                    .unwrap_or_default();
                error!(plugin = SINK_NAME, handler, error = %details, "handler reported an error");
            }
            EventType::Event => {
                let envelope = match payload.envelope() {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        warn!(plugin = SINK_NAME, handler, error = %e, "received unknown data in event bus - disregarding");
                        return;
                    }
                };

                let Some(generator) = generators::generator_for(envelope.source) else {
                    debug!(
                        plugin = SINK_NAME,
                        source = %envelope.source,
                        "missing alert generator for data source - disregarding"
                    );
                    return;
                };

                let alert = generator(&self.config.generator_url, &envelope.message);
                if !self.queue.push(alert).await {
                    warn!(plugin = SINK_NAME, handler, "sink is not running - alert dropped");
                }
            }
            EventType::Result | EventType::Log => {
                debug!(plugin = SINK_NAME, handler, %event_type, "ignoring event type");
            }
        }
    }

    async fn run(&self, cancel: CancellationToken) {
        let Some(mut alerts) = self.queue.take_receiver() else {
            warn!(plugin = SINK_NAME, "sink is already running");
            return;
        };
        info!(plugin = SINK_NAME, url = %self.config.alertmanager_url, "reporting alerts to AlertManager");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                alert = alerts.recv() => match alert {
                    Some(alert) => self.post(alert).await,
                    None => break,
                },
            }
        }

        alerts.close();
        while let Ok(alert) = alerts.try_recv() {
            self.post(alert).await;
        }
        info!(plugin = SINK_NAME, "exited");
    }
}
