//! Ingestion contract.
//!
//! A [`Handler`] turns one raw transport message into events and metrics and
//! publishes them through the [`EventPublish`] and [`MetricPublish`] seams,
//! which the [`Bus`](crate::bus::Bus) implements.

pub mod events;
pub mod registry;

pub use events::EventsHandler;
pub use registry::HandlerRegistry;

use crate::bus::BusError;
use crate::config::ConfigError;
use crate::models::{EventPayload, EventType, Metric};
use crate::pipeline::PipelineError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Publishes events onto the bus.
#[async_trait]
pub trait EventPublish: Send + Sync {
    /// Publishes an event on behalf of `handler`. Returns once the event is
    /// enqueued for every interested sink.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] if the bus no longer accepts events.
    async fn publish_event(
        &self,
        handler: &str,
        event_type: EventType,
        payload: EventPayload,
    ) -> Result<(), BusError>;
}

/// Publishes metrics onto the bus.
#[async_trait]
pub trait MetricPublish: Send + Sync {
    /// Publishes a metric. Returns once it is enqueued for every metric sink.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] if the bus no longer accepts metrics.
    async fn publish_metric(&self, metric: Metric) -> Result<(), BusError>;
}

/// Parses transport messages and publishes the results.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Stable name, used as the bus routing key.
    fn identify(&self) -> &str;

    /// Processes exactly one transport message.
    ///
    /// With `report_errors`, a failure is also published as an
    /// [`EventType::Error`] event before it is returned.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] if the message could not be decoded.
    async fn handle(
        &self,
        msg: &[u8],
        report_errors: bool,
        metrics: &dyn MetricPublish,
        events: &dyn EventPublish,
    ) -> Result<(), PipelineError>;

    /// Publishes the handler's own metrics until `cancel` fires.
    async fn run(
        &self,
        cancel: CancellationToken,
        metrics: &dyn MetricPublish,
        events: &dyn EventPublish,
    );

    /// Applies a JSON configuration blob. On error the current configuration
    /// is kept.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the blob is malformed or invalid.
    fn configure(&mut self, blob: &[u8]) -> Result<(), ConfigError>;
}
