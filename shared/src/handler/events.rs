//! Events handler.
//!
//! Decodes collectd, ceilometer and generic messages and publishes each
//! decoded entry as an [`EventType::Event`] carrying a `{source, message}`
//! envelope.

use super::{EventPublish, Handler, MetricPublish};
use crate::config::{parse_config, ConfigError, HandlerConfig};
use crate::models::{DataSource, EventEnvelope, EventType, Metric, ProcessingError};
use crate::pipeline::{detect_source, DecoderRegistry, PipelineError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Default period of the self-metrics loop.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Handler for event messages.
#[derive(Debug)]
pub struct EventsHandler {
    name: String,
    source: Option<DataSource>,
    decoders: DecoderRegistry,
    received: [AtomicU64; DataSource::COUNT],
    tick: Duration,
}

impl EventsHandler {
    /// Creates the multi-source handler, `events`, which detects the source of
    /// every message unless `StrictSource` is configured.
    #[must_use]
    pub fn new() -> Self {
        Self::with_identity("events", None)
    }

    /// Creates a handler bound to one source, named `<source>-events`.
    #[must_use]
    pub fn for_source(source: DataSource) -> Self {
        Self::with_identity(format!("{source}-events"), Some(source))
    }

    fn with_identity(name: impl Into<String>, source: Option<DataSource>) -> Self {
        Self {
            name: name.into(),
            source,
            decoders: DecoderRegistry::builtin(),
            received: Default::default(),
            tick: DEFAULT_TICK,
        }
    }

    /// Overrides the period of the self-metrics loop.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Number of messages received from `source` so far.
    #[must_use]
    pub fn received(&self, source: DataSource) -> u64 {
        self.received[source.index()].load(Ordering::Relaxed)
    }

    async fn report(
        &self,
        events: &dyn EventPublish,
        error: String,
        context: String,
        message: &str,
    ) {
        let payload = ProcessingError {
            error,
            context,
            message: message.to_string(),
        }
        .into_payload();
        if let Err(e) = events
            .publish_event(&self.name, EventType::Error, payload)
            .await
        {
            warn!(handler = %self.name, error = %e, "failed to publish error event");
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn counters(&self) -> Vec<Metric> {
        let mut total = 0_u64;
        let mut metrics = Vec::with_capacity(DataSource::COUNT + 1);

        for source in DataSource::ALL {
            let count = self.received(source);
            if count == 0 {
                continue;
            }
            total += count;
            metrics.push(
                Metric::counter(format!("sg_{source}_events_received"), count as f64)
                    .with_label("source", "SG")
                    .with_interval(self.tick),
            );
        }

        metrics.push(
            Metric::counter("sg_total_events_received", total as f64)
                .with_label("source", "SG")
                .with_interval(self.tick),
        );
        metrics
    }
}

impl Default for EventsHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Handler for EventsHandler {
    fn identify(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        msg: &[u8],
        report_errors: bool,
        _metrics: &dyn MetricPublish,
        events: &dyn EventPublish,
    ) -> Result<(), PipelineError> {
        let source = self.source.unwrap_or_else(|| detect_source(msg));
        self.received[source.index()].fetch_add(1, Ordering::Relaxed);

        let decoded = match self.decoders.decode(source, msg) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(handler = %self.name, %source, error = %e, "failed to decode event - disregarding");
                if report_errors {
                    let context = String::from_utf8_lossy(msg).into_owned();
                    self.report(events, e.to_string(), context, "failed to decode event - disregarding")
                        .await;
                }
                return Err(e);
            }
        };

        for entry in decoded.entry_errors {
            warn!(handler = %self.name, %source, error = %entry, "failed to format event entry - disregarding");
            if report_errors {
                self.report(
                    events,
                    entry.reason,
                    entry.context,
                    "failed to format event entry - disregarding",
                )
                .await;
            }
        }

        let total = decoded.messages.len();
        for (published, message) in decoded.messages.into_iter().enumerate() {
            let envelope = EventEnvelope::new(source, message);
            if let Err(e) = events
                .publish_event(&self.name, EventType::Event, envelope.to_document().into())
                .await
            {
                error!(
                    handler = %self.name,
                    %source,
                    error = %e,
                    discarded = total - published,
                    "failed to publish event - discarding remaining entries"
                );
                return Err(e.into());
            }
        }
        Ok(())
    }

    async fn run(
        &self,
        cancel: CancellationToken,
        metrics: &dyn MetricPublish,
        _events: &dyn EventPublish,
    ) {
        let mut tick = interval_at(Instant::now() + self.tick, self.tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = tick.tick() => {
                    for metric in self.counters() {
                        if let Err(e) = metrics.publish_metric(metric).await {
                            debug!(handler = %self.name, error = %e, "failed to publish handler metric");
                        }
                    }
                }
            }
        }
        debug!(handler = %self.name, "exited");
    }

    fn configure(&mut self, blob: &[u8]) -> Result<(), ConfigError> {
        let config: HandlerConfig = parse_config(blob)?;
        if config.strict_source.is_empty() {
            return Ok(());
        }

        let source = config
            .strict_source
            .parse::<DataSource>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "StrictSource",
                reason: e.to_string(),
            })?;
        self.source = Some(source);
        Ok(())
    }
}
