//! Index sink.
//!
//! Stores decoded events in per-source indices through an [`Indexer`],
//! optionally batching documents per index.

use super::{Indexer, Sink, SinkQueue};
use crate::config::{parse_config, ConfigError, ElasticsearchConfig};
use crate::models::{DataSource, EventPayload, EventType};
use crate::pipeline::{ceilometer, collectd};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Name of the index sink.
pub const SINK_NAME: &str = "elasticsearch";

/// Returns the index a decoded message of `source` is stored in.
#[must_use]
pub fn index_name(source: DataSource, message: &Value) -> String {
    match source {
        DataSource::Collectd => message
            .get("index")
            .and_then(Value::as_str)
            .map_or_else(
                || {
                    collectd::index_name(
                        message
                            .get("labels")
                            .and_then(|labels| labels.get("alertname"))
                            .and_then(Value::as_str),
                    )
                },
                ToString::to_string,
            ),
        DataSource::Ceilometer => message
            .get("event_type")
            .and_then(Value::as_str)
            .filter(|event_type| !event_type.is_empty())
            .map_or_else(|| format!("{source}_generic"), ceilometer::index_name),
        DataSource::Generic => format!("{source}_generic"),
    }
}

/// Per-index document buffers.
///
/// Owned by the sink's background task; a full buffer is handed back for
/// flushing and only that index is cleared.
#[derive(Debug)]
pub struct IndexBuffer {
    size: usize,
    buffers: HashMap<String, Vec<String>>,
}

impl IndexBuffer {
    /// Creates buffers holding `size` documents per index (at least one).
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            buffers: HashMap::new(),
        }
    }

    /// Adds a document. Returns the index and its documents once the buffer
    /// for that index is full.
    pub fn push(&mut self, index: String, document: String) -> Option<(String, Vec<String>)> {
        if self.size == 1 {
            return Some((index, vec![document]));
        }

        let buffer = self
            .buffers
            .entry(index.clone())
            .or_insert_with(|| Vec::with_capacity(self.size));
        buffer.push(document);
        if buffer.len() < self.size {
            return None;
        }
        self.buffers.remove_entry(&index)
    }

    /// Takes every partially filled buffer.
    pub fn drain(&mut self) -> Vec<(String, Vec<String>)> {
        self.buffers.drain().collect()
    }

    /// Number of documents waiting across all indices.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffers.values().map(Vec::len).sum()
    }
}

#[derive(Debug)]
struct IndexRecord {
    index: String,
    document: String,
}

/// Sink storing events in an index service.
pub struct ElasticsearchSink {
    config: ElasticsearchConfig,
    indexer: Arc<dyn Indexer>,
    queue: SinkQueue<IndexRecord>,
}

impl ElasticsearchSink {
    /// Creates a sink with default configuration writing to `indexer`.
    #[must_use]
    pub fn new(indexer: Arc<dyn Indexer>) -> Self {
        Self {
            config: ElasticsearchConfig::default(),
            indexer,
            queue: SinkQueue::default(),
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    async fn flush(&self, index: &str, documents: &[String]) {
        match self
            .indexer
            .index(index, documents, self.config.bulk_index)
            .await
        {
            Ok(()) => debug!(plugin = SINK_NAME, index, count = documents.len(), "successfully indexed document(s)"),
            Err(e) => error!(
                plugin = SINK_NAME,
                index,
                count = documents.len(),
                error = %e,
                "failed to index event - disregarding"
            ),
        }
    }

    async fn reset_indices(&self) {
        let patterns: Vec<String> = DataSource::ALL.iter().map(|source| source.prefix()).collect();
        match self.indexer.delete_indices(&patterns).await {
            Ok(()) => info!(plugin = SINK_NAME, patterns = ?patterns, "indices reset"),
            Err(e) => error!(plugin = SINK_NAME, error = %e, "failed to reset indices"),
        }
    }
}

impl std::fmt::Debug for ElasticsearchSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchSink")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Sink for ElasticsearchSink {
    fn name(&self) -> &str {
        SINK_NAME
    }

    fn configure(&mut self, blob: &[u8]) -> Result<(), ConfigError> {
        self.config = parse_config(blob)?;
        Ok(())
    }

    async fn receive_event(&self, handler: &str, event_type: EventType, payload: &EventPayload) {
        if event_type != EventType::Event {
            debug!(plugin = SINK_NAME, handler, %event_type, "ignoring event type");
            return;
        }

        let envelope = match payload.envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(plugin = SINK_NAME, handler, error = %e, "received unknown data in event bus - disregarding");
                return;
            }
        };

        let document = match serde_json::to_string(&envelope.message) {
            Ok(document) => document,
            Err(e) => {
                error!(plugin = SINK_NAME, handler, error = %e, "failed to marshal event - disregarding");
                return;
            }
        };

        let record = IndexRecord {
            index: index_name(envelope.source, &envelope.message),
            document,
        };
        if !self.queue.push(record).await {
            warn!(plugin = SINK_NAME, handler, "sink is not running - document dropped");
        }
    }

    async fn run(&self, cancel: CancellationToken) {
        let Some(mut records) = self.queue.take_receiver() else {
            warn!(plugin = SINK_NAME, "sink is already running");
            return;
        };

        if self.config.reset_index {
            self.reset_indices().await;
        }
        info!(plugin = SINK_NAME, url = %self.config.host_url, "storing events to Elasticsearch");

        let mut buffer = IndexBuffer::new(self.config.buffer_size);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                record = records.recv() => match record {
                    Some(record) => {
                        if let Some((index, documents)) = buffer.push(record.index, record.document) {
                            self.flush(&index, &documents).await;
                        }
                    }
                    None => break,
                },
            }
        }

        records.close();
        while let Ok(record) = records.try_recv() {
            if let Some((index, documents)) = buffer.push(record.index, record.document) {
                self.flush(&index, &documents).await;
            }
        }
        for (index, documents) in buffer.drain() {
            self.flush(&index, &documents).await;
        }
        info!(plugin = SINK_NAME, "exited");
    }
}
