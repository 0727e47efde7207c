//! Sink contract.
//!
//! Sinks consume events and metrics delivered by the [`Bus`](crate::bus::Bus).
//! A sink's receive methods only hand work to the sink's own bounded queue;
//! the actual downstream calls happen in [`Sink::run`], which drains that
//! queue until cancelled.

pub mod alertmanager;
pub mod collaborators;
pub mod elasticsearch;

pub use alertmanager::{AlertManagerSink, PrometheusAlert};
pub use collaborators::{
    AlertReceiver, DownstreamError, InMemoryAlertReceiver, InMemoryIndexer, IndexRequest, Indexer,
};
pub use elasticsearch::{ElasticsearchSink, IndexBuffer};

use crate::config::ConfigError;
use crate::models::{EventPayload, EventType, Metric};
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of a sink's internal work queue.
pub const SINK_QUEUE_CAPACITY: usize = 100;

/// A consumer of bus traffic.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Stable name of the sink.
    fn name(&self) -> &str;

    /// Applies a JSON configuration blob. On error the current configuration
    /// is kept.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the blob is malformed or invalid.
    fn configure(&mut self, blob: &[u8]) -> Result<(), ConfigError>;

    /// Accepts an event published by `handler`.
    async fn receive_event(&self, handler: &str, event_type: EventType, payload: &EventPayload);

    /// Accepts a metric.
    async fn receive_metric(&self, _metric: &Metric) {}

    /// Processes queued work until `cancel` fires, then drains what is left.
    async fn run(&self, cancel: CancellationToken);
}

/// Bounded queue between a sink's receive side and its background task.
///
/// The receiving half is handed out once, to whoever calls
/// [`SinkQueue::take_receiver`] first.
#[derive(Debug)]
pub struct SinkQueue<T> {
    sender: mpsc::Sender<T>,
    receiver: Mutex<Option<mpsc::Receiver<T>>>,
}

impl<T: Send> SinkQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Enqueues `item`, waiting for capacity.
    ///
    /// Returns `false` if the background task is gone and the item was dropped.
    pub async fn push(&self, item: T) -> bool {
        self.sender.send(item).await.is_ok()
    }

    /// Takes the receiving half. Returns `None` if it was already taken.
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<T>> {
        self.receiver
            .lock()
            .map(|mut guard| guard.take())
            .unwrap_or_else(|poisoned| poisoned.into_inner().take())
    }
}

impl<T: Send> Default for SinkQueue<T> {
    fn default() -> Self {
        Self::new(SINK_QUEUE_CAPACITY)
    }
}
