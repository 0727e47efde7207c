//! In-process publish/subscribe bus.
//!
//! Every subscribed sink owns one bounded FIFO queue and one delivery task.
//! Publishing enqueues onto the queue of each interested sink and waits for
//! capacity when a queue is full, so a slow sink slows its publishers down
//! instead of losing data. Payloads are shared between sinks through `Arc`.
//!
//! # Example
//!
//! ```
//! use shared::bus::{BusBuilder, Subscription};
//! use shared::handler::EventPublish;
//! use shared::models::{EventPayload, EventType};
//! use shared::sink::{ElasticsearchSink, InMemoryIndexer};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let sink = Arc::new(ElasticsearchSink::new(Arc::new(InMemoryIndexer::new())));
//! let bus = BusBuilder::new()
//!     .subscribe_events(sink, Subscription::All)
//!     .build();
//!
//! bus.publish_event("events", EventType::Log, EventPayload::Blob(vec![]))
//!     .await
//!     .unwrap();
//! bus.shutdown().await;
//! # });
//! ```

use crate::handler::{EventPublish, MetricPublish};
use crate::models::{EventPayload, EventType, Metric};
use crate::sink::Sink;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default capacity of each sink's queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Errors raised by the bus.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// The bus has been shut down.
    #[error("Bus is closed")]
    Closed,

    /// Failed to acquire lock on the routing table.
    #[error("Failed to acquire lock on bus routes")]
    LockError,
}

/// Which handlers' events a sink receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    /// Events of every handler.
    All,
    /// Events of the named handlers only.
    Handlers(Vec<String>),
}

impl Subscription {
    /// Returns true if events published by `handler` match.
    #[must_use]
    pub fn matches(&self, handler: &str) -> bool {
        match self {
            Self::All => true,
            Self::Handlers(names) => names.iter().any(|name| name == handler),
        }
    }
}

enum Delivery {
    Event {
        handler: Arc<str>,
        event_type: EventType,
        payload: Arc<EventPayload>,
    },
    Metric(Arc<Metric>),
}

struct Subscriber {
    sink: Arc<dyn Sink>,
    events: Option<Subscription>,
    metrics: bool,
}

struct Route {
    name: String,
    events: Option<Subscription>,
    metrics: bool,
    sender: mpsc::Sender<Delivery>,
}

/// Collects subscriptions and builds the [`Bus`].
pub struct BusBuilder {
    subscribers: Vec<Subscriber>,
    capacity: usize,
}

impl BusBuilder {
    /// Creates a builder with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Sets the capacity of every sink's queue (at least 1).
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    fn subscriber(&mut self, sink: Arc<dyn Sink>) -> &mut Subscriber {
        if let Some(index) = self
            .subscribers
            .iter()
            .position(|existing| Arc::ptr_eq(&existing.sink, &sink))
        {
            return &mut self.subscribers[index];
        }
        self.subscribers.push(Subscriber {
            sink,
            events: None,
            metrics: false,
        });
        let last = self.subscribers.len() - 1;
        &mut self.subscribers[last]
    }

    /// Subscribes `sink` to events matching `subscription`.
    #[must_use]
    pub fn subscribe_events(mut self, sink: Arc<dyn Sink>, subscription: Subscription) -> Self {
        self.subscriber(sink).events = Some(subscription);
        self
    }

    /// Subscribes `sink` to every metric.
    #[must_use]
    pub fn subscribe_metrics(mut self, sink: Arc<dyn Sink>) -> Self {
        self.subscriber(sink).metrics = true;
        self
    }

    /// Spawns one delivery task per sink and returns the bus.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn build(self) -> Bus {
        let mut routes = Vec::with_capacity(self.subscribers.len());
        let mut tasks = Vec::with_capacity(self.subscribers.len());

        for subscriber in self.subscribers {
            let (sender, receiver) = mpsc::channel(self.capacity);
            let name = subscriber.sink.name().to_string();
            tasks.push(tokio::spawn(deliver(subscriber.sink, receiver)));
            routes.push(Route {
                name,
                events: subscriber.events,
                metrics: subscriber.metrics,
                sender,
            });
        }

        info!(sinks = routes.len(), capacity = self.capacity, "bus started");
        Bus {
            routes: RwLock::new(Some(routes)),
            tasks: Mutex::new(tasks),
        }
    }
}

impl Default for BusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn deliver(sink: Arc<dyn Sink>, mut queue: mpsc::Receiver<Delivery>) {
    while let Some(delivery) = queue.recv().await {
        match delivery {
            Delivery::Event {
                handler,
                event_type,
                payload,
            } => sink.receive_event(&handler, event_type, &payload).await,
            Delivery::Metric(metric) => sink.receive_metric(&metric).await,
        }
    }
    debug!(sink = sink.name(), "delivery drained");
}

/// Routes events and metrics from handlers to sinks.
pub struct Bus {
    routes: RwLock<Option<Vec<Route>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Bus {
    fn senders(
        &self,
        wants: impl Fn(&Route) -> bool,
    ) -> Result<Vec<(String, mpsc::Sender<Delivery>)>, BusError> {
        let routes = self.routes.read().map_err(|_| BusError::LockError)?;
        let routes = routes.as_ref().ok_or(BusError::Closed)?;
        Ok(routes
            .iter()
            .filter(|route| wants(route))
            .map(|route| (route.name.clone(), route.sender.clone()))
            .collect())
    }

    /// Stops accepting publishes, lets every sink receive what is already
    /// enqueued and resolves once all delivery tasks have finished.
    pub async fn shutdown(&self) {
        let closed = match self.routes.write() {
            Ok(mut routes) => routes.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(closed);

        let tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "delivery task failed");
            }
        }
        info!("bus stopped");
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus").finish_non_exhaustive()
    }
}

#[async_trait]
impl EventPublish for Bus {
    async fn publish_event(
        &self,
        handler: &str,
        event_type: EventType,
        payload: EventPayload,
    ) -> Result<(), BusError> {
        let targets = self.senders(|route| {
            route
                .events
                .as_ref()
                .is_some_and(|subscription| subscription.matches(handler))
        })?;

        let handler: Arc<str> = Arc::from(handler);
        let payload = Arc::new(payload);
        for (sink, sender) in targets {
            let delivery = Delivery::Event {
                handler: Arc::clone(&handler),
                event_type,
                payload: Arc::clone(&payload),
            };
            if sender.send(delivery).await.is_err() {
                warn!(sink = %sink, "sink queue closed - event dropped");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MetricPublish for Bus {
    async fn publish_metric(&self, metric: Metric) -> Result<(), BusError> {
        let targets = self.senders(|route| route.metrics)?;

        let metric = Arc::new(metric);
        for (sink, sender) in targets {
            if sender.send(Delivery::Metric(Arc::clone(&metric))).await.is_err() {
                warn!(sink = %sink, "sink queue closed - metric dropped");
            }
        }
        Ok(())
    }
}
