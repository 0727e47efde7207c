//! Data models for the Telegate gateway.
//!
//! This module contains the canonical metric and event structures shared by
//! handlers, the bus and sinks.

pub mod event;
pub mod metric;
pub mod source;

pub use event::{
    Document, EnvelopeError, Event, EventEnvelope, EventPayload, EventSeverity, EventType,
    ProcessingError,
};
pub use metric::{Metric, MetricType, MetricValidationError};
pub use source::{DataSource, UnknownDataSource};
