//! Telegate Shared Library
//!
//! This crate contains the core of the Telegate telemetry gateway: the
//! canonical data model, the normalization pipeline, the handler and sink
//! contracts and the bus connecting them.
//!
//! # Modules
//!
//! - [`models`] - Canonical metrics, events and envelopes
//! - [`pipeline`] - Per-source sanitizers and decoders
//! - [`handler`] - Ingestion contract and built-in handlers
//! - [`bus`] - Bounded publish/subscribe routing
//! - [`sink`] - Sink contract and built-in sinks
//! - [`config`] - Plugin configuration
//!
//! # Example
//!
//! ```
//! use shared::models::{DataSource, Metric, MetricType};
//!
//! let metric = Metric::with_labels(
//!     "sg_total_events_received",
//!     MetricType::Counter,
//!     3.0,
//!     vec!["source".into()],
//!     vec!["SG".into()],
//! )
//! .unwrap();
//!
//! assert_eq!(metric.label("source"), Some("SG"));
//! assert_eq!("collectd".parse::<DataSource>().unwrap(), DataSource::Collectd);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bus;
pub mod config;
pub mod handler;
pub mod models;
pub mod pipeline;
pub mod sink;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use tokio_util;
pub use validator;
