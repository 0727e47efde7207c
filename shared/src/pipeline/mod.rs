//! Normalization pipeline.
//!
//! Turns raw, source-specific and sometimes double-encoded JSON into decoded
//! messages ready to be wrapped in an [`EventEnvelope`](crate::models::EventEnvelope).
//!
//! # Example
//!
//! ```
//! use shared::models::DataSource;
//! use shared::pipeline::DecoderRegistry;
//!
//! let registry = DecoderRegistry::builtin();
//! let raw = br#"{"labels":{"alertname":"collectd_cpu_value","severity":"OKAY"}}"#;
//!
//! let decoded = registry.decode(DataSource::Collectd, raw).unwrap();
//! assert_eq!(decoded.messages[0]["index"], "collectd_cpu");
//! ```

pub mod ceilometer;
pub mod collectd;
pub mod generic;
pub mod sanitizer;

use crate::bus::BusError;
use crate::models::DataSource;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

pub use ceilometer::TraitError;

/// Whole-message pipeline failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The message (or its envelope) is not parseable.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The message is parseable text but its structure cannot be normalized.
    #[error("Format error: {0}")]
    Format(String),

    /// Decoded entries could not be handed to the bus.
    #[error("Publish error: {0}")]
    Publish(#[from] BusError),
}

/// Failure confined to one entry of a message; siblings still decode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct EntryError {
    /// What went wrong.
    pub reason: String,
    /// The offending entry, as text.
    pub context: String,
}

impl EntryError {
    /// Creates a new entry error.
    #[must_use]
    pub fn new(reason: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            context: context.into(),
        }
    }
}

impl From<TraitError> for EntryError {
    fn from(err: TraitError) -> Self {
        let context = err.raw.to_string();
        Self::new(err.to_string(), context)
    }
}

/// Result of decoding one transport message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    /// One decoded document per successfully decoded entry.
    pub messages: Vec<Value>,
    /// Entry-level failures.
    pub entry_errors: Vec<EntryError>,
}

/// Signature shared by all per-source decoders.
pub type DecodeFn = fn(&[u8]) -> Result<Decoded, PipelineError>;

/// Maps each [`DataSource`] to its decoder. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<DataSource, DecodeFn>,
}

impl DecoderRegistry {
    /// Registry with the decoders for every built-in source.
    #[must_use]
    pub fn builtin() -> Self {
        let mut decoders: HashMap<DataSource, DecodeFn> = HashMap::new();
        decoders.insert(DataSource::Generic, generic::decode);
        decoders.insert(DataSource::Collectd, collectd::decode);
        decoders.insert(DataSource::Ceilometer, ceilometer::decode);
        Self { decoders }
    }

    /// Decodes `raw` with the decoder registered for `source`.
    ///
    /// # Errors
    ///
    /// Returns the decoder's error, or [`PipelineError::Decode`] when no
    /// decoder is registered for the source.
    pub fn decode(&self, source: DataSource, raw: &[u8]) -> Result<Decoded, PipelineError> {
        let decoder = self
            .decoders
            .get(&source)
            .ok_or_else(|| PipelineError::Decode(format!("no decoder for source '{source}'")))?;
        decoder(raw)
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Guesses the source of a raw message from its top-level fields.
///
/// Messages carrying `oslo.message` are ceilometer; messages carrying both
/// labels and annotations are collectd; everything else is generic.
#[must_use]
pub fn detect_source(raw: &[u8]) -> DataSource {
    let Ok(text) = std::str::from_utf8(raw) else {
        return DataSource::Generic;
    };

    if text.contains("\"oslo.message\"") {
        return DataSource::Ceilometer;
    }

    let has = |lower: &str, upper: &str| {
        text.contains(&format!("\"{lower}\"")) || text.contains(&format!("\"{upper}\""))
    };
    if has("labels", "Labels") && has("annotations", "Annotations") {
        return DataSource::Collectd;
    }

    DataSource::Generic
}
