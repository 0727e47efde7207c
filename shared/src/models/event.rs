//! Event data model.
//!
//! Defines the canonical `Event` routed over the bus, its payload forms and
//! the `{source, message}` envelope sinks consume.

use crate::models::DataSource;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A structured JSON document.
pub type Document = Map<String, Value>;

/// Classification of the data carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Diagnostics about a pipeline failure. Never fed back into a handler.
    Error,
    /// Regular event data.
    Event,
    /// Result of a check executed by a client side agent.
    Result,
    /// A log record.
    Log,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Event => write!(f, "event"),
            Self::Result => write!(f, "result"),
            Self::Log => write!(f, "log"),
        }
    }
}

/// Canonical severity of an alert-like event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    /// Informational.
    Info,
    /// Warning conditions.
    Warning,
    /// Critical conditions.
    Critical,
    /// Severity missing or not recognized.
    #[default]
    Unknown,
}

impl EventSeverity {
    /// Returns the lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an event; interpretation depends on the [`EventType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPayload {
    /// A structured key/value document.
    Document(Document),
    /// An opaque blob, base64 encoded when serialized.
    Blob(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl EventPayload {
    /// Returns the document if this payload is structured.
    #[must_use]
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(doc) => Some(doc),
            Self::Blob(_) => None,
        }
    }

    /// Returns the payload bytes: JSON for documents, raw content for blobs.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Document(doc) => serde_json::to_vec(doc).unwrap_or_default(),
            Self::Blob(bytes) => bytes.clone(),
        }
    }

    /// Interprets the payload as an [`EventEnvelope`].
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a well-formed envelope.
    pub fn envelope(&self) -> Result<EventEnvelope, EnvelopeError> {
        match self {
            Self::Document(doc) => EventEnvelope::from_document(doc),
            Self::Blob(bytes) => EventEnvelope::from_bytes(bytes),
        }
    }
}

impl From<Document> for EventPayload {
    fn from(doc: Document) -> Self {
        Self::Document(doc)
    }
}

/// An event routed over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identity of the publishing handler; the bus routing key.
    pub handler: String,
    /// Classification of the payload.
    pub event_type: EventType,
    /// The payload.
    pub payload: EventPayload,
}

impl Event {
    /// Creates a new event.
    #[must_use]
    pub fn new(handler: impl Into<String>, event_type: EventType, payload: EventPayload) -> Self {
        Self {
            handler: handler.into(),
            event_type,
            payload,
        }
    }
}

/// Errors raised while deconstructing an [`EventEnvelope`].
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The serialized form is not valid JSON of the expected shape.
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The envelope names a source that is not registered.
    #[error(transparent)]
    UnknownSource(#[from] crate::models::UnknownDataSource),

    /// A required field is absent.
    #[error("Envelope is missing field '{0}'")]
    MissingField(&'static str),
}

/// Wrapper that tags a decoded message with its originating source.
///
/// # Example
///
/// ```
/// use shared::models::{DataSource, EventEnvelope};
/// use serde_json::json;
///
/// let envelope = EventEnvelope::new(DataSource::Collectd, json!({"index": "collectd_cpu"}));
/// let bytes = envelope.to_bytes();
/// let decoded = EventEnvelope::from_bytes(&bytes).unwrap();
///
/// assert_eq!(decoded, envelope);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// The source the message was decoded from.
    pub source: DataSource,
    /// The decoded message.
    pub message: Value,
}

impl EventEnvelope {
    /// Creates a new envelope.
    #[must_use]
    pub fn new(source: DataSource, message: Value) -> Self {
        Self { source, message }
    }

    /// Builds the in-memory document form `{source, message}`.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut doc = Map::with_capacity(2);
        doc.insert("source".into(), Value::String(self.source.to_string()));
        doc.insert("message".into(), self.message.clone());
        doc
    }

    /// Reads an envelope back from its document form.
    ///
    /// # Errors
    ///
    /// Returns an error if `source` or `message` is missing, or the source is
    /// not registered.
    pub fn from_document(doc: &Document) -> Result<Self, EnvelopeError> {
        let source = doc
            .get("source")
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::MissingField("source"))?
            .parse()?;
        let message = doc
            .get("message")
            .cloned()
            .ok_or(EnvelopeError::MissingField("message"))?;
        Ok(Self { source, message })
    }

    /// Serializes the envelope to JSON bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Deserializes an envelope from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Document published with [`EventType::Error`] when a handler fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingError {
    /// The underlying error.
    pub error: String,
    /// The offending input, as text.
    pub context: String,
    /// What the handler did about it.
    pub message: String,
}

impl ProcessingError {
    /// Converts the report into an event payload.
    #[must_use]
    pub fn into_payload(self) -> EventPayload {
        let mut doc = Map::with_capacity(3);
        doc.insert("error".into(), Value::String(self.error));
        doc.insert("context".into(), Value::String(self.context));
        doc.insert("message".into(), Value::String(self.message));
        EventPayload::Document(doc)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
