//! Ceilometer events wrapped in an oslo messaging envelope.
//!
//! The outer message is `{"request": {"oslo.version": .., "oslo.message": ..}}`
//! where `oslo.message` is a JSON document encoded as a string. Each entry of
//! its `payload` array carries traits as `[name, typeCode, value]` triples.

use super::sanitizer::unescape_fixed_point;
use super::{Decoded, EntryError, PipelineError};
use crate::models::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Prefix of every ceilometer index and alert name.
pub const NAME_PREFIX: &str = "ceilometer_";

/// Trait type code for floating point values.
const FLOAT_TRAIT: f64 = 2.0;

/// A trait triple that could not be decoded.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("parsed invalid trait in event: '{raw}'")]
pub struct TraitError {
    /// The offending trait as received.
    pub raw: Value,
}

#[derive(Debug, Deserialize)]
struct OsloRequest {
    #[serde(rename = "oslo.version", default)]
    _version: Option<String>,
    #[serde(rename = "oslo.message")]
    message: String,
}

#[derive(Debug, Deserialize)]
struct OsloMessage {
    #[serde(default)]
    event_type: String,
    #[serde(default)]
    publisher_id: String,
    #[serde(default)]
    priority: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    payload: Vec<PayloadEntry>,
}

#[derive(Debug, Deserialize)]
struct PayloadEntry {
    #[serde(default)]
    message_id: String,
    #[serde(default)]
    event_type: String,
    #[serde(default)]
    generated: String,
    #[serde(default)]
    traits: Vec<Value>,
}

/// A decoded ceilometer event, one per payload entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CeilometerEvent {
    /// Dotted event type, e.g. `compute.instance.create.end`.
    pub event_type: String,
    /// Identifier of the notification.
    pub message_id: String,
    /// Publisher of the notification.
    pub publisher_id: String,
    /// Notification priority, e.g. `INFO`.
    pub priority: String,
    /// Entry generation time, falling back to the message timestamp.
    pub timestamp: String,
    /// Decoded traits keyed by name.
    pub traits: Document,
}

/// Decodes one `[name, typeCode, value]` triple.
///
/// # Errors
///
/// Returns a [`TraitError`] when the triple is malformed.
pub fn decode_trait(raw: &Value) -> Result<(String, Value), TraitError> {
    let invalid = || TraitError { raw: raw.clone() };

    let [name, code, value] = raw.as_array().map(Vec::as_slice).ok_or_else(invalid)? else {
        return Err(invalid());
    };
    let name = name.as_str().ok_or_else(invalid)?;
    let code = code.as_f64().ok_or_else(invalid)?;

    #[allow(clippy::float_cmp)]
    let value = if code == FLOAT_TRAIT {
        value.as_f64().map(Value::from)
    } else {
        value.as_str().map(Value::from)
    }
    .ok_or_else(invalid)?;

    Ok((name.to_string(), value))
}

/// Derives the index or alert name from a dotted event type: the last segment
/// is dropped, dots and dashes become underscores and the `ceilometer_` prefix
/// is added.
#[must_use]
pub fn index_name(event_type: &str) -> String {
    let base = event_type
        .rsplit_once('.')
        .map_or(event_type, |(head, _)| head)
        .replace(['.', '-'], "_");

    if base.starts_with(NAME_PREFIX) {
        base
    } else {
        format!("{NAME_PREFIX}{base}")
    }
}

fn parse_envelope(raw: &[u8]) -> Result<String, PipelineError> {
    let outer: Value = serde_json::from_slice(raw)
        .map_err(|e| PipelineError::Decode(format!("invalid ceilometer envelope: {e}")))?;

    let request = outer
        .get("request")
        .or_else(|| outer.get("Request"))
        .unwrap_or(&outer);

    let request = OsloRequest::deserialize(request)
        .map_err(|e| PipelineError::Decode(format!("invalid oslo request: {e}")))?;
    Ok(request.message)
}

/// Decodes a raw ceilometer message into one event document per payload entry.
///
/// # Errors
///
/// Returns an error if the envelope or the embedded oslo message cannot be
/// decoded. Malformed traits are reported as entry errors instead.
pub fn decode(raw: &[u8]) -> Result<Decoded, PipelineError> {
    let embedded = unescape_fixed_point(&parse_envelope(raw)?)?;
    let message: OsloMessage = serde_json::from_str(&embedded)
        .map_err(|e| PipelineError::Decode(format!("invalid oslo message: {e}")))?;

    let mut decoded = Decoded::default();
    for entry in message.payload {
        let mut traits = Document::new();
        for raw_trait in &entry.traits {
            match decode_trait(raw_trait) {
                Ok((name, value)) => {
                    traits.insert(name, value);
                }
                Err(e) => decoded.entry_errors.push(EntryError::from(e)),
            }
        }

        let event = CeilometerEvent {
            event_type: if entry.event_type.is_empty() {
                message.event_type.clone()
            } else {
                entry.event_type
            },
            message_id: entry.message_id,
            publisher_id: message.publisher_id.clone(),
            priority: message.priority.clone(),
            timestamp: if entry.generated.is_empty() {
                message.timestamp.clone()
            } else {
                entry.generated
            },
            traits,
        };
        let value = serde_json::to_value(event)
            .map_err(|e| PipelineError::Format(format!("cannot encode event: {e}")))?;
        decoded.messages.push(value);
    }
    Ok(decoded)
}
