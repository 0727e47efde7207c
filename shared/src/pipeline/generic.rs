//! Generic JSON documents.

use super::sanitizer::normalize_shape;
use super::{Decoded, EntryError, PipelineError};
use serde_json::Value;

/// Decodes one object or an array of objects; each object becomes a message.
///
/// # Errors
///
/// Returns [`PipelineError::Decode`] if the payload is not JSON.
pub fn decode(raw: &[u8]) -> Result<Decoded, PipelineError> {
    let shaped = normalize_shape(raw)?;
    let entries: Vec<Value> = serde_json::from_str(&shaped)
        .map_err(|e| PipelineError::Decode(format!("invalid JSON document: {e}")))?;

    let mut decoded = Decoded::default();
    for entry in entries {
        if entry.is_object() {
            decoded.messages.push(entry);
        } else {
            decoded
                .entry_errors
                .push(EntryError::new("entry is not a JSON object", entry.to_string()));
        }
    }
    Ok(decoded)
}
