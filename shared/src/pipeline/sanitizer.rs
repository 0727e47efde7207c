//! Shape normalization and nested-escape recovery.
//!
//! Some agents embed a JSON object as a string field whose content is itself
//! escaped, occasionally more than once. Recovery strips one escaping level per
//! pass until the text is stable, guarded by two checks:
//!
//! - the *remaining-nested* check finds doubly escaped quotes still present;
//! - the *invalid-quoting* check finds string values broken by a bare quote.
//!
//! A pass whose output trips the invalid-quoting check is rejected, which keeps
//! legitimately escaped inner strings intact.

use super::PipelineError;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use std::borrow::Cow;

/// Upper bound on unescaping passes before a message is rejected.
pub const MAX_UNESCAPE_DEPTH: usize = 16;

static NESTED_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\\""#).unwrap());

static REMAINED_NESTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"":"[^",]+\\\\"[^",]+""#).unwrap());

static INVALID_QUOTING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"":"[^",\\]+"[^",\\]+""#).unwrap());

static VES_FIELD: Lazy<NestedField> = Lazy::new(|| NestedField::new("ves"));

/// A string-typed field known to carry an embedded JSON object.
#[derive(Debug)]
pub struct NestedField {
    name: String,
    pattern: Regex,
}

impl NestedField {
    /// Builds the locator for `"<name>":"{...}"`.
    ///
    /// # Panics
    ///
    /// Never in practice: the field name is escaped before compilation.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let pattern = format!(r#""{}":"\{{(.*)\}}""#, regex::escape(name));
        Self {
            name: name.to_string(),
            pattern: Regex::new(&pattern).expect("escaped field pattern is valid"),
        }
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Trims the raw message and wraps a bare object into a one-element array so
/// that single-object and array-wrapped variants decode the same way.
///
/// # Errors
///
/// Returns [`PipelineError::Decode`] if the bytes are not UTF-8.
pub fn normalize_shape(raw: &[u8]) -> Result<String, PipelineError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| PipelineError::Decode(format!("message is not valid UTF-8: {e}")))?
        .trim();

    if text.starts_with('[') {
        Ok(text.to_string())
    } else {
        Ok(format!("[{text}]"))
    }
}

/// Strips escaping levels from `input` until neither check matches.
///
/// # Errors
///
/// Returns [`PipelineError::Format`] when a pass can make no further progress
/// while a check still matches, or when [`MAX_UNESCAPE_DEPTH`] passes were not
/// enough.
pub fn unescape_fixed_point(input: &str) -> Result<String, PipelineError> {
    let mut current = input.to_string();

    for _ in 0..MAX_UNESCAPE_DEPTH {
        let accepted = match NESTED_QUOTE.replace_all(&current, "\"") {
            Cow::Owned(cleaned) if !INVALID_QUOTING.is_match(&cleaned) => Some(cleaned),
            _ => None,
        };
        let progressed = match accepted {
            Some(cleaned) => {
                current = cleaned;
                true
            }
            None => false,
        };

        let remaining = REMAINED_NESTED.is_match(&current);
        let invalid = INVALID_QUOTING.is_match(&current);
        if !remaining && !invalid {
            return Ok(current);
        }
        if !progressed {
            return Err(PipelineError::Format(
                "nested escaping could not be resolved".to_string(),
            ));
        }
    }

    Err(PipelineError::Format(format!(
        "nested escaping exceeds {MAX_UNESCAPE_DEPTH} levels"
    )))
}

/// Recovers the embedded object of `field` and splices it back as an object:
/// `"<field>":"{...}"` becomes `"<field>":{...}`.
///
/// Documents without the field are returned unchanged.
///
/// # Errors
///
/// Propagates [`unescape_fixed_point`] failures.
pub fn recover_nested_field(document: &str, field: &NestedField) -> Result<String, PipelineError> {
    let Some(captures) = field.pattern.captures(document) else {
        return Ok(document.to_string());
    };

    let inner = unescape_fixed_point(&captures[1])?;
    let replacement = format!("\"{}\":{{{inner}}}", field.name);
    Ok(field
        .pattern
        .replace(document, NoExpand(&replacement))
        .into_owned())
}

/// Full sanitizer for collectd payloads: shape normalization followed by
/// recovery of the `ves` field.
///
/// # Errors
///
/// Returns an error if the payload is not UTF-8 or `ves` cannot be recovered.
pub fn sanitize_collectd(raw: &[u8]) -> Result<String, PipelineError> {
    let shaped = normalize_shape(raw)?;
    recover_nested_field(&shaped, &VES_FIELD)
}
