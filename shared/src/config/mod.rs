//! Plugin configuration.
//!
//! Handlers and sinks receive their configuration as JSON blobs. A blob is
//! parsed into a fresh structure seeded with defaults and validated; the
//! plugin adopts it only when both steps succeed.

pub mod plugins;

pub use plugins::{AlertManagerConfig, ElasticsearchConfig, HandlerConfig};

use serde::de::DeserializeOwned;
use thiserror::Error;
use validator::Validate;

/// Errors raised while configuring a plugin.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The blob is not valid JSON of the expected shape.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The blob parsed but violates a constraint.
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// A value is well-formed but not acceptable.
    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue {
        /// The offending key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// No handler or sink is registered under the name.
    #[error("Unknown plugin: '{0}'")]
    UnknownPlugin(String),
}

/// Parses and validates a configuration blob.
///
/// An empty (or whitespace only) blob yields the defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] or [`ConfigError::Validation`]; the caller's
/// current configuration is never touched.
///
/// # Example
///
/// ```
/// use shared::config::{parse_config, ElasticsearchConfig};
///
/// let config: ElasticsearchConfig =
///     parse_config(br#"{"HostURL":"http://es:9200","BufferSize":10}"#).unwrap();
/// assert_eq!(config.buffer_size, 10);
///
/// assert!(parse_config::<ElasticsearchConfig>(br#"{"BufferSize":0}"#).is_err());
/// ```
pub fn parse_config<T>(blob: &[u8]) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Validate + Default,
{
    let config = if blob.iter().all(u8::is_ascii_whitespace) {
        T::default()
    } else {
        serde_json::from_slice(blob)?
    };
    config.validate()?;
    Ok(config)
}
