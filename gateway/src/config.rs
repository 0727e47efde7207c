//! Gateway configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use shared::bus::DEFAULT_QUEUE_CAPACITY;
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Gateway configuration.
///
/// Configuration values can be set via environment variables:
/// - `TELEGATE_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `TELEGATE_PORT`: The port to listen on (default: 8080)
/// - `TELEGATE_HANDLERS`: Comma separated handler names (default: "events")
/// - `TELEGATE_HANDLER_CONFIG_<NAME>`: JSON config of one handler, `<NAME>` being
///   the handler name upper-cased with `-` replaced by `_`
/// - `TELEGATE_REPORT_ERRORS`: Publish decode failures as error events (default: false)
/// - `TELEGATE_QUEUE_CAPACITY`: Per-sink bus queue capacity (default: 100)
/// - `TELEGATE_ALERTMANAGER_CONFIG`: JSON config enabling the alertmanager sink
/// - `TELEGATE_ELASTICSEARCH_CONFIG`: JSON config enabling the elasticsearch sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Handlers to instantiate, by registry name.
    pub handlers: Vec<String>,
    /// Configuration blobs of the handlers, by handler name.
    pub handler_configs: BTreeMap<String, String>,
    /// Whether handlers publish their failures as error events.
    pub report_errors: bool,
    /// Capacity of each sink's bus queue.
    pub queue_capacity: usize,
    /// Configuration blob of the alertmanager sink, if enabled.
    pub alertmanager: Option<String>,
    /// Configuration blob of the elasticsearch sink, if enabled.
    pub elasticsearch: Option<String>,
}

fn parse_handlers(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Variable holding the configuration of the handler `name`.
#[must_use]
pub fn handler_config_var(name: &str) -> String {
    format!(
        "TELEGATE_HANDLER_CONFIG_{}",
        name.to_ascii_uppercase().replace('-', "_")
    )
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("invalid boolean value '{other}'"),
    }
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `TELEGATE_PORT` is set but cannot be parsed as a valid port number
    /// - `TELEGATE_REPORT_ERRORS` is not a boolean
    /// - `TELEGATE_QUEUE_CAPACITY` is not a positive number
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let host = lookup("TELEGATE_HOST").unwrap_or(defaults.host);

        let port = lookup("TELEGATE_PORT")
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("TELEGATE_PORT must be a valid port number")?
            .unwrap_or(defaults.port);

        let handlers = lookup("TELEGATE_HANDLERS")
            .map(|value| parse_handlers(&value))
            .unwrap_or(defaults.handlers);

        let handler_configs = handlers
            .iter()
            .filter_map(|name| {
                lookup(&handler_config_var(name)).map(|blob| (name.clone(), blob))
            })
            .collect();

        let report_errors = lookup("TELEGATE_REPORT_ERRORS")
            .map(|value| parse_bool(&value))
            .transpose()
            .context("TELEGATE_REPORT_ERRORS must be a boolean")?
            .unwrap_or(defaults.report_errors);

        let queue_capacity = lookup("TELEGATE_QUEUE_CAPACITY")
            .map(|value| value.parse::<usize>())
            .transpose()
            .context("TELEGATE_QUEUE_CAPACITY must be a number")?
            .unwrap_or(defaults.queue_capacity);
        anyhow::ensure!(queue_capacity > 0, "TELEGATE_QUEUE_CAPACITY must be at least 1");

        Ok(Self {
            host,
            port,
            handlers,
            handler_configs,
            report_errors,
            queue_capacity,
            alertmanager: lookup("TELEGATE_ALERTMANAGER_CONFIG"),
            elasticsearch: lookup("TELEGATE_ELASTICSEARCH_CONFIG"),
        })
    }

    /// Returns the configuration blob of handler `name`, empty when unset.
    #[must_use]
    pub fn handler_config(&self, name: &str) -> &[u8] {
        self.handler_configs
            .get(name)
            .map_or(&[][..], |blob| blob.as_bytes())
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid socket address {}:{}", self.host, self.port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            handlers: vec!["events".to_string()],
            handler_configs: BTreeMap::new(),
            report_errors: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            alertmanager: None,
            elasticsearch: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.handlers, vec!["events"]);
        assert_eq!(config.queue_capacity, 100);
    }

    #[test]
    fn test_reads_every_variable() {
        let config = Config::from_lookup(lookup(&[
            ("TELEGATE_HOST", "127.0.0.1"),
            ("TELEGATE_PORT", "9000"),
            ("TELEGATE_HANDLERS", "collectd-events, ceilometer-events,"),
            ("TELEGATE_REPORT_ERRORS", "true"),
            ("TELEGATE_QUEUE_CAPACITY", "16"),
            ("TELEGATE_ALERTMANAGER_CONFIG", "{}"),
        ]))
        .unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.handlers, vec!["collectd-events", "ceilometer-events"]);
        assert!(config.report_errors);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.alertmanager.as_deref(), Some("{}"));
        assert!(config.elasticsearch.is_none());
    }

    #[test]
    fn test_handler_configs_per_handler() {
        let config = Config::from_lookup(lookup(&[
            ("TELEGATE_HANDLERS", "events,collectd-events"),
            ("TELEGATE_HANDLER_CONFIG_EVENTS", r#"{"StrictSource":"ceilometer"}"#),
            ("TELEGATE_HANDLER_CONFIG_CEILOMETER_EVENTS", "{}"),
        ]))
        .unwrap();

        assert_eq!(handler_config_var("collectd-events"), "TELEGATE_HANDLER_CONFIG_COLLECTD_EVENTS");
        assert_eq!(config.handler_config("events"), br#"{"StrictSource":"ceilometer"}"#);
        assert!(config.handler_config("collectd-events").is_empty());
        // Only configured handlers pick up a blob.
        assert!(!config.handler_configs.contains_key("ceilometer-events"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("TELEGATE_PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("TELEGATE_REPORT_ERRORS", "maybe")])).is_err());
        assert!(Config::from_lookup(lookup(&[("TELEGATE_QUEUE_CAPACITY", "0")])).is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 3000,
            ..Config::default()
        };
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:3000");

        let config = Config {
            host: "not a host".to_string(),
            ..Config::default()
        };
        assert!(config.socket_addr().is_err());
    }
}
