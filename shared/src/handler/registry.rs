//! Compile-time registry of the built-in handlers.

use super::{EventsHandler, Handler};
use crate::config::ConfigError;
use crate::models::DataSource;
use std::collections::BTreeMap;

type Constructor = fn() -> Box<dyn Handler>;

/// Maps handler names to constructors. Built once at startup.
///
/// # Example
///
/// ```
/// use shared::handler::HandlerRegistry;
///
/// let registry = HandlerRegistry::builtin();
/// let handler = registry.create("collectd-events", b"").unwrap();
/// assert_eq!(handler.identify(), "collectd-events");
///
/// assert!(registry.create("nagios-events", b"").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    constructors: BTreeMap<&'static str, Constructor>,
}

impl HandlerRegistry {
    /// Registry with `events`, `collectd-events` and `ceilometer-events`.
    #[must_use]
    pub fn builtin() -> Self {
        let mut constructors: BTreeMap<&'static str, Constructor> = BTreeMap::new();
        constructors.insert("events", || Box::new(EventsHandler::new()));
        constructors.insert("collectd-events", || {
            Box::new(EventsHandler::for_source(DataSource::Collectd))
        });
        constructors.insert("ceilometer-events", || {
            Box::new(EventsHandler::for_source(DataSource::Ceilometer))
        });
        Self { constructors }
    }

    /// Names of every registered handler, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }

    /// Builds and configures the handler registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPlugin`] for unregistered names, or the
    /// handler's configuration error.
    pub fn create(&self, name: &str, config: &[u8]) -> Result<Box<dyn Handler>, ConfigError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPlugin(name.to_string()))?;

        let mut handler = constructor();
        handler.configure(config)?;
        Ok(handler)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
