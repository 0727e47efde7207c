//! Gateway state module.
//!
//! Defines the shared state passed to route handlers.

use shared::bus::{Bus, BusBuilder};
use shared::handler::Handler;
use std::collections::HashMap;
use std::sync::Arc;

/// State shared across all request handlers.
///
/// Holds the instantiated handlers, keyed by name, and the bus they publish to.
#[derive(Clone)]
pub struct GatewayState {
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
    bus: Arc<Bus>,
    report_errors: bool,
}

impl GatewayState {
    /// Creates a new state from handlers and a bus.
    #[must_use]
    pub fn new(handlers: Vec<Arc<dyn Handler>>, bus: Arc<Bus>, report_errors: bool) -> Self {
        let handlers = handlers
            .into_iter()
            .map(|handler| (handler.identify().to_string(), handler))
            .collect();
        Self {
            handlers: Arc::new(handlers),
            bus,
            report_errors,
        }
    }

    /// Creates a state whose bus has no subscribers.
    ///
    /// This is useful for development and testing. Must be called within a
    /// tokio runtime.
    #[must_use]
    pub fn without_sinks(handlers: Vec<Arc<dyn Handler>>) -> Self {
        Self::new(handlers, Arc::new(BusBuilder::new().build()), false)
    }

    /// Returns the handler registered under `name`.
    #[must_use]
    pub fn handler(&self, name: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(name)
    }

    /// Returns every handler.
    pub fn handlers(&self) -> impl Iterator<Item = &Arc<dyn Handler>> {
        self.handlers.values()
    }

    /// Returns the handler names in sorted order.
    #[must_use]
    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    /// Whether handlers publish their failures as error events.
    #[must_use]
    pub fn report_errors(&self) -> bool {
        self.report_errors
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("handlers", &self.handler_names())
            .field("report_errors", &self.report_errors)
            .finish_non_exhaustive()
    }
}
