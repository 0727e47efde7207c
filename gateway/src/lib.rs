//! Telegate Gateway
//!
//! This crate hosts the Telegate telemetry gateway process. It exposes the
//! handlers over HTTP, wires the configured sinks to the bus and drives the
//! process lifecycle.
//!
//! # Architecture
//!
//! The gateway is built on Axum and Tokio:
//! - `POST /v1/ingest/{handler}` feeds one raw message to a handler
//! - Handlers publish onto a bounded bus with one queue per sink
//! - Sinks run as background tasks posting to Alertmanager or Elasticsearch
//!
//! # Example
//!
//! ```no_run
//! use gateway::run_gateway;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_gateway().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod outbound;
mod routes;
mod state;

pub use config::{handler_config_var, Config};
pub use state::GatewayState;

use anyhow::{Context, Result};
use axum::Router;
use outbound::{HttpAlertReceiver, HttpIndexer};
use shared::bus::{BusBuilder, Subscription};
use shared::config::{parse_config, AlertManagerConfig, ElasticsearchConfig};
use shared::handler::{Handler, HandlerRegistry};
use shared::sink::{AlertManagerSink, ElasticsearchSink, Sink};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Runs the gateway with configuration from environment variables.
///
/// Handles graceful shutdown on SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - A handler or sink configuration is invalid
/// - The server fails to bind to the configured address
pub async fn run_gateway() -> Result<()> {
    let config = Config::from_env()?;
    run_gateway_with_config(config).await
}

/// Runs the gateway with the provided configuration.
///
/// # Errors
///
/// Returns an error if:
/// - A handler or sink configuration is invalid
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_gateway_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr()?;

    info!(
        host = %config.host,
        port = %config.port,
        handlers = ?config.handlers,
        "Telegate gateway starting"
    );

    let sinks = http_sinks(&config)?;
    let gateway = Gateway::build(&config, sinks)?;
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Listening for connections");

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));
    gateway.serve(listener, shutdown).await?;

    info!("Gateway shutdown complete");
    Ok(())
}

/// Builds the sinks enabled by the configuration, backed by HTTP collaborators.
///
/// # Errors
///
/// Returns an error if a sink configuration blob is malformed or invalid.
pub fn http_sinks(config: &Config) -> Result<Vec<Arc<dyn Sink>>> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();

    if let Some(blob) = &config.alertmanager {
        let settings: AlertManagerConfig =
            parse_config(blob.as_bytes()).context("invalid alertmanager configuration")?;
        let mut sink =
            AlertManagerSink::new(Arc::new(HttpAlertReceiver::new(settings.alertmanager_url)));
        sink.configure(blob.as_bytes())?;
        sinks.push(Arc::new(sink));
    }

    if let Some(blob) = &config.elasticsearch {
        let settings: ElasticsearchConfig =
            parse_config(blob.as_bytes()).context("invalid elasticsearch configuration")?;
        let mut sink = ElasticsearchSink::new(Arc::new(HttpIndexer::from_config(&settings)?));
        sink.configure(blob.as_bytes())?;
        sinks.push(Arc::new(sink));
    }

    Ok(sinks)
}

/// A configured gateway: handlers, bus and sinks, ready to serve.
pub struct Gateway {
    state: GatewayState,
    sinks: Vec<Arc<dyn Sink>>,
}

impl Gateway {
    /// Instantiates the configured handlers and subscribes `sinks` to every
    /// handler's events.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured handler is unknown.
    pub fn build(config: &Config, sinks: Vec<Arc<dyn Sink>>) -> Result<Self> {
        let registry = HandlerRegistry::builtin();
        let handlers = config
            .handlers
            .iter()
            .map(|name| {
                registry
                    .create(name, config.handler_config(name))
                    .map(Arc::<dyn Handler>::from)
                    .with_context(|| format!("cannot start handler '{name}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        let bus = sinks
            .iter()
            .fold(
                BusBuilder::new().with_queue_capacity(config.queue_capacity),
                |builder, sink| builder.subscribe_events(Arc::clone(sink), Subscription::All),
            )
            .build();

        for sink in &sinks {
            info!(plugin = sink.name(), "sink enabled");
        }

        Ok(Self {
            state: GatewayState::new(handlers, Arc::new(bus), config.report_errors),
            sinks,
        })
    }

    /// Returns the state shared with the routes.
    #[must_use]
    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Serves requests on `listener` until `shutdown` fires, then stops in
    /// order: the listener, the handlers, the bus and finally the sinks,
    /// which flush whatever they still hold.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails while running.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let sink_cancel = CancellationToken::new();
        let sink_tasks: Vec<JoinHandle<()>> = self
            .sinks
            .iter()
            .map(|sink| {
                let sink = Arc::clone(sink);
                let token = sink_cancel.clone();
                tokio::spawn(async move { sink.run(token).await })
            })
            .collect();

        let handler_tasks: Vec<JoinHandle<()>> = self
            .state
            .handlers()
            .map(|handler| {
                let handler = Arc::clone(handler);
                let bus = Arc::clone(self.state.bus());
                let token = shutdown.clone();
                tokio::spawn(async move { handler.run(token, bus.as_ref(), bus.as_ref()).await })
            })
            .collect();

        let app = create_router(self.state.clone());
        let stop = shutdown.clone();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.cancelled().await })
            .await;

        shutdown.cancel();
        await_all("handler", handler_tasks).await;
        self.state.bus().shutdown().await;
        sink_cancel.cancel();
        await_all("sink", sink_tasks).await;

        served.context("server failed")
    }
}

async fn await_all(kind: &str, tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            error!(kind, error = %e, "background task failed");
        }
    }
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: GatewayState) -> Router {
    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::ingest_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Waits for SIGTERM, SIGINT or an external cancellation, then cancels `token`.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        () = terminate => info!("Received SIGTERM, starting graceful shutdown"),
        () = token.cancelled() => return,
    }
    token.cancel();
}
