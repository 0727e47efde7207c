//! HTTP routes of the gateway.

mod health;
mod ingest;

pub use health::health_routes;
pub use ingest::ingest_routes;
