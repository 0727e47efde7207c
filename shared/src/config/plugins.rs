//! Configuration structures of the built-in handlers and sinks.

use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_alertmanager_url() -> String {
    "http://localhost".to_string()
}

fn default_generator_url() -> String {
    "http://sg.localhost.localdomain".to_string()
}

fn default_buffer_size() -> usize {
    1
}

/// Configuration of the events handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct HandlerConfig {
    /// Source every message is decoded as. Empty means detect per message.
    #[serde(rename = "StrictSource", default)]
    pub strict_source: String,
}

/// Configuration of the alert-manager sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AlertManagerConfig {
    /// Endpoint alerts are posted to, used verbatim.
    #[serde(rename = "AlertManagerURL", default = "default_alertmanager_url")]
    #[validate(length(min = 1, message = "AlertManagerURL cannot be empty"))]
    pub alertmanager_url: String,

    /// Value of `generatorURL` on every alert.
    #[serde(rename = "GeneratorURL", default = "default_generator_url")]
    pub generator_url: String,
}

impl Default for AlertManagerConfig {
    fn default() -> Self {
        Self {
            alertmanager_url: default_alertmanager_url(),
            generator_url: default_generator_url(),
        }
    }
}

/// Configuration of the index sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ElasticsearchConfig {
    /// Base URL of the index service.
    #[serde(rename = "HostURL", default)]
    pub host_url: String,

    /// Documents buffered per index before a flush. 1 disables batching.
    #[serde(rename = "BufferSize", default = "default_buffer_size")]
    #[validate(range(min = 1, message = "BufferSize must be at least 1"))]
    pub buffer_size: usize,

    /// Flush buffers through the bulk endpoint.
    #[serde(rename = "BulkIndex", default)]
    pub bulk_index: bool,

    /// Delete every source's indices at startup.
    #[serde(rename = "ResetIndex", default)]
    pub reset_index: bool,

    /// Connect with the TLS settings below.
    #[serde(rename = "UseTLS", default)]
    pub use_tls: bool,

    /// Name the server certificate is verified against, when it differs
    /// from the host in `HostURL`.
    #[serde(rename = "TLSServerName", default)]
    pub tls_server_name: String,

    /// PEM file with the client certificate.
    #[serde(rename = "TLSClientCert", default)]
    pub tls_client_cert: String,

    /// PEM file with the client private key.
    #[serde(rename = "TLSClientKey", default)]
    pub tls_client_key: String,

    /// PEM file with the CA certificate trusted for the server.
    #[serde(rename = "TLSCaCert", default)]
    pub tls_ca_cert: String,

    /// Authenticate every request with `User` and `Password`.
    #[serde(rename = "UseBasicAuth", default)]
    pub use_basic_auth: bool,

    /// Basic auth user.
    #[serde(rename = "User", default)]
    pub user: String,

    /// Basic auth password.
    #[serde(rename = "Password", default)]
    pub password: String,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            host_url: String::new(),
            buffer_size: default_buffer_size(),
            bulk_index: false,
            reset_index: false,
            use_tls: false,
            tls_server_name: String::new(),
            tls_client_cert: String::new(),
            tls_client_key: String::new(),
            tls_ca_cert: String::new(),
            use_basic_auth: false,
            user: String::new(),
            password: String::new(),
        }
    }
}
