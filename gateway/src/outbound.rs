//! HTTP implementations of the sink collaborators.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Certificate, Identity, Method, RequestBuilder, StatusCode, Url};
use shared::config::ElasticsearchConfig;
use shared::sink::{AlertReceiver, DownstreamError, Indexer, PrometheusAlert};
use std::net::ToSocketAddrs;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_default()
}

async fn check(
    response: reqwest::Response,
    accept: impl Fn(StatusCode) -> bool,
) -> Result<(), DownstreamError> {
    let status = response.status();
    if accept(status) {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(DownstreamError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Posts alerts to a Prometheus Alertmanager.
#[derive(Debug, Clone)]
pub struct HttpAlertReceiver {
    client: reqwest::Client,
    url: String,
}

impl HttpAlertReceiver {
    /// Creates a receiver posting to `url` as given.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl AlertReceiver for HttpAlertReceiver {
    async fn post(&self, alerts: &[PrometheusAlert]) -> Result<(), DownstreamError> {
        let body =
            serde_json::to_vec(alerts).map_err(|e| DownstreamError::Encoding(e.to_string()))?;

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-Custom-Header", "smartgateway")
            .body(body)
            .send()
            .await
            .map_err(|e| DownstreamError::Request(e.to_string()))?;

        check(response, |status| status == StatusCode::OK).await
    }
}

/// Writes documents to an Elasticsearch cluster.
#[derive(Debug, Clone)]
pub struct HttpIndexer {
    client: reqwest::Client,
    host: String,
    credentials: Option<(String, String)>,
}

fn read_pem(path: &str, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {what} from {path}"))
}

impl HttpIndexer {
    /// Creates an indexer for the cluster described by `config`, applying its
    /// TLS and basic auth settings.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A certificate or key file cannot be read or parsed
    /// - `TLSServerName` is set but `HostURL` cannot be resolved
    /// - The HTTP client cannot be built
    pub fn from_config(config: &ElasticsearchConfig) -> Result<Self> {
        let mut host = config.host_url.trim_end_matches('/').to_string();
        let mut builder = reqwest::Client::builder().timeout(HTTP_TIMEOUT);

        if config.use_tls {
            if !config.tls_ca_cert.is_empty() {
                let pem = read_pem(&config.tls_ca_cert, "CA certificate")?;
                builder = builder.add_root_certificate(
                    Certificate::from_pem(&pem).context("invalid TLSCaCert")?,
                );
            }

            if !config.tls_client_cert.is_empty() {
                let mut pem = read_pem(&config.tls_client_cert, "client certificate")?;
                pem.push(b'\n');
                pem.extend(read_pem(&config.tls_client_key, "client key")?);
                builder = builder.identity(
                    Identity::from_pem(&pem).context("invalid TLSClientCert/TLSClientKey")?,
                );
            }

            if !config.tls_server_name.is_empty() {
                let (url, addrs) = pin_server_name(&host, &config.tls_server_name)?;
                builder = builder.resolve_to_addrs(&config.tls_server_name, &addrs);
                host = url;
            }
        }

        let credentials = config
            .use_basic_auth
            .then(|| (config.user.clone(), config.password.clone()));

        Ok(Self {
            client: builder.build().context("failed to build Elasticsearch client")?,
            host,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.host)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.url(path));
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }
}

/// Rewrites `host` to address the cluster as `server_name` and returns the
/// socket addresses `server_name` has to resolve to.
fn pin_server_name(host: &str, server_name: &str) -> Result<(String, Vec<std::net::SocketAddr>)> {
    let mut url = Url::parse(host).with_context(|| format!("invalid HostURL {host}"))?;
    let name = url
        .host_str()
        .with_context(|| format!("HostURL {host} has no host"))?
        .to_string();
    let port = url
        .port_or_known_default()
        .with_context(|| format!("HostURL {host} has no port"))?;

    let addrs: Vec<_> = (name.as_str(), port)
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve {name}"))?
        .collect();
    url.set_host(Some(server_name))
        .with_context(|| format!("invalid TLSServerName {server_name}"))?;

    Ok((url.as_str().trim_end_matches('/').to_string(), addrs))
}

/// Builds an NDJSON bulk request body indexing `documents` into `index`.
#[must_use]
pub fn bulk_body(index: &str, documents: &[String]) -> String {
    let action = serde_json::json!({ "index": { "_index": index } }).to_string();
    documents.iter().fold(String::new(), |mut body, document| {
        body.push_str(&action);
        body.push('\n');
        body.push_str(document);
        body.push('\n');
        body
    })
}

#[async_trait]
impl Indexer for HttpIndexer {
    async fn index(
        &self,
        index: &str,
        documents: &[String],
        bulk: bool,
    ) -> Result<(), DownstreamError> {
        if bulk {
            let response = self
                .request(Method::POST, "_bulk")
                .header("Content-Type", "application/x-ndjson")
                .body(bulk_body(index, documents))
                .send()
                .await
                .map_err(|e| DownstreamError::Request(e.to_string()))?;
            return check(response, |status| status.is_success()).await;
        }

        let path = format!("{index}/_doc");
        for document in documents {
            let response = self
                .request(Method::POST, &path)
                .header("Content-Type", "application/json")
                .body(document.clone())
                .send()
                .await
                .map_err(|e| DownstreamError::Request(e.to_string()))?;
            check(response, |status| status.is_success()).await?;
        }
        Ok(())
    }

    async fn delete_indices(&self, patterns: &[String]) -> Result<(), DownstreamError> {
        let response = self
            .request(Method::DELETE, &patterns.join(","))
            .send()
            .await
            .map_err(|e| DownstreamError::Request(e.to_string()))?;

        // Missing indices are not an error when resetting.
        check(response, |status| {
            status.is_success() || status == StatusCode::NOT_FOUND
        })
        .await
    }
}
