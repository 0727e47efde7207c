//! Downstream collaborators used by the built-in sinks.
//!
//! Provides the `AlertReceiver` and `Indexer` traits that abstract the network
//! clients, together with in-memory implementations for development and
//! testing.

use super::PrometheusAlert;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors returned by a downstream collaborator.
#[derive(Debug, Error)]
pub enum DownstreamError {
    /// The request could not be sent or the connection failed.
    #[error("Request failed: {0}")]
    Request(String),

    /// The downstream service answered with an unexpected status.
    #[error("Unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// Payload could not be encoded.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Failed to acquire lock on an in-memory collaborator.
    #[error("Failed to acquire lock on collaborator")]
    LockError,
}

/// Receives alerts, e.g. a Prometheus Alertmanager.
#[async_trait]
pub trait AlertReceiver: Send + Sync {
    /// Posts a batch of alerts.
    ///
    /// # Errors
    ///
    /// Returns a [`DownstreamError`] if the alerts were not accepted.
    async fn post(&self, alerts: &[PrometheusAlert]) -> Result<(), DownstreamError>;
}

/// Stores documents in named indices, e.g. Elasticsearch.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Indexes serialized documents into `index`, through the bulk API when
    /// `bulk` is set.
    ///
    /// # Errors
    ///
    /// Returns a [`DownstreamError`] if indexing failed.
    async fn index(&self, index: &str, documents: &[String], bulk: bool)
        -> Result<(), DownstreamError>;

    /// Deletes every index matching one of `patterns`.
    ///
    /// # Errors
    ///
    /// Returns a [`DownstreamError`] if deletion failed.
    async fn delete_indices(&self, patterns: &[String]) -> Result<(), DownstreamError>;
}

/// In-memory alert receiver that records every posted batch.
///
/// # Example
///
/// ```
/// use shared::sink::{AlertReceiver, InMemoryAlertReceiver, PrometheusAlert};
///
/// # tokio_test::block_on(async {
/// let receiver = InMemoryAlertReceiver::new();
/// receiver.post(&[PrometheusAlert::new("http://gen")]).await.unwrap();
///
/// assert_eq!(receiver.alerts().unwrap().len(), 1);
/// # });
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryAlertReceiver {
    batches: Arc<RwLock<Vec<Vec<PrometheusAlert>>>>,
}

impl InMemoryAlertReceiver {
    /// Creates an empty receiver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every alert received so far, in order.
    ///
    /// # Errors
    ///
    /// Returns [`DownstreamError::LockError`] if the lock is poisoned.
    pub fn alerts(&self) -> Result<Vec<PrometheusAlert>, DownstreamError> {
        let batches = self.batches.read().map_err(|_| DownstreamError::LockError)?;
        Ok(batches.iter().flatten().cloned().collect())
    }

    /// Returns the number of `post` calls.
    ///
    /// # Errors
    ///
    /// Returns [`DownstreamError::LockError`] if the lock is poisoned.
    pub fn post_count(&self) -> Result<usize, DownstreamError> {
        let batches = self.batches.read().map_err(|_| DownstreamError::LockError)?;
        Ok(batches.len())
    }
}

#[async_trait]
impl AlertReceiver for InMemoryAlertReceiver {
    async fn post(&self, alerts: &[PrometheusAlert]) -> Result<(), DownstreamError> {
        let mut batches = self.batches.write().map_err(|_| DownstreamError::LockError)?;
        batches.push(alerts.to_vec());
        Ok(())
    }
}

/// One recorded `index` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRequest {
    /// Target index.
    pub index: String,
    /// Serialized documents.
    pub documents: Vec<String>,
    /// Whether the bulk API was requested.
    pub bulk: bool,
}

/// In-memory indexer that records every request.
#[derive(Debug, Default, Clone)]
pub struct InMemoryIndexer {
    requests: Arc<RwLock<Vec<IndexRequest>>>,
    deletions: Arc<RwLock<Vec<Vec<String>>>>,
}

impl InMemoryIndexer {
    /// Creates an empty indexer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every `index` call so far, in order.
    ///
    /// # Errors
    ///
    /// Returns [`DownstreamError::LockError`] if the lock is poisoned.
    pub fn requests(&self) -> Result<Vec<IndexRequest>, DownstreamError> {
        let requests = self.requests.read().map_err(|_| DownstreamError::LockError)?;
        Ok(requests.clone())
    }

    /// Returns the pattern lists of every `delete_indices` call.
    ///
    /// # Errors
    ///
    /// Returns [`DownstreamError::LockError`] if the lock is poisoned.
    pub fn deletions(&self) -> Result<Vec<Vec<String>>, DownstreamError> {
        let deletions = self.deletions.read().map_err(|_| DownstreamError::LockError)?;
        Ok(deletions.clone())
    }
}

#[async_trait]
impl Indexer for InMemoryIndexer {
    async fn index(
        &self,
        index: &str,
        documents: &[String],
        bulk: bool,
    ) -> Result<(), DownstreamError> {
        let mut requests = self.requests.write().map_err(|_| DownstreamError::LockError)?;
        requests.push(IndexRequest {
            index: index.to_string(),
            documents: documents.to_vec(),
            bulk,
        });
        Ok(())
    }

    async fn delete_indices(&self, patterns: &[String]) -> Result<(), DownstreamError> {
        let mut deletions = self.deletions.write().map_err(|_| DownstreamError::LockError)?;
        deletions.push(patterns.to_vec());
        Ok(())
    }
}
