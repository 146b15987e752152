//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::config::DEFAULT_MAX_BODY_BYTES;
use shared::ingest::{CategorySet, MetricIngestor};
use shared::storage::{MetricLogStore, SqliteMetricLogStore, StoreError};
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Holds the metric log store that every handler reaches storage through,
/// plus the ingestor built on top of it.
#[derive(Clone)]
pub struct AppState {
    /// The metric log storage backend.
    store: Arc<dyn MetricLogStore>,
    /// Decomposes payloads into records and writes them to `store`.
    ingestor: MetricIngestor,
    /// Maximum accepted request body size.
    max_body_bytes: usize,
}

impl AppState {
    /// Creates a new application state around the given store.
    pub fn new(store: Arc<dyn MetricLogStore>, categories: CategorySet) -> Self {
        let ingestor = MetricIngestor::new(Arc::clone(&store), categories);
        Self {
            store,
            ingestor,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Creates a new application state backed by an initialized in-memory
    /// `SQLite` database and the default categories.
    ///
    /// This is useful for development and testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub async fn with_in_memory_store() -> Result<Self, StoreError> {
        let store = SqliteMetricLogStore::in_memory().await?;
        store.initialize().await?;
        Ok(Self::new(Arc::new(store), CategorySet::default()))
    }

    /// Sets the request body limit.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Returns a reference to the metric log store.
    #[must_use]
    pub fn store(&self) -> &dyn MetricLogStore {
        self.store.as_ref()
    }

    /// Returns the metric ingestor.
    #[must_use]
    pub fn ingestor(&self) -> &MetricIngestor {
        &self.ingestor
    }

    /// Returns the request body limit.
    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}
