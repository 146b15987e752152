//! Payload validation and decomposition.
//!
//! An agent payload carries an optional `device_id` and an optional
//! `metrics` object keyed by category. Each recognized category present in
//! the payload becomes one metric record; everything else is dropped.

use crate::models::{NewMetricRecord, UNKNOWN_DEVICE};
use crate::storage::{MetricLogStore, StoreError};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while ingesting a payload.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The body was missing, empty, not JSON, or not a non-empty JSON object.
    #[error("No data provided")]
    NoData,

    /// `device_id` was present but not a string.
    #[error("device_id must be a string")]
    InvalidDeviceId,

    /// `metrics` was present but not an object.
    #[error("metrics must be an object")]
    InvalidMetrics,

    /// Persisting the records failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl IngestError {
    /// Returns true if the error was caused by the payload rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

/// A validated ingestion payload.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestRequest {
    /// Reporting agent, `"unknown"` when the payload does not say.
    pub device_id: String,
    /// Category payloads keyed by category name.
    pub metrics: Map<String, Value>,
}

impl IngestRequest {
    /// Parses and validates a raw request body.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::NoData`] if the body is empty or not a non-empty
    /// JSON object, and the other validation variants for mistyped fields.
    pub fn from_slice(body: &[u8]) -> Result<Self, IngestError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(IngestError::NoData);
        }
        let value: Value = serde_json::from_slice(body).map_err(|_| IngestError::NoData)?;
        Self::from_value(value)
    }

    /// Validates an already parsed JSON payload.
    ///
    /// # Errors
    ///
    /// Same as [`IngestRequest::from_slice`].
    pub fn from_value(value: Value) -> Result<Self, IngestError> {
        let mut object = match value {
            Value::Object(object) if !object.is_empty() => object,
            _ => return Err(IngestError::NoData),
        };

        let device_id = match object.remove("device_id") {
            None | Some(Value::Null) => UNKNOWN_DEVICE.to_string(),
            Some(Value::String(id)) => id,
            Some(_) => return Err(IngestError::InvalidDeviceId),
        };

        let metrics = match object.remove("metrics") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(metrics)) => metrics,
            Some(_) => return Err(IngestError::InvalidMetrics),
        };

        Ok(Self { device_id, metrics })
    }
}

/// Ordered set of metric categories the ingestor stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    names: Vec<String>,
}

impl CategorySet {
    /// Builds a set from category names, trimming whitespace and dropping
    /// blanks and duplicates while keeping first-seen order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if !name.is_empty() && !set.iter().any(|n: &String| n == name) {
                set.push(name.to_string());
            }
        }
        Self { names: set }
    }

    /// Parses a comma-separated list such as `"system,weather"`.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Returns true if `name` is a recognized category.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Iterates over the categories in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Number of categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if no category is recognized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::new(["system", "weather"])
    }
}

/// Turns validated payloads into stored metric records.
#[derive(Clone)]
pub struct MetricIngestor {
    store: Arc<dyn MetricLogStore>,
    categories: CategorySet,
}

impl MetricIngestor {
    /// Creates an ingestor writing to `store` and recognizing `categories`.
    pub fn new(store: Arc<dyn MetricLogStore>, categories: CategorySet) -> Self {
        Self { store, categories }
    }

    /// Returns the recognized categories.
    #[must_use]
    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    /// Builds one record per recognized category present in the request,
    /// all sharing `timestamp`.
    #[must_use]
    pub fn records_for(
        &self,
        request: &IngestRequest,
        timestamp: DateTime<Utc>,
    ) -> Vec<NewMetricRecord> {
        self.categories
            .iter()
            .filter_map(|category| {
                request.metrics.get(category).map(|data| {
                    NewMetricRecord::from_value(&request.device_id, category, timestamp, data)
                })
            })
            .collect()
    }

    /// Persists a request and returns the ids of the new records.
    ///
    /// All records of one request are written in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Storage`] if the records cannot be written.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<Vec<i64>, IngestError> {
        let records = self.records_for(request, Utc::now());

        let ignored: Vec<&str> = request
            .metrics
            .keys()
            .map(String::as_str)
            .filter(|name| !self.categories.contains(name))
            .collect();
        if !ignored.is_empty() {
            tracing::debug!(
                device_id = %request.device_id,
                ?ignored,
                "Ignoring unrecognized metric categories"
            );
        }

        let ids = self.store.insert_all(&records).await?;
        tracing::debug!(device_id = %request.device_id, stored = ids.len(), "Ingested metrics");
        Ok(ids)
    }
}
