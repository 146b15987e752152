//! Storage trait and implementations.
//!
//! This module provides the abstraction every other component uses to reach
//! the metric log table. The `MetricLogStore` trait is the only way in; the
//! `SQLite` implementation owns the table schema.

pub mod sqlite_store;

pub use sqlite_store::SqliteMetricLogStore;

use crate::models::{NewMetricRecord, StoredMetricRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during metric log store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be reached or the statement failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored timestamp could not be parsed.
    #[error("Invalid stored timestamp: '{0}'")]
    InvalidTimestamp(String),
}

/// Trait for metric log storage implementations.
///
/// Records are append-only: there is no update or delete operation.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait MetricLogStore: Send + Sync {
    /// Ensures the record table exists. Safe to call on every start.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Appends one record and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be committed.
    async fn insert(&self, record: &NewMetricRecord) -> Result<i64, StoreError>;

    /// Appends several records in a single transaction.
    ///
    /// Either every record is committed or none is. Ids are returned in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be committed.
    async fn insert_all(&self, records: &[NewMetricRecord]) -> Result<Vec<i64>, StoreError>;

    /// Returns up to `limit` records, newest first.
    ///
    /// Records sharing a timestamp are ordered by descending id.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn query_recent(&self, limit: usize) -> Result<Vec<StoredMetricRecord>, StoreError>;

    /// Returns the total number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Checks that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn ping(&self) -> Result<(), StoreError>;
}
