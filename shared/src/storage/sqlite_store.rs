//! `SQLite`-backed metric log store.
//!
//! Owns the `MetricLog` table definition. Column names and types match the
//! layout earlier deployments created, so existing database files can be
//! opened as-is.

use super::{MetricLogStore, StoreError};
use crate::models::{
    format_timestamp, parse_timestamp, NewMetricRecord, StoredMetricRecord, UNKNOWN_DEVICE,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, SqliteConnection};
use std::str::FromStr;
use std::sync::Arc;

/// Schema statements, applied in order by [`MetricLogStore::initialize`].
const SCHEMA: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS MetricLog (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        device_id TEXT,
        metric_type TEXT,
        timestamp TEXT,
        data TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_metric_log_recent ON MetricLog (timestamp DESC, id DESC)",
];

const INSERT_SQL: &str =
    "INSERT INTO MetricLog (device_id, metric_type, timestamp, data) VALUES (?, ?, ?, ?)";

const SELECT_RECENT_SQL: &str = "SELECT id, device_id, metric_type, timestamp, data \
     FROM MetricLog ORDER BY timestamp DESC, id DESC LIMIT ?";

/// Raw row as read from `SQLite`. Every column except `id` is nullable.
#[derive(FromRow)]
struct MetricLogRow {
    id: i64,
    device_id: Option<String>,
    metric_type: Option<String>,
    timestamp: Option<String>,
    data: Option<String>,
}

impl TryFrom<MetricLogRow> for StoredMetricRecord {
    type Error = StoreError;

    fn try_from(row: MetricLogRow) -> Result<Self, Self::Error> {
        let raw_ts = row.timestamp.unwrap_or_default();
        let timestamp =
            parse_timestamp(&raw_ts).ok_or_else(|| StoreError::InvalidTimestamp(raw_ts.clone()))?;

        Ok(Self {
            id: row.id,
            device_id: row.device_id.unwrap_or_else(|| UNKNOWN_DEVICE.to_string()),
            metric_type: row.metric_type.unwrap_or_default(),
            timestamp,
            // NULL payloads decode to JSON null.
            data: row.data.unwrap_or_else(|| "null".to_string()),
        })
    }
}

/// `SQLite` metric log store backed by a connection pool.
///
/// Each operation checks a connection out of the pool for its own duration;
/// the connection goes back to the pool when it is dropped, on success and
/// on error alike.
#[derive(Clone, Debug)]
pub struct SqliteMetricLogStore {
    pool: SqlitePool,
}

impl SqliteMetricLogStore {
    /// Opens a store for the given database URL (e.g. `sqlite://metrics.db`).
    ///
    /// The database file is created if it does not exist. The schema is not
    /// touched; call [`MetricLogStore::initialize`] for that.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database cannot be opened.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        Self::connect_with(url, max_connections, true).await
    }

    /// Opens a store for a database that must already exist.
    ///
    /// Unlike [`SqliteMetricLogStore::connect`], a missing database file is an
    /// error rather than being created empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the database file does not exist.
    pub async fn connect_existing(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        Self::connect_with(url, max_connections, false).await
    }

    async fn connect_with(
        url: &str,
        max_connections: u32,
        create_if_missing: bool,
    ) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(create_if_missing);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        tracing::debug!(url, max_connections, create_if_missing, "Opened SQLite pool");
        Ok(Self { pool })
    }

    /// Opens a private in-memory database.
    ///
    /// The pool keeps exactly one connection alive forever, since every
    /// `SQLite` in-memory connection is its own database.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` cannot be initialized.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Opens a store and initializes its schema, wrapped in an Arc.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn open_shared(url: &str, max_connections: u32) -> Result<Arc<Self>, StoreError> {
        let store = Self::connect(url, max_connections).await?;
        store.initialize().await?;
        Ok(Arc::new(store))
    }

    /// Closes every pooled connection, waiting for checked-out ones to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert_with(
        conn: &mut SqliteConnection,
        record: &NewMetricRecord,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query(INSERT_SQL)
            .bind(&record.device_id)
            .bind(&record.metric_type)
            .bind(format_timestamp(&record.timestamp))
            .bind(&record.data)
            .execute(conn)
            .await?;
        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl MetricLogStore for SqliteMetricLogStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        for &statement in SCHEMA {
            sqlx::query(statement).execute(&mut *conn).await?;
        }
        tracing::info!("Metric log schema initialized");
        Ok(())
    }

    async fn insert(&self, record: &NewMetricRecord) -> Result<i64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_with(&mut conn, record).await
    }

    async fn insert_all(&self, records: &[NewMetricRecord]) -> Result<Vec<i64>, StoreError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        // Dropping an uncommitted transaction rolls it back.
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(Self::insert_with(&mut tx, record).await?);
        }
        tx.commit().await?;

        Ok(ids)
    }

    async fn query_recent(&self, limit: usize) -> Result<Vec<StoredMetricRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<MetricLogRow> = sqlx::query_as(SELECT_RECENT_SQL)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&mut *conn)
            .await?;

        // One unreadable row must not hide the rest of the listing.
        let records: Vec<StoredMetricRecord> = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                match StoredMetricRecord::try_from(row) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(id, error = %e, "Skipping unreadable metric log row");
                        None
                    }
                }
            })
            .collect();

        Ok(records)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM MetricLog")
            .fetch_one(&mut *conn)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
