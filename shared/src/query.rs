//! Reading back recent metric records.

use crate::models::MetricRecord;
use crate::storage::{MetricLogStore, StoreError};

/// Number of records the log endpoint returns.
pub const RECENT_LOGS_LIMIT: usize = 100;

/// Returns up to `limit` records, newest first, with payloads decoded.
///
/// Payloads that are not valid JSON come back as their raw text.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn recent_logs(
    store: &dyn MetricLogStore,
    limit: usize,
) -> Result<Vec<MetricRecord>, StoreError> {
    let rows = store.query_recent(limit).await?;
    Ok(rows.into_iter().map(MetricRecord::from).collect())
}
