//! Metric record model.
//!
//! Defines the shapes a metric record takes on its way into and out of
//! storage.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Device identifier used when a payload does not name its agent.
pub const UNKNOWN_DEVICE: &str = "unknown";

/// A record that has not been persisted yet.
///
/// `data` holds the category payload already encoded as JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMetricRecord {
    /// Identifier of the reporting agent.
    pub device_id: String,
    /// Category label (e.g. "system", "weather").
    pub metric_type: String,
    /// Server-assigned creation time.
    pub timestamp: DateTime<Utc>,
    /// JSON-encoded category payload.
    pub data: String,
}

impl NewMetricRecord {
    /// Creates a new record from a category payload, encoding it as JSON text.
    ///
    /// # Example
    ///
    /// ```
    /// use shared::models::NewMetricRecord;
    /// use shared::chrono::Utc;
    /// use shared::serde_json::json;
    ///
    /// let record = NewMetricRecord::from_value("pc01", "system", Utc::now(), &json!({"ram": 50}));
    /// assert_eq!(record.data, r#"{"ram":50}"#);
    /// ```
    #[must_use]
    pub fn from_value(
        device_id: impl Into<String>,
        metric_type: impl Into<String>,
        timestamp: DateTime<Utc>,
        data: &Value,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            metric_type: metric_type.into(),
            timestamp,
            data: data.to_string(),
        }
    }
}

/// A record exactly as it sits in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMetricRecord {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Identifier of the reporting agent.
    pub device_id: String,
    /// Category label.
    pub metric_type: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Stored payload text, normally JSON.
    pub data: String,
}

/// A metric record as returned to clients.
///
/// `data` is the decoded payload, or the raw stored text when that text is
/// not valid JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Identifier of the reporting agent.
    pub device_id: String,
    /// Category label.
    pub metric_type: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Category payload.
    pub data: Value,
}

impl From<StoredMetricRecord> for MetricRecord {
    fn from(stored: StoredMetricRecord) -> Self {
        Self {
            id: stored.id,
            device_id: stored.device_id,
            metric_type: stored.metric_type,
            timestamp: stored.timestamp,
            data: decode_data(stored.data),
        }
    }
}

/// Decodes a stored payload, falling back to the raw text if it is not JSON.
#[must_use]
pub fn decode_data(raw: String) -> Value {
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(_) => Value::String(raw),
    }
}

/// Formats a timestamp the way it is written to storage.
///
/// The output is fixed width (microseconds, `Z` suffix) so that text order
/// matches chronological order.
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Offset-less layouts found in older databases, read as UTC.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a stored timestamp.
///
/// Accepts RFC 3339 text as well as offset-less ISO-8601 text with either a
/// `T` or a space between date and time, which is interpreted as UTC.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(text, format)
            .ok()
            .map(|naive| naive.and_utc())
    })
}
