//! Data models for Pulsebox.
//!
//! A metric record is one category's payload from one ingestion event.

pub mod record;

pub use record::{
    decode_data, format_timestamp, parse_timestamp, MetricRecord, NewMetricRecord,
    StoredMetricRecord, UNKNOWN_DEVICE,
};
