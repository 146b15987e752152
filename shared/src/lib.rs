//! Pulsebox Shared Library
//!
//! This crate contains the types and building blocks shared by the Pulsebox
//! API server and CLI.
//!
//! # Modules
//!
//! - [`models`] - Metric record types
//! - [`storage`] - Storage trait and the `SQLite` implementation
//! - [`ingest`] - Payload validation and decomposition into records
//! - [`query`] - Reading back the most recent records
//!
//! # Example
//!
//! ```
//! use shared::ingest::IngestRequest;
//!
//! let request = IngestRequest::from_slice(
//!     br#"{"device_id": "pc01", "metrics": {"system": {"ram": 50}}}"#,
//! )
//! .unwrap();
//!
//! assert_eq!(request.device_id, "pc01");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ingest;
pub mod models;
pub mod query;
pub mod storage;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use sqlx;
