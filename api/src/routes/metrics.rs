//! Metrics ingestion and log query endpoints.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::ingest::{IngestError, IngestRequest};
use shared::models::MetricRecord;
use shared::query::{recent_logs, RECENT_LOGS_LIMIT};

/// Response for a successful ingestion.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Always "success".
    pub status: String,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Creates the metrics routes.
pub fn metrics_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/metrics", post(ingest_metrics))
        .route("/api/metrics/logs", get(metric_logs))
        .with_state(state)
}

/// Handler for agent payloads.
///
/// The body is parsed as JSON whatever its content type. Returns 200 once
/// every recognized category has been stored, 400 for unusable payloads.
async fn ingest_metrics(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    let request = IngestRequest::from_slice(&body).map_err(ingest_error)?;
    state
        .ingestor()
        .ingest(&request)
        .await
        .map_err(ingest_error)?;

    Ok(Json(IngestResponse {
        status: "success".to_string(),
    }))
}

fn ingest_error(err: IngestError) -> ApiError {
    if err.is_client_error() {
        tracing::debug!(error = %err, "Rejected metric payload");
        return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(err.to_string())));
    }

    tracing::error!(error = %err, "Failed to store metrics");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Failed to store metrics")),
    )
}

/// Handler returning the most recent records, newest first.
async fn metric_logs(State(state): State<AppState>) -> Result<Json<Vec<MetricRecord>>, ApiError> {
    let logs = recent_logs(state.store(), RECENT_LOGS_LIMIT)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load metric logs");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to load metric logs")),
            )
        })?;

    Ok(Json(logs))
}
