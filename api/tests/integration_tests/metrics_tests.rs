//! Integration tests for metric ingestion and log retrieval.
//!
//! Tests cover:
//! - Decomposition of payloads into one record per recognized category
//! - Rejection of missing or unusable bodies
//! - Ordering and size of the recent-log listing
//! - Storage failures and undecodable stored payloads

use api::{create_router, AppState};
use axum::http::StatusCode;
use serde_json::{json, Value};
use shared::chrono::{Duration, TimeZone, Utc};
use shared::ingest::CategorySet;
use shared::models::NewMetricRecord;
use shared::storage::{MetricLogStore, SqliteMetricLogStore};
use std::sync::Arc;

use super::common::{failing_app, get, post_json, post_raw, test_app};

#[tokio::test]
async fn test_ingest_single_system_metric() {
    let (app, state) = test_app().await;

    let payload = json!({"device_id": "pc01", "metrics": {"system": {"ram": 50}}});
    let (status, response) = post_json(app.clone(), "/api/metrics", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!({"status": "success"}));
    assert_eq!(state.store().count().await.unwrap(), 1);

    let (status, logs) = get(app, "/api/metrics/logs").await;
    assert_eq!(status, StatusCode::OK);

    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["device_id"], "pc01");
    assert_eq!(logs[0]["metric_type"], "system");
    assert_eq!(logs[0]["data"], json!({"ram": 50}));
    assert!(logs[0]["id"].is_i64());
    assert!(logs[0]["timestamp"].is_string());
}

#[tokio::test]
async fn test_ingest_both_categories_share_timestamp() {
    let (app, state) = test_app().await;

    let payload = json!({
        "device_id": "my_pc_01",
        "metrics": {
            "system": {"processes": 123, "ram_usage": 45.6},
            "weather": {"temperature": 15, "condition": "Cloudy"}
        }
    });
    let (status, _) = post_json(app.clone(), "/api/metrics", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.store().count().await.unwrap(), 2);

    let (_, logs) = get(app, "/api/metrics/logs").await;
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["timestamp"], logs[1]["timestamp"]);

    // Same timestamp, so the later insert (weather) comes first.
    assert_eq!(logs[0]["metric_type"], "weather");
    assert_eq!(logs[1]["metric_type"], "system");
    assert!(logs[0]["id"].as_i64().unwrap() > logs[1]["id"].as_i64().unwrap());
}

#[tokio::test]
async fn test_unrecognized_category_is_ignored() {
    let (app, state) = test_app().await;

    let payload = json!({"device_id": "pc01", "metrics": {"foo": {"bar": 1}}});
    let (status, response) = post_json(app, "/api/metrics", payload).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "success");
    assert_eq!(state.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_payload_without_metrics_stores_nothing() {
    let (app, state) = test_app().await;

    let (status, _) = post_json(app, "/api/metrics", json!({"device_id": "pc01"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_device_id_defaults_to_unknown() {
    let (app, _state) = test_app().await;

    let payload = json!({"metrics": {"weather": {"temperature": 15}}});
    post_json(app.clone(), "/api/metrics", payload).await;

    let (_, logs) = get(app, "/api/metrics/logs").await;
    assert_eq!(logs[0]["device_id"], "unknown");
}

#[tokio::test]
async fn test_missing_or_unusable_body_is_rejected() {
    let (app, state) = test_app().await;

    for body in ["", "   ", "not json", "[1, 2, 3]", "{}", "null"] {
        let (status, response) = post_raw(app.clone(), "/api/metrics", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(response, json!({"error": "No data provided"}));
    }

    assert_eq!(state.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_mistyped_device_id_is_rejected() {
    let (app, state) = test_app().await;

    let payload = json!({"device_id": 42, "metrics": {"system": {"ram": 50}}});
    let (status, response) = post_json(app, "/api/metrics", payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "device_id must be a string");
    assert_eq!(state.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_payloads_round_trip() {
    let (app, _state) = test_app().await;

    let payloads = [
        json!({"cpu": [12.5, 40.0], "disks": {"c": "ok"}}),
        json!([1, "two", null, true]),
        json!(17),
        json!("Cloudy"),
    ];
    for payload in &payloads {
        let body = json!({"device_id": "pc01", "metrics": {"system": payload}});
        let (status, _) = post_json(app.clone(), "/api/metrics", body).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, logs) = get(app, "/api/metrics/logs").await;
    let read_back: Vec<Value> = logs
        .as_array()
        .unwrap()
        .iter()
        .rev()
        .map(|log| log["data"].clone())
        .collect();
    assert_eq!(read_back, payloads.to_vec());
}

#[tokio::test]
async fn test_logs_are_newest_first() {
    let (app, state) = test_app().await;
    let t1 = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
    let t2 = t1 + Duration::minutes(1);
    let t3 = t2 + Duration::minutes(1);

    for (ts, label) in [(t2, "t2"), (t1, "t1"), (t3, "t3")] {
        state
            .store()
            .insert(&NewMetricRecord::from_value("pc01", "system", ts, &json!(label)))
            .await
            .unwrap();
    }

    let (status, logs) = get(app, "/api/metrics/logs").await;
    assert_eq!(status, StatusCode::OK);

    let order: Vec<&str> = logs
        .as_array()
        .unwrap()
        .iter()
        .map(|log| log["data"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["t3", "t2", "t1"]);
}

#[tokio::test]
async fn test_logs_return_at_most_100_most_recent() {
    let (app, state) = test_app().await;
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

    let records: Vec<NewMetricRecord> = (0..150)
        .map(|i| {
            NewMetricRecord::from_value("pc01", "system", start + Duration::seconds(i), &json!(i))
        })
        .collect();
    state.store().insert_all(&records).await.unwrap();

    let (status, logs) = get(app, "/api/metrics/logs").await;
    assert_eq!(status, StatusCode::OK);

    let values: Vec<i64> = logs
        .as_array()
        .unwrap()
        .iter()
        .map(|log| log["data"].as_i64().unwrap())
        .collect();
    assert_eq!(values.len(), 100);
    assert_eq!(values, (50..150).rev().collect::<Vec<_>>());
}

#[tokio::test]
async fn test_logs_empty_store() {
    let (app, _state) = test_app().await;

    let (status, logs) = get(app, "/api/metrics/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs, json!([]));
}

#[tokio::test]
async fn test_invalid_stored_json_is_returned_raw() {
    let (app, state) = test_app().await;
    state
        .store()
        .insert(&NewMetricRecord {
            device_id: "pc01".to_string(),
            metric_type: "system".to_string(),
            timestamp: Utc::now(),
            data: "ram=50".to_string(),
        })
        .await
        .unwrap();

    let (status, logs) = get(app, "/api/metrics/logs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs[0]["data"], "ram=50");
}

#[tokio::test]
async fn test_storage_failure_on_ingest() {
    let payload = json!({"device_id": "pc01", "metrics": {"system": {"ram": 50}}});
    let (status, response) = post_json(failing_app(), "/api/metrics", payload).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response["error"], "Failed to store metrics");
}

#[tokio::test]
async fn test_validation_precedes_storage() {
    let (status, response) = post_raw(failing_app(), "/api/metrics", "").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "No data provided");
}

#[tokio::test]
async fn test_storage_failure_on_logs() {
    let (status, response) = get(failing_app(), "/api/metrics/logs").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response["error"], "Failed to load metric logs");
}

#[tokio::test]
async fn test_configured_categories() {
    let store = Arc::new(SqliteMetricLogStore::in_memory().await.unwrap());
    store.initialize().await.unwrap();
    let app = create_router(AppState::new(store.clone(), CategorySet::parse("system,disk")));

    let payload = json!({
        "metrics": {"system": {"ram": 50}, "weather": {"temp": 15}, "disk": {"free_gb": 80}}
    });
    let (status, _) = post_json(app, "/api/metrics", payload).await;

    assert_eq!(status, StatusCode::OK);
    let stored = store.query_recent(10).await.unwrap();
    let types: Vec<&str> = stored.iter().map(|r| r.metric_type.as_str()).collect();
    assert_eq!(types, vec!["disk", "system"]);
}

#[tokio::test]
async fn test_records_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("metrics.db").display());

    let store = SqliteMetricLogStore::open_shared(&url, 2).await.unwrap();
    let app = create_router(AppState::new(store.clone(), CategorySet::default()));
    let payload = json!({"device_id": "pc01", "metrics": {"weather": {"temp": 15}}});
    let (status, _) = post_json(app, "/api/metrics", payload).await;
    assert_eq!(status, StatusCode::OK);
    store.close().await;

    let reopened = SqliteMetricLogStore::open_shared(&url, 2).await.unwrap();
    let app = create_router(AppState::new(reopened, CategorySet::default()));
    let (_, logs) = get(app, "/api/metrics/logs").await;
    assert_eq!(logs.as_array().unwrap().len(), 1);
    assert_eq!(logs[0]["data"]["temp"], 15);
}

#[tokio::test]
async fn test_logs_tolerate_legacy_and_unreadable_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("metrics.db").display());
    let store = SqliteMetricLogStore::open_shared(&url, 2).await.unwrap();

    let pool = shared::sqlx::SqlitePool::connect(&url).await.unwrap();
    shared::sqlx::query(
        "INSERT INTO MetricLog (device_id, metric_type, timestamp, data) VALUES \
         ('pc01', 'system', '2024-01-01 12:00:00.123456', '{\"ram\": 50}'), \
         ('pc01', 'weather', NULL, '{}')",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let app = create_router(AppState::new(store, CategorySet::default()));
    let (status, logs) = get(app, "/api/metrics/logs").await;

    assert_eq!(status, StatusCode::OK);
    let logs = logs.as_array().unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["metric_type"], "system");
    assert_eq!(logs[0]["data"]["ram"], 50);
    assert!(logs[0]["timestamp"]
        .as_str()
        .unwrap()
        .starts_with("2024-01-01T12:00:00.123456"));
}
