use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use redis_op_metrics::config::{AppConfig, CardConfig};
use redis_op_metrics::metrics::MetricKey;
use redis_op_metrics::{server, AppState};

fn state(delete_failure_rate: f64) -> Arc<AppState> {
    let config = AppConfig {
        cards: CardConfig {
            delete_failure_rate,
            simulate_latency: false,
            seed: Some(42),
        },
        ..AppConfig::default()
    };
    Arc::new(AppState::in_memory(config))
}

fn app(state: &Arc<AppState>) -> Router {
    server::create_router(state.clone())
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, bytes) = send_raw(app, method, uri, body).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn send_raw(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, bytes.to_vec())
}

// ─── Collection & queries ────────────────────────────────────────

#[tokio::test]
async fn collect_merges_samples_into_one_aggregate() {
    let state = state(0.0);

    for d in [100, 200, 125] {
        let uri = format!("/api/metrics/collect?entity=VISA&operation=PAYMENT&durationMs={d}");
        let (status, _) = send(app(&state), Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, agg) = send(app(&state), Method::GET, "/api/metrics/VISA/PAYMENT", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agg["count"], 3);
    assert_eq!(agg["totalTimeMs"], 425);
    assert_eq!(agg["minTimeMs"], 100);
    assert_eq!(agg["maxTimeMs"], 200);
    assert!((agg["averageTimeMs"].as_f64().unwrap() - 141.666).abs() < 0.01);
}

#[tokio::test]
async fn collect_accepts_legacy_parameter_names() {
    let state = state(0.0);
    let uri = "/api/metrics/collect?typeCarte=AMEX&operationType=REFUND&executionTime=40";

    let (status, agg) = send(app(&state), Method::POST, uri, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(agg["entity"], "AMEX");
    assert_eq!(agg["operation"], "REFUND");
    assert_eq!(agg["count"], 1);
}

#[tokio::test]
async fn collect_rejects_labels_with_separator() {
    let state = state(0.0);
    let uri = "/api/metrics/collect?entity=a%3Ab&operation=X&durationMs=1";

    let (status, body) = send(app(&state), Method::POST, uri, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn collect_rejects_durations_beyond_one_day() {
    let state = state(0.0);
    let uri = "/api/metrics/collect?entity=VISA&operation=PAYMENT&durationMs=100000000000000";

    let (status, body) = send(app(&state), Method::POST, uri, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    let stored = state.store.get(&MetricKey::new("VISA", "PAYMENT")).await.unwrap();
    assert!(stored.is_none());

    let ok = "/api/metrics/collect?entity=VISA&operation=PAYMENT&durationMs=86400000";
    let (status, _) = send(app(&state), Method::POST, ok, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn batch_with_some_invalid_entries_is_multi_status() {
    let state = state(0.0);
    let body = json!({ "metrics": [
        { "entity": "VISA", "operation": "PAYMENT", "durationMs": 10 },
        { "entity": "", "operation": "PAYMENT", "durationMs": 10 },
    ]});

    let (status, resp) =
        send(app(&state), Method::POST, "/api/metrics/collect/batch", Some(body)).await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(resp["successes"], json!(["metrics:VISA:PAYMENT"]));
    assert_eq!(resp["failures"][0]["errorMessage"], "entity must not be empty");
}

#[tokio::test]
async fn unknown_aggregate_is_404() {
    let state = state(0.0);
    let (status, _) = send(app(&state), Method::GET, "/api/metrics/NOPE/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(app(&state), Method::GET, "/api/metrics/NOPE", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn entity_view_and_delete() {
    let state = state(0.0);
    for op in ["PAYMENT", "REFUND"] {
        let uri = format!("/api/metrics/collect?entity=JCB&operation={op}&durationMs=30");
        send(app(&state), Method::POST, &uri, None).await;
    }

    let (status, view) = send(app(&state), Method::GET, "/api/metrics/JCB", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["entity"], "JCB");
    assert_eq!(view["metrics"].as_array().unwrap().len(), 8);

    let (status, deleted) = send(app(&state), Method::DELETE, "/api/metrics/JCB", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        deleted["deleted"],
        json!(["metrics:JCB:PAYMENT", "metrics:JCB:REFUND"])
    );

    let (status, all) = send(app(&state), Method::GET, "/api/metrics/getAllMetrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all, json!({}));
}

#[tokio::test]
async fn static_routes_are_not_taken_as_entities() {
    let state = state(0.0);

    let (status, types) = send(app(&state), Method::GET, "/api/metrics/types", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(types.as_array().unwrap().len(), 6);

    let (status, health) = send(app(&state), Method::GET, "/api/metrics/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "UP");
}

// ─── Customers ───────────────────────────────────────────────────

#[tokio::test]
async fn customer_crud_is_measured() {
    let state = state(0.0);
    let body = json!({ "name": "Ada", "email": "ada@example.com" });

    let (status, created) = send(app(&state), Method::POST, "/api/customers", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["id"], 1);
    assert!(created["timing"]["total_us"].is_u64());

    let (status, found) = send(app(&state), Method::GET, "/api/customers/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["data"]["email"], "ada@example.com");

    let (status, _) = send(app(&state), Method::DELETE, "/api/customers/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(app(&state), Method::GET, "/api/customers/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let insert = state.store.get(&MetricKey::new("Customer", "INSERT")).await.unwrap();
    assert_eq!(insert.unwrap().count, 1);
    let missed = state.store.get(&MetricKey::new("Customer", "FIND_ERROR")).await.unwrap();
    assert_eq!(missed.unwrap().count, 1);
}

#[tokio::test]
async fn malformed_customer_id_is_a_json_400() {
    let state = state(0.0);

    for method in [Method::GET, Method::DELETE] {
        let (status, body) = send(app(&state), method, "/api/customers/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
        assert!(body["error"].is_string());
    }
}

// ─── Cards ───────────────────────────────────────────────────────

#[tokio::test]
async fn card_numbers_are_validated_on_every_route() {
    let state = state(0.0);

    let (status, _) = send(app(&state), Method::GET, "/api/cards/validate/C%3A1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(app(&state), Method::DELETE, "/api/cards/delete/C%3A1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(app(&state), Method::PUT, "/api/cards/update/C%3A1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let all = state.store.list_all().await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn card_delete_failure_is_500_and_recorded() {
    let state = state(1.0);

    let (status, body) =
        send(app(&state), Method::DELETE, "/api/cards/delete/CARD-9", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "failed to delete card CARD-9");
    let failed = state
        .store
        .get(&MetricKey::new("MASTER_CARD", "Delete_ERROR"))
        .await
        .unwrap();
    assert_eq!(failed.unwrap().count, 1);
}

#[tokio::test]
async fn card_create_defaults_card_type() {
    let state = state(0.0);
    let (status, body) =
        send(app(&state), Method::POST, "/api/cards/create?cardNumber=C1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Card created: C1");
}

#[tokio::test]
async fn test_batch_reports_every_card() {
    let state = state(0.0);

    let (status, report) = send(
        app(&state),
        Method::POST,
        "/api/cards/test-batch?count=4&concurrency=2",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["requested"], 4);
    assert_eq!(report["cards"].as_array().unwrap().len(), 4);
    assert_eq!(report["delete_failures"], 0);

    let (_, all) = send(app(&state), Method::GET, "/api/metrics/getAllMetrics", None).await;
    assert_eq!(all["metrics:CardService:Create"]["count"], 4);
    assert_eq!(all["metrics:VISA_CARD:Update"]["count"], 4);
}

#[tokio::test]
async fn test_batch_rejects_zero_count() {
    let state = state(0.0);
    let (status, _) =
        send(app(&state), Method::POST, "/api/cards/test-batch?count=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─── Export ──────────────────────────────────────────────────────

#[tokio::test]
async fn json_export_has_stored_and_live_metrics() {
    let state = state(0.0);
    send(
        app(&state),
        Method::POST,
        "/api/metrics/collect?entity=VISA&operation=PAYMENT&durationMs=12",
        None,
    )
    .await;

    let (status, export) = send(app(&state), Method::GET, "/api/metrics/export/json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["application"], "metrics-with-redis");
    assert_eq!(export["customMetrics"]["metrics:VISA:PAYMENT"]["count"], 1);
    // the collect request above went through the timing middleware
    let system = export["systemMetrics"].as_object().unwrap();
    assert!(system.keys().any(|k| k.starts_with("http.server.requests{")));
}

#[tokio::test]
async fn csv_export_is_an_attachment_with_aggregate_rows() {
    let state = state(0.0);
    send(
        app(&state),
        Method::POST,
        "/api/metrics/collect?entity=VISA&operation=PAYMENT&durationMs=12",
        None,
    )
    .await;

    let (status, headers, body) =
        send_raw(app(&state), Method::GET, "/api/metrics/export/csv", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv");
    let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment; filename=metrics_"));
    assert!(disposition.ends_with(".csv"));

    let csv = String::from_utf8(body).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("timestamp,metric_name,metric_type,tag_key,tag_value,statistic,value")
    );
    assert!(csv.contains(",metrics.aggregate,AGGREGATE,entity,VISA,COUNT,"));
}

#[tokio::test]
async fn crud_export_filters_by_entity() {
    let state = state(0.0);
    for entity in ["VISA", "AMEX"] {
        let uri = format!("/api/metrics/collect?entity={entity}&operation=PAYMENT&durationMs=5");
        send(app(&state), Method::POST, &uri, None).await;
    }

    let (_, visa) = send(app(&state), Method::GET, "/api/metrics/export/crud?entity=VISA", None).await;
    assert_eq!(visa["entity"], "VISA");
    assert_eq!(visa["totalKeys"], 1);
    assert!(visa["metrics"]["metrics:VISA:PAYMENT"].is_object());

    let (_, all) = send(app(&state), Method::GET, "/api/metrics/export/crud", None).await;
    assert_eq!(all["entity"], "all");
    assert_eq!(all["totalKeys"], 2);

    let (_, redis) = send(app(&state), Method::GET, "/api/metrics/export/redis", None).await;
    assert_eq!(redis["totalKeys"], 2);
}

#[tokio::test]
async fn save_suggests_a_filename() {
    let state = state(0.0);

    let (status, body) = send(
        app(&state),
        Method::POST,
        "/api/metrics/export/save?format=CSV",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let name = body["suggestedFilename"].as_str().unwrap();
    assert!(name.starts_with("metrics_export_") && name.ends_with(".csv"));

    let (status, _) = send(
        app(&state),
        Method::POST,
        "/api/metrics/export/save?format=",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn responses_carry_timing_headers() {
    let state = state(0.0);
    let (_, headers, _) =
        send_raw(app(&state), Method::GET, "/api/metrics/health", None).await;
    assert!(headers.contains_key("x-response-time-us"));
    let server_timing = headers["server-timing"].to_str().unwrap();
    assert!(server_timing.starts_with("total;dur="));
}
