use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::warn;

use crate::metrics::aggregate::NAMESPACE;
use crate::metrics::export::{
    aggregate_meters, csv_filename, custom_metrics, export_timestamp, suggested_filename,
    system_metrics, to_csv, JsonExport,
};
use crate::AppState;

use super::AppError;

#[derive(Debug, Deserialize)]
pub struct CrudExportParams {
    #[serde(default = "default_entity")]
    pub entity: String,
}

fn default_entity() -> String {
    "all".into()
}

#[derive(Debug, Deserialize)]
pub struct SaveParams {
    pub format: String,
    #[serde(default)]
    pub filename: String,
}

// ─── GET /api/metrics/export/json ────────────────────────────────

pub async fn export_json(State(state): State<Arc<AppState>>) -> Json<JsonExport> {
    let timestamp = export_timestamp(&chrono::Local::now());

    let custom = match state.store.raw_entries(&format!("{NAMESPACE}:")).await {
        Ok(raw) => custom_metrics(raw),
        Err(e) => {
            warn!(error = %e, "json export without stored metrics");
            let mut m = Map::new();
            m.insert(
                "error".into(),
                Value::String(format!("Failed to retrieve stored metrics: {e}")),
            );
            m
        }
    };

    Json(JsonExport {
        timestamp,
        application: state.config.application.clone(),
        custom_metrics: custom,
        system_metrics: system_metrics(&state.registry.snapshot()),
    })
}

// ─── GET /api/metrics/export/csv ─────────────────────────────────

pub async fn export_csv(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = chrono::Local::now();

    let mut meters = state.registry.snapshot();
    match state.store.list_all().await {
        Ok(all) => meters.extend(aggregate_meters(all.values())),
        Err(e) => warn!(error = %e, "csv export without stored aggregates"),
    }

    let csv = to_csv(&export_timestamp(&now), &meters);
    let disposition = format!("attachment; filename={}", csv_filename(&now));

    (
        [
            (header::CONTENT_TYPE, "text/csv".to_owned()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
}

// ─── GET /api/metrics/export/redis ───────────────────────────────

pub async fn export_redis(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(dump_prefix(&state, &format!("{NAMESPACE}:"), None).await)
}

// ─── GET /api/metrics/export/crud ────────────────────────────────

/// `entity=all` dumps the whole namespace; otherwise every key starting
/// with `metrics:{entity}`.
pub async fn export_crud(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CrudExportParams>,
) -> Json<Value> {
    let prefix = if params.entity == "all" {
        format!("{NAMESPACE}:")
    } else {
        format!("{NAMESPACE}:{}", params.entity)
    };
    Json(dump_prefix(&state, &prefix, Some(&params.entity)).await)
}

async fn dump_prefix(state: &AppState, prefix: &str, entity: Option<&str>) -> Value {
    let timestamp = export_timestamp(&chrono::Local::now());

    let mut body = match state.store.raw_entries(prefix).await {
        Ok(raw) => {
            let total = raw.len();
            json!({
                "timestamp": timestamp,
                "metrics": custom_metrics(raw),
                "totalKeys": total,
            })
        }
        Err(e) => {
            warn!(prefix, error = %e, "metrics dump failed");
            json!({
                "timestamp": timestamp,
                "error": format!("Failed to retrieve stored metrics: {e}"),
            })
        }
    };

    if let (Some(entity), Some(obj)) = (entity, body.as_object_mut()) {
        obj.insert("entity".into(), Value::String(entity.to_owned()));
    }
    body
}

// ─── POST /api/metrics/export/save ───────────────────────────────

pub async fn export_save(Query(params): Query<SaveParams>) -> Result<Json<Value>, AppError> {
    let format = params.format.trim().to_lowercase();
    if format.is_empty() {
        return Err(AppError::BadRequest("format must not be empty".into()));
    }

    let now = chrono::Local::now();
    Ok(Json(json!({
        "status": "success",
        "message": format!("Use GET /api/metrics/export/{format} to download"),
        "suggestedFilename": suggested_filename(&format, &params.filename, &now),
        "timestamp": now.format("%Y%m%d_%H%M%S").to_string(),
    })))
}
