use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::metrics::aggregate::now_millis;
use crate::metrics::legacy::EntityMetrics;
use crate::metrics::{Aggregate, MetricKey, Sample};
use crate::AppState;

use super::{validate_label, AppError};

/// Card types offered to API clients as examples.
pub const CARD_TYPES: [&str; 6] = ["VISA", "MASTERCARD", "AMEX", "DISCOVER", "JCB", "DINERS"];

/// Operation names offered to API clients as examples.
pub const OPERATION_TYPES: [&str; 6] = [
    "PAYMENT",
    "REFUND",
    "AUTHORIZATION",
    "CAPTURE",
    "VOID",
    "SETTLEMENT",
];

/// Longest accepted sample: one day. Keeps stored totals far below the
/// 2^53 range where the Redis merge script's doubles stop being exact.
pub const MAX_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

// ─── Request / response types ────────────────────────────────────

/// One externally measured sample. Accepts the older
/// `typeCarte` / `operationType` / `executionTime` names too.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectRequest {
    #[serde(alias = "typeCarte")]
    pub entity: String,
    #[serde(alias = "operationType")]
    pub operation: String,
    #[serde(alias = "executionTime")]
    pub duration_ms: u64,
}

impl CollectRequest {
    fn validate(&self) -> Result<MetricKey, AppError> {
        validate_label("entity", &self.entity)?;
        validate_label("operation", &self.operation)?;
        if self.duration_ms > MAX_DURATION_MS {
            return Err(AppError::BadRequest(format!(
                "durationMs must be at most {MAX_DURATION_MS} (got {})",
                self.duration_ms
            )));
        }
        Ok(MetricKey::new(self.entity.clone(), self.operation.clone()))
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchCollectRequest {
    pub metrics: Vec<CollectRequest>,
}

#[derive(Debug, Default, Serialize)]
pub struct BatchCollectResponse {
    /// Storage keys that were merged
    pub successes: Vec<String>,
    pub failures: Vec<BatchFailure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub entity: String,
    pub operation: String,
    pub error_message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: Vec<String>,
}

// ─── POST /api/metrics/collect ───────────────────────────────────

pub async fn collect(
    State(state): State<Arc<AppState>>,
    Query(req): Query<CollectRequest>,
) -> Result<Json<Aggregate>, AppError> {
    let key = req.validate()?;
    let sample = Sample::new(key, Duration::from_millis(req.duration_ms), false);
    let agg = state.recorder.record_checked(sample).await?;
    Ok(Json(agg))
}

// ─── POST /api/metrics/collect/batch ─────────────────────────────

/// 200 when every sample landed, 207 when some did, 500 when none did.
pub async fn collect_batch(
    State(state): State<Arc<AppState>>,
    Json(batch): Json<BatchCollectRequest>,
) -> (StatusCode, Json<BatchCollectResponse>) {
    let mut resp = BatchCollectResponse::default();

    for req in batch.metrics {
        let outcome = match req.validate() {
            Ok(key) => state
                .recorder
                .record_checked(Sample::new(key, Duration::from_millis(req.duration_ms), false))
                .await
                .map_err(AppError::from),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(agg) => resp.successes.push(agg.key().storage_key()),
            Err(e) => resp.failures.push(BatchFailure {
                entity: req.entity,
                operation: req.operation,
                error_message: e.to_string(),
            }),
        }
    }

    let status = if resp.failures.is_empty() {
        StatusCode::OK
    } else if resp.successes.is_empty() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::MULTI_STATUS
    };
    (status, Json(resp))
}

// ─── GET /api/metrics/types | /operations | /health ──────────────

pub async fn card_types() -> Json<[&'static str; 6]> {
    Json(CARD_TYPES)
}

pub async fn operation_types() -> Json<[&'static str; 6]> {
    Json(OPERATION_TYPES)
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "UP",
        message: "metrics service operational",
        timestamp: now_millis(),
    })
}

// ─── GET /api/metrics/getAllMetrics ──────────────────────────────

pub async fn list_all(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<String, Aggregate>>, AppError> {
    Ok(Json(state.store.list_all().await?))
}

// ─── GET | DELETE /api/metrics/:entity ───────────────────────────

pub async fn get_entity(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
) -> Result<Json<EntityMetrics>, AppError> {
    validate_label("entity", &entity)?;

    let aggregates = state.store.list_entity(&entity).await?;
    let view = EntityMetrics::from_aggregates(&entity, &aggregates);
    if view.is_empty() {
        return Err(AppError::NotFound(format!("no metrics for '{entity}'")));
    }
    Ok(Json(view))
}

pub async fn delete_entity(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
) -> Result<Json<Deleted>, AppError> {
    validate_label("entity", &entity)?;

    let mut deleted = Vec::new();
    for agg in state.store.list_entity(&entity).await? {
        let key = agg.key();
        if state.store.delete(&key).await? {
            deleted.push(key.storage_key());
        }
    }

    if deleted.is_empty() {
        return Err(AppError::NotFound(format!("no metrics for '{entity}'")));
    }
    info!(%entity, removed = deleted.len(), "deleted entity metrics");
    Ok(Json(Deleted { deleted }))
}

// ─── GET | DELETE /api/metrics/:entity/:operation ────────────────

pub async fn get_aggregate(
    State(state): State<Arc<AppState>>,
    Path((entity, operation)): Path<(String, String)>,
) -> Result<Json<Aggregate>, AppError> {
    let key = checked_key(entity, operation)?;
    state
        .store
        .get(&key)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no metrics under '{key}'")))
}

pub async fn delete_aggregate(
    State(state): State<Arc<AppState>>,
    Path((entity, operation)): Path<(String, String)>,
) -> Result<Json<Deleted>, AppError> {
    let key = checked_key(entity, operation)?;
    if !state.store.delete(&key).await? {
        return Err(AppError::NotFound(format!("no metrics under '{key}'")));
    }
    info!(%key, "deleted aggregate");
    Ok(Json(Deleted {
        deleted: vec![key.storage_key()],
    }))
}

fn checked_key(entity: String, operation: String) -> Result<MetricKey, AppError> {
    validate_label("entity", &entity)?;
    validate_label("operation", &operation)?;
    Ok(MetricKey::new(entity, operation))
}
