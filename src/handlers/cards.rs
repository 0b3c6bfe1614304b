use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::workload::{self, BatchReport};
use crate::AppState;

use super::{validate_label, AppError};

/// Upper bound on a single test batch.
pub const MAX_BATCH: u32 = 1_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardParams {
    pub card_number: String,
    #[serde(default = "default_card_type")]
    pub card_type: String,
}

fn default_card_type() -> String {
    "STANDARD".into()
}

#[derive(Debug, Deserialize)]
pub struct BatchParams {
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

fn default_count() -> u32 {
    5
}
fn default_concurrency() -> u32 {
    1
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    pub card_number: String,
    pub valid: bool,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

// ─── POST /api/cards/create ──────────────────────────────────────

pub async fn create_card(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CreateCardParams>,
) -> Result<Json<Message>, AppError> {
    validate_label("cardNumber", &params.card_number)?;
    let message = state
        .cards
        .create(&params.card_number, &params.card_type)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(Message { message }))
}

// ─── PUT /api/cards/update/:card_number ──────────────────────────

pub async fn update_card(
    State(state): State<Arc<AppState>>,
    Path(card_number): Path<String>,
    data: String,
) -> Result<Json<Message>, AppError> {
    validate_label("cardNumber", &card_number)?;
    let message = state
        .cards
        .update(&card_number, &data)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(Message { message }))
}

// ─── DELETE /api/cards/delete/:card_number ───────────────────────

pub async fn delete_card(
    State(state): State<Arc<AppState>>,
    Path(card_number): Path<String>,
) -> Result<Json<Message>, AppError> {
    validate_label("cardNumber", &card_number)?;
    state
        .cards
        .delete(&card_number)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(Message {
        message: format!("Card deleted: {card_number}"),
    }))
}

// ─── GET /api/cards/validate/:card_number ────────────────────────

pub async fn validate_card(
    State(state): State<Arc<AppState>>,
    Path(card_number): Path<String>,
) -> Result<Json<Validation>, AppError> {
    validate_label("cardNumber", &card_number)?;
    let valid = state
        .cards
        .validate(&card_number)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(Validation { card_number, valid }))
}

// ─── POST /api/cards/test-batch ──────────────────────────────────

pub async fn test_batch(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BatchParams>,
) -> Result<Json<BatchReport>, AppError> {
    if params.count == 0 || params.count > MAX_BATCH {
        return Err(AppError::BadRequest(format!(
            "count must be between 1 and {MAX_BATCH}"
        )));
    }
    let report = workload::run(state.cards.clone(), params.count, params.concurrency).await;
    Ok(Json(report))
}
