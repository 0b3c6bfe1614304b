pub mod cards;
pub mod customers;
pub mod export;
pub mod metrics;

use axum::{
    extract::rejection::PathRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::customers::CustomerError;
use crate::metrics::StoreError;

// ─── Shared response envelope ────────────────────────────────────

/// Customer responses carry timing metadata so callers can see where
/// the request spent its time without parsing headers.
#[derive(Debug, Clone, Serialize)]
pub struct TimedResponse<T: Serialize> {
    pub data: T,
    pub timing: RequestTiming,
}

/// Microsecond-precision breakdown of where wall-clock time was spent.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RequestTiming {
    /// Total handler wall time (μs)
    pub total_us: u64,
    /// Time spent inside the instrumented service call (μs)
    pub service_us: u64,
    /// Extraction / serialization / routing overhead (μs)
    pub overhead_us: u64,
}

impl RequestTiming {
    pub fn new(total_us: u64, service_us: u64) -> Self {
        Self {
            total_us,
            service_us,
            overhead_us: total_us.saturating_sub(service_us),
        }
    }
}

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl From<CustomerError> for AppError {
    fn from(e: CustomerError) -> Self {
        match e {
            CustomerError::NotFound(_) => Self::NotFound(e.to_string()),
            CustomerError::Redis(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self {
        Self::BadRequest(e.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error":  self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

// ─── Input validation ────────────────────────────────────────────

/// Entity and operation labels become part of a `metrics:{e}:{o}` key,
/// so they must be non-empty and free of the `:` separator.
pub fn validate_label(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} must not be empty")));
    }
    if value.contains(':') {
        return Err(AppError::BadRequest(format!(
            "{field} must not contain ':' (got \"{value}\")"
        )));
    }
    Ok(())
}
