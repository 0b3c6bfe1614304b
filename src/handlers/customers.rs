use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use crate::customers::Customer;
use crate::AppState;

use super::{AppError, RequestTiming, TimedResponse};

#[derive(Debug, Deserialize)]
pub struct CustomerRequest {
    pub name: String,
    pub email: String,
}

impl CustomerRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("name must not be empty".into()));
        }
        if !self.email.contains('@') {
            return Err(AppError::BadRequest(format!(
                "invalid email \"{}\"",
                self.email
            )));
        }
        Ok(())
    }
}

fn timed(data: Customer, t0: Instant, service_us: u64) -> Json<TimedResponse<Customer>> {
    Json(TimedResponse {
        data,
        timing: RequestTiming::new(t0.elapsed().as_micros() as u64, service_us),
    })
}

// ─── POST /api/customers ─────────────────────────────────────────

pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CustomerRequest>,
) -> Result<(StatusCode, Json<TimedResponse<Customer>>), AppError> {
    let t0 = Instant::now();
    req.validate()?;

    let t_svc = Instant::now();
    let customer = state.customers.insert(&req.name, &req.email).await?;
    let service_us = t_svc.elapsed().as_micros() as u64;

    Ok((StatusCode::CREATED, timed(customer, t0, service_us)))
}

// ─── GET /api/customers/:id ──────────────────────────────────────

pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<TimedResponse<Customer>>, AppError> {
    let t0 = Instant::now();
    let Path(id) = id?;

    let t_svc = Instant::now();
    let customer = state.customers.find(id).await?;
    let service_us = t_svc.elapsed().as_micros() as u64;

    Ok(timed(customer, t0, service_us))
}

// ─── PUT /api/customers/:id ──────────────────────────────────────

pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
    Json(req): Json<CustomerRequest>,
) -> Result<Json<TimedResponse<Customer>>, AppError> {
    let t0 = Instant::now();
    let Path(id) = id?;
    req.validate()?;

    let t_svc = Instant::now();
    let customer = state.customers.update(id, &req.name, &req.email).await?;
    let service_us = t_svc.elapsed().as_micros() as u64;

    Ok(timed(customer, t0, service_us))
}

// ─── DELETE /api/customers/:id ───────────────────────────────────

pub async fn delete_customer(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    state.customers.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
