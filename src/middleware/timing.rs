use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::AppState;

pub const HTTP_TIMER: &str = "http.server.requests";

/// Adds two response headers:
///
///   X-Response-Time-Us   total handler wall time in microseconds
///   Server-Timing        same value in the standard Server-Timing format
///
/// and records every request on the live registry as `http.server.requests`,
/// tagged by method, route template and status.
pub async fn timing_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    // Route template keeps the tag set bounded; unmatched requests share one bucket.
    let uri = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "UNKNOWN".to_owned());

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();
    let us = elapsed.as_micros();

    // ── Inject response headers ─────────────────────────────────
    if let Ok(val) = us.to_string().parse() {
        response.headers_mut().insert("X-Response-Time-Us", val);
    }

    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    // ── Live registry ───────────────────────────────────────────
    let status = response.status().as_u16().to_string();
    state.registry.record_timer(
        HTTP_TIMER,
        &[
            ("method", method.as_str()),
            ("uri", uri.as_str()),
            ("status", status.as_str()),
        ],
        elapsed,
    );

    debug!(%method, %uri, %status, us = us as u64, "request");

    response
}
