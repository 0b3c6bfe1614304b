use axum::{
    middleware as axum_mw,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers::{cards, customers, export, metrics};
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Customer endpoints ──────────────────────────────────
        .route("/api/customers", post(customers::create_customer))
        .route(
            "/api/customers/:id",
            get(customers::get_customer)
                .put(customers::update_customer)
                .delete(customers::delete_customer),
        )
        // ── Card workload ───────────────────────────────────────
        .route("/api/cards/create", post(cards::create_card))
        .route("/api/cards/update/:card_number", put(cards::update_card))
        .route("/api/cards/delete/:card_number", delete(cards::delete_card))
        .route("/api/cards/validate/:card_number", get(cards::validate_card))
        .route("/api/cards/test-batch", post(cards::test_batch))
        // ── Metrics collection & queries ────────────────────────
        .route("/api/metrics/collect", post(metrics::collect))
        .route("/api/metrics/collect/batch", post(metrics::collect_batch))
        .route("/api/metrics/types", get(metrics::card_types))
        .route("/api/metrics/operations", get(metrics::operation_types))
        .route("/api/metrics/health", get(metrics::health))
        .route("/api/metrics/getAllMetrics", get(metrics::list_all))
        // ── Export ──────────────────────────────────────────────
        .route("/api/metrics/export/json", get(export::export_json))
        .route("/api/metrics/export/csv", get(export::export_csv))
        .route("/api/metrics/export/redis", get(export::export_redis))
        .route("/api/metrics/export/crud", get(export::export_crud))
        .route("/api/metrics/export/save", post(export::export_save))
        // ── Per-entity views (static segments above win) ────────
        .route(
            "/api/metrics/:entity",
            get(metrics::get_entity).delete(metrics::delete_entity),
        )
        .route(
            "/api/metrics/:entity/:operation",
            get(metrics::get_aggregate).delete(metrics::delete_aggregate),
        )
        // ── Provide shared state to all routes above ────────────
        .with_state(state.clone())
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(state, timing::timing_middleware))
        .layer(CorsLayer::permissive())
}
