use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use redis_op_metrics::{config::AppConfig, server, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Logging ───────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // ── 2. Configuration ─────────────────────────────────────────
    let config = AppConfig::load().context("loading configuration")?;
    let bind_addr = config.server.bind_addr.clone();
    info!(
        application = %config.application,
        store = ?config.store,
        "starting metrics service"
    );

    // ── 3. Build shared state (connects to Redis if configured) ──
    let state = Arc::new(AppState::from_config(config).await?);

    // ── 4. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}; is it already in use?"))?;

    info!(addr = %bind_addr, "listening");
    info!("metrics JSON → http://{bind_addr}/api/metrics/getAllMetrics");
    info!("export       → http://{bind_addr}/api/metrics/export/json");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}
