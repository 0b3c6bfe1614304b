use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use tracing::info;

/// Creates a single `ConnectionManager` that auto-reconnects on failure.
///
/// `ConnectionManager` is cheaply cloneable; every clone shares the same
/// underlying multiplexed TCP connection. The aggregate store and the
/// customer repository both hold clones of it.
pub async fn connect(url: &str) -> Result<ConnectionManager> {
    let client =
        redis::Client::open(url).with_context(|| format!("invalid Redis URL \"{url}\""))?;

    let mut conn = ConnectionManager::new(client)
        .await
        .with_context(|| format!("cannot connect to Redis at {url}"))?;

    let pong: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .context("Redis did not answer PING")?;
    info!(%url, reply = %pong, "connected to Redis");

    Ok(conn)
}
