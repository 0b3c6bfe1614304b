use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Process configuration.
///
/// Read from an optional TOML file (`config/default.toml`, or the path in
/// `APP_CONFIG`) and then from `APP__*` environment variables, e.g.
/// `APP__REDIS__URL=redis://cache:6379/` or `APP__STORE=memory`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub redis: RedisConfig,

    /// Where aggregates and customers live
    #[serde(default)]
    pub store: StoreBackend,

    /// Reported as `application` in the JSON export
    #[serde(default = "default_application")]
    pub application: String,

    #[serde(default)]
    pub cards: CardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    /// Process-local maps; nothing survives a restart
    Memory,
}

/// Knobs for the simulated card workload.
#[derive(Debug, Clone, Deserialize)]
pub struct CardConfig {
    /// Probability (0–1) that a delete fails
    #[serde(default = "default_delete_failure_rate")]
    pub delete_failure_rate: f64,

    /// Sleep inside card operations to mimic real work
    #[serde(default = "default_simulate_latency")]
    pub simulate_latency: bool,

    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".into()
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/".into()
}
fn default_application() -> String {
    "metrics-with-redis".into()
}
fn default_delete_failure_rate() -> f64 {
    0.2
}
fn default_simulate_latency() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            delete_failure_rate: default_delete_failure_rate(),
            simulate_latency: default_simulate_latency(),
            seed: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            redis: RedisConfig::default(),
            store: StoreBackend::default(),
            application: default_application(),
            cards: CardConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/default".into());

        let cfg = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("read configuration (file: {path})"))?;

        let config: Self = cfg.try_deserialize().context("deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let rate = self.cards.delete_failure_rate;
        if !(0.0..=1.0).contains(&rate) {
            bail!("cards.delete_failure_rate must be between 0 and 1, got {rate}");
        }
        if self.application.trim().is_empty() {
            bail!("application name must not be empty");
        }
        Ok(())
    }
}
