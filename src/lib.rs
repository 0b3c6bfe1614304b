use std::sync::Arc;

use anyhow::Result;
use tracing::info;

pub mod cards;
pub mod config;
pub mod customers;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod redis_client;
pub mod server;
pub mod workload;

use cards::CardService;
use config::{AppConfig, StoreBackend};
use customers::{
    CustomerRepository, CustomerService, MemoryCustomerRepository, RedisCustomerRepository,
};
use metrics::{AggregateStore, MemoryStore, MeterRegistry, RedisStore, SampleRecorder};

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    pub config: AppConfig,

    /// Durable aggregates, read directly by the query and export endpoints.
    pub store: Arc<dyn AggregateStore>,

    /// Live counters/timers; lives as long as the process.
    pub registry: Arc<MeterRegistry>,

    /// Shared by every instrumented service.
    pub recorder: SampleRecorder,

    pub customers: CustomerService,

    pub cards: Arc<CardService>,
}

impl AppState {
    /// Wire the services around an already-built store and customer repository.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn AggregateStore>,
        customer_repo: Arc<dyn CustomerRepository>,
    ) -> Self {
        let registry = Arc::new(MeterRegistry::new());
        let recorder = SampleRecorder::new(store.clone(), registry.clone());
        let customers = CustomerService::new(customer_repo, recorder.clone());
        let cards = Arc::new(CardService::new(recorder.clone(), &config.cards));

        Self {
            config,
            store,
            registry,
            recorder,
            customers,
            cards,
        }
    }

    /// Everything in process memory; used by tests and `store = "memory"`.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCustomerRepository::new()),
        )
    }

    /// Build the state for the configured backend, connecting to Redis if needed.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        match config.store {
            StoreBackend::Memory => {
                info!("using in-memory store; metrics will not survive a restart");
                Ok(Self::in_memory(config))
            }
            StoreBackend::Redis => {
                let conn = redis_client::connect(&config.redis.url).await?;
                Ok(Self::new(
                    config,
                    Arc::new(RedisStore::new(conn.clone())),
                    Arc::new(RedisCustomerRepository::new(conn)),
                ))
            }
        }
    }
}
