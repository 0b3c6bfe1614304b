pub mod aggregate;
pub mod export;
pub mod instrument;
pub mod legacy;
pub mod memory_store;
pub mod recorder;
pub mod redis_store;
pub mod registry;
pub mod store;

pub use aggregate::{Aggregate, MetricKey};
pub use instrument::Instrumented;
pub use memory_store::MemoryStore;
pub use recorder::SampleRecorder;
pub use redis_store::RedisStore;
pub use registry::MeterRegistry;
pub use store::{AggregateStore, StoreError};

use std::time::Duration;

/// A single timing observation of one instrumented call.
/// This is the "write" side: the wrapper builds these and the recorder
/// folds them into the store.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Target aggregate; already the `_ERROR` variant for recorded failures
    pub key: MetricKey,
    /// Wall time of the unit of work
    pub duration: Duration,
    /// true when the unit of work failed
    pub is_error: bool,
}

impl Sample {
    pub fn new(key: MetricKey, duration: Duration, is_error: bool) -> Self {
        Self {
            key,
            duration,
            is_error,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}
