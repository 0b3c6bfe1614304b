use std::sync::Arc;
use tracing::{debug, warn};

use super::registry::MeterRegistry;
use super::store::{AggregateStore, StoreError};
use super::{Aggregate, Sample};

const TIMER: &str = "db.operation.time";
const CALLS: &str = "db.operation.count";
const ERRORS: &str = "db.operation.errors";
const DROPPED: &str = "metrics.samples.dropped";

/// Turns finished measurements into store merges and live meter updates.
#[derive(Clone)]
pub struct SampleRecorder {
    store: Arc<dyn AggregateStore>,
    registry: Arc<MeterRegistry>,
}

impl SampleRecorder {
    pub fn new(store: Arc<dyn AggregateStore>, registry: Arc<MeterRegistry>) -> Self {
        Self { store, registry }
    }

    /// Best-effort: a failing store is logged and counted, never surfaced.
    pub async fn record(&self, sample: Sample) {
        let key = sample.key.clone();
        if let Err(e) = self.record_checked(sample).await {
            warn!(key = %key, error = %e, "metric sample dropped");
            self.registry.increment(DROPPED, &[]);
        }
    }

    /// Same as [`record`](Self::record) but hands back the merged
    /// aggregate, or the store failure, to callers that report it.
    pub async fn record_checked(&self, sample: Sample) -> Result<Aggregate, StoreError> {
        let tags = [
            ("entity", sample.key.entity.as_str()),
            ("operation", sample.key.operation.as_str()),
        ];
        self.registry.record_timer(TIMER, &tags, sample.duration);
        self.registry.increment(CALLS, &tags);
        if sample.is_error {
            self.registry.increment(ERRORS, &tags);
        }

        let agg = self
            .store
            .merge(&sample.key, sample.duration_ms(), sample.is_error)
            .await?;
        debug!(
            key = %sample.key,
            duration_ms = sample.duration_ms(),
            count = agg.count,
            "sample recorded"
        );
        Ok(agg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::registry::Statistic;
    use crate::metrics::test_support::FailingStore;
    use crate::metrics::{MemoryStore, MetricKey};
    use std::time::Duration;

    fn counter(registry: &MeterRegistry, display: &str) -> Option<f64> {
        registry
            .snapshot()
            .into_iter()
            .find(|m| m.id.display_name() == display)
            .and_then(|m| m.measurements.iter().find(|x| x.statistic == Statistic::Count).map(|x| x.value))
    }

    #[tokio::test]
    async fn record_merges_into_the_store() {
        let store = Arc::new(MemoryStore::new());
        let recorder = SampleRecorder::new(store.clone(), Arc::new(MeterRegistry::new()));
        let key = MetricKey::new("Customer", "INSERT");

        recorder.record(Sample::new(key.clone(), Duration::from_millis(12), false)).await;
        recorder.record(Sample::new(key.clone(), Duration::from_millis(8), false)).await;

        let agg = store.get(&key).await.unwrap().unwrap();
        assert_eq!(agg.count, 2);
        assert_eq!(agg.total_time_ms, 20);
    }

    #[tokio::test]
    async fn record_swallows_store_failures() {
        let registry = Arc::new(MeterRegistry::new());
        let recorder = SampleRecorder::new(Arc::new(FailingStore), registry.clone());

        recorder
            .record(Sample::new(MetricKey::new("VISA", "PAYMENT"), Duration::from_millis(5), false))
            .await;

        assert_eq!(counter(&registry, "metrics.samples.dropped"), Some(1.0));
        assert_eq!(
            counter(&registry, "db.operation.count{entity=VISA,operation=PAYMENT}"),
            Some(1.0)
        );
    }

    #[tokio::test]
    async fn record_checked_surfaces_store_failures() {
        let recorder = SampleRecorder::new(Arc::new(FailingStore), Arc::new(MeterRegistry::new()));
        let res = recorder
            .record_checked(Sample::new(MetricKey::new("VISA", "PAYMENT"), Duration::ZERO, false))
            .await;
        assert!(matches!(res, Err(StoreError::Redis(_))));
    }

    #[tokio::test]
    async fn errors_bump_the_error_counter() {
        let registry = Arc::new(MeterRegistry::new());
        let recorder = SampleRecorder::new(Arc::new(MemoryStore::new()), registry.clone());
        let key = MetricKey::new("MASTER_CARD", "Delete").error_variant();

        recorder.record(Sample::new(key, Duration::from_millis(3), true)).await;

        assert_eq!(
            counter(&registry, "db.operation.errors{entity=MASTER_CARD,operation=Delete_ERROR}"),
            Some(1.0)
        );
        assert_eq!(counter(&registry, "metrics.samples.dropped"), None);
    }
}
