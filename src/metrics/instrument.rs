use std::future::Future;
use std::time::Instant;
use tracing::debug;

use super::{MetricKey, Sample, SampleRecorder};

/// Measure-and-report decorator for one named operation.
///
/// ```ignore
/// let card = Instrumented::new("MASTER_CARD", "Delete")
///     .record_on_error(true)
///     .run(&recorder, repo.delete(id))
///     .await?;
/// ```
///
/// The wrapped future's output is returned untouched. Successes are
/// recorded under `operation`; failures are recorded under
/// `operation_ERROR` only when `record_on_error` is set.
#[derive(Debug, Clone)]
pub struct Instrumented {
    key: MetricKey,
    record_on_error: bool,
}

impl Instrumented {
    pub fn new(entity: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            key: MetricKey::new(entity, operation),
            record_on_error: false,
        }
    }

    pub fn record_on_error(mut self, enabled: bool) -> Self {
        self.record_on_error = enabled;
        self
    }

    pub async fn run<F, T, E>(&self, recorder: &SampleRecorder, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let outcome = work.await;
        let elapsed = start.elapsed();

        match &outcome {
            Ok(_) => {
                recorder
                    .record(Sample::new(self.key.clone(), elapsed, false))
                    .await;
            }
            Err(_) if self.record_on_error => {
                recorder
                    .record(Sample::new(self.key.error_variant(), elapsed, true))
                    .await;
            }
            Err(_) => {
                debug!(key = %self.key, ?elapsed, "call failed, sample not recorded");
            }
        }

        outcome
    }
}
